//! Per-(request, developer) chat rooms.
//!
//! Messages are written as plain single-row inserts — no batching — so
//! a realtime change feed can subscribe to the `messages` table
//! directly. Only the request's client and the room's developer may
//! open a room or post to it.

use sqlx::SqlitePool;

use crate::db;
use crate::errors::{is_unique_violation, Error, Result};
use crate::models::{ChatRoom, Message};
use crate::requests;

/// Create a room for `(request, developer)` or return the existing one.
pub async fn open_room(
    pool: &SqlitePool,
    user_id: i64,
    request_id: i64,
    developer_id: i64,
) -> Result<ChatRoom> {
    let request = requests::get_request(pool, request_id).await?;

    let is_client = user_id == request.client_id;
    let is_developer = user_id == developer_id;
    if !is_client && !is_developer {
        return Err(Error::Forbidden("You are not a participant in this chat"));
    }

    if let Some(room) = find_room(pool, request_id, developer_id).await? {
        return Ok(room);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO chat_rooms (request_id, client_id, developer_id, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(request_id)
    .bind(request.client_id)
    .bind(developer_id)
    .bind(db::now())
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        // Lost a concurrent create; the winner's room is ours too.
        Err(e) if is_unique_violation(&e) => {}
        Err(e) => return Err(e.into()),
    }

    find_room(pool, request_id, developer_id)
        .await?
        .ok_or(Error::NotFound("Chat room not found"))
}

async fn find_room(
    pool: &SqlitePool,
    request_id: i64,
    developer_id: i64,
) -> Result<Option<ChatRoom>> {
    let row = sqlx::query_as::<_, ChatRoom>(
        r#"
        SELECT id, request_id, client_id, developer_id, created_at
        FROM   chat_rooms
        WHERE  request_id = ?1 AND developer_id = ?2
        "#,
    )
    .bind(request_id)
    .bind(developer_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn get_room(pool: &SqlitePool, room_id: i64) -> Result<ChatRoom> {
    sqlx::query_as::<_, ChatRoom>(
        r#"
        SELECT id, request_id, client_id, developer_id, created_at
        FROM   chat_rooms
        WHERE  id = ?1
        "#,
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound("Chat room not found"))
}

fn ensure_participant(room: &ChatRoom, user_id: i64) -> Result<()> {
    if user_id != room.client_id && user_id != room.developer_id {
        return Err(Error::Forbidden("You are not a participant in this chat"));
    }
    Ok(())
}

/// Post one message to a room.
pub async fn send_message(
    pool: &SqlitePool,
    user_id: i64,
    room_id: i64,
    content: &str,
) -> Result<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::Invalid("Message cannot be empty"));
    }

    let room = get_room(pool, room_id).await?;
    ensure_participant(&room, user_id)?;

    let id = sqlx::query(
        "INSERT INTO messages (room_id, sender_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(room_id)
    .bind(user_id)
    .bind(content)
    .bind(db::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    let message = sqlx::query_as::<_, Message>(
        "SELECT id, room_id, sender_id, content, created_at FROM messages WHERE id = ?1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(message)
}

/// All messages in a room, oldest first. Participants only.
pub async fn list_messages(pool: &SqlitePool, user_id: i64, room_id: i64) -> Result<Vec<Message>> {
    let room = get_room(pool, room_id).await?;
    ensure_participant(&room, user_id)?;

    let rows = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, room_id, sender_id, content, created_at
        FROM   messages
        WHERE  room_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(room_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All rooms a user participates in, newest first.
pub async fn list_rooms_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<ChatRoom>> {
    let rows = sqlx::query_as::<_, ChatRoom>(
        r#"
        SELECT id, request_id, client_id, developer_id, created_at
        FROM   chat_rooms
        WHERE  client_id = ?1 OR developer_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
