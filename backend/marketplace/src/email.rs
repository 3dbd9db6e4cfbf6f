//! Outbound email sink (Resend-style HTTP API) and message templates.
//!
//! Sending is strictly best-effort: when no API key is configured the
//! send is skipped with a log line, and callers in the fan-out path
//! swallow errors anyway.

use reqwest::Client;
use serde_json::json;

use crate::errors::{Error, Result};

pub struct Mailer {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    pub site_url: String,
}

impl Mailer {
    pub fn new(
        client: Client,
        api_url: String,
        api_key: Option<String>,
        from: String,
        site_url: String,
    ) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from,
            site_url,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(subject, "email API key not set, skipping email");
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Email(format!(
                "send failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Templates — (subject, html) pairs
// ─────────────────────────────────────────────────────────

fn layout(heading: &str, body: &str, cta: &str, link: &str) -> String {
    format!(
        r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2>{heading}</h2>
  {body}
  <a href="{link}" style="display: inline-block; background: #2563eb; color: white; padding: 12px 24px; border-radius: 8px; text-decoration: none; margin-top: 16px;">{cta}</a>
</div>"#
    )
}

pub fn new_bid(
    site_url: &str,
    request_title: &str,
    developer_name: &str,
    price: i64,
    request_id: i64,
) -> (String, String) {
    (
        format!("New bid on \"{request_title}\""),
        layout(
            "New bid received",
            &format!(
                "<p><strong>{developer_name}</strong> bid <strong>{price}</strong> on \
                 \"{request_title}\".</p>"
            ),
            "View bids",
            &format!("{site_url}/requests/{request_id}"),
        ),
    )
}

pub fn awarded(
    site_url: &str,
    request_title: &str,
    client_name: &str,
    price: i64,
    request_id: i64,
) -> (String, String) {
    (
        format!("Congratulations! Your bid on \"{request_title}\" won"),
        layout(
            "You won the project",
            &format!(
                "<p>Your bid of <strong>{price}</strong> on \"{request_title}\" was selected \
                 by <strong>{client_name}</strong>. Discuss the details over chat.</p>"
            ),
            "View project",
            &format!("{site_url}/requests/{request_id}"),
        ),
    )
}

pub fn payment_received(
    site_url: &str,
    request_title: &str,
    amount: i64,
    request_id: i64,
) -> (String, String) {
    (
        format!("Payment received for \"{request_title}\""),
        layout(
            "Payment held in escrow",
            &format!(
                "<p><strong>{amount}</strong> for \"{request_title}\" is now held in escrow. \
                 It will be paid out when the project is completed.</p>"
            ),
            "View project",
            &format!("{site_url}/requests/{request_id}"),
        ),
    )
}

pub fn project_completed(
    site_url: &str,
    request_title: &str,
    amount: i64,
    request_id: i64,
) -> (String, String) {
    (
        format!("\"{request_title}\" is complete"),
        layout(
            "Project completed",
            &format!(
                "<p>\"{request_title}\" is complete and <strong>{amount}</strong> has been \
                 paid out. Leave a review for your counterpart!</p>"
            ),
            "Write a review",
            &format!("{site_url}/requests/{request_id}"),
        ),
    )
}
