//! Developer-services marketplace backend.
//!
//! Clients post software-development requests; developers submit
//! competing bids inside a fixed 48-hour window; the client awards
//! exactly one bid, pays into escrow through an external card gateway,
//! and releases the escrow when the project is done. Award selection
//! and the escrow lifecycle are the invariant-bearing core; everything
//! else is CRUD over SQLite plus best-effort notification fan-out.

pub mod api;
pub mod auth;
pub mod award;
pub mod bids;
pub mod chat;
pub mod config;
pub mod contracts;
pub mod db;
pub mod email;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod payments;
pub mod reports;
pub mod requests;
pub mod reviews;
