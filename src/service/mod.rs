//! Service layer
//!
//! Contains the chat-facing logic separated from HTTP handlers.

mod profile;

pub use profile::{ProfileService, error_reply, format_profile, html_to_text};
