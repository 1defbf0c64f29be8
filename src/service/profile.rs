//! Profile lookup service
//!
//! Turns raw `@user@host` chat input into a one-line profile reply.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::federation::{ActorDocument, ActorResolver, FediverseHandle};

/// IRC bold toggle
const BOLD: char = '\x02';

/// Profile lookup service
#[derive(Clone)]
pub struct ProfileService {
    resolver: Arc<ActorResolver>,
}

impl ProfileService {
    pub fn new(resolver: Arc<ActorResolver>) -> Self {
        Self { resolver }
    }

    /// Look up `input` and format the reply line
    ///
    /// # Errors
    /// `InvalidHandle` before any network call, `ActorNotFound` when
    /// discovery or fetch fails.
    pub async fn lookup(&self, input: &str) -> Result<String> {
        let handle = FediverseHandle::parse(input.trim())?;
        let actor = self.resolver.resolve(&handle).await?;
        Ok(format_profile(&actor, &handle))
    }

    /// Reply line for `input`: the profile, or a user-facing error
    pub async fn reply(&self, input: &str) -> String {
        match self.lookup(input).await {
            Ok(line) => line,
            Err(error) => error_reply(&error, input.trim()),
        }
    }
}

/// `\x02{name}\x02 (@{preferredUsername}@{hostname}): {summary as text}`
pub fn format_profile(actor: &ActorDocument, handle: &FediverseHandle) -> String {
    format!(
        "{BOLD}{}{BOLD} (@{}@{}): {}",
        actor.name,
        actor.preferred_username,
        handle.hostname(),
        html_to_text(&actor.summary)
    )
}

/// User-facing message for a failed lookup
pub fn error_reply(error: &AppError, input: &str) -> String {
    match error {
        AppError::InvalidHandle(_) => {
            format!("That's not a valid fediverse username: {}", input)
        }
        AppError::ActorNotFound(_) => format!("Unknown user {}.", input),
        other => {
            tracing::error!(error = %other, "Profile lookup failed");
            "An error occurred while looking up that user.".to_string()
        }
    }
}

/// Strip every tag, keep text content, decode entities and collapse whitespace
pub fn html_to_text(html: &str) -> String {
    // Paragraph and line breaks separate words.
    let spaced = html
        .replace("</p>", "</p> ")
        .replace("<br", " <br");

    // No tags allowed; script/style content is dropped entirely.
    let stripped = ammonia::Builder::default()
        .tags(HashSet::new())
        .clean(&spaced)
        .to_string();
    let decoded = html_escape::decode_html_entities(&stripped);

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
