//! Normalized message model
//!
//! A [`Message`] is the provider-agnostic representation of one outbound
//! email. It is produced by the composition layer and read-only to the
//! providers; building the wire request never mutates it.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// Display form: `"Name <email>"` when a name is present, else the bare
    /// address.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// Provider-agnostic outbound email message
///
/// Invariant: `to` is non-empty and all addresses are syntactically valid.
/// Both are enforced by the composition layer upstream, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    #[serde(default)]
    pub cc: Vec<Mailbox>,
    #[serde(default)]
    pub bcc: Vec<Mailbox>,
    pub subject: String,
    /// Body text with its declared content type (e.g. `text/html`)
    pub body: String,
    pub content_type: String,
    /// Custom headers merged into the provider payload
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Reply-to addresses; providers accept a single one, the first entry
    #[serde(default)]
    pub reply_to: Vec<Mailbox>,
    /// Attachment file paths, resolved at request-build time
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl Message {
    pub fn new(
        from: Mailbox,
        to: Vec<Mailbox>,
        subject: impl Into<String>,
        body: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            body: body.into(),
            content_type: content_type.into(),
            headers: HashMap::new(),
            reply_to: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// First reply-to address, if any.
    pub fn first_reply_to(&self) -> Option<&Mailbox> {
        self.reply_to.first()
    }

    /// Value of a custom header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Formatted recipient groups for logging and record-keeping.
    pub fn recipient_summary(&self) -> RecipientSummary {
        RecipientSummary {
            to: format_mailbox_list(&self.to),
            cc: format_mailbox_list(&self.cc),
            bcc: format_mailbox_list(&self.bcc),
        }
    }
}

/// Human-readable recipient groups, one formatted string per non-empty
/// group. This is a side output for logging, not part of any wire payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSummary {
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

/// Format a recipient group as `"Name <email>"` / `email` entries joined
/// with `", "`, preserving input order. Empty groups format to `None`.
pub fn format_mailbox_list(list: &[Mailbox]) -> Option<String> {
    if list.is_empty() {
        return None;
    }

    Some(
        list.iter()
            .map(Mailbox::display)
            .collect::<Vec<_>>()
            .join(", "),
    )
}
