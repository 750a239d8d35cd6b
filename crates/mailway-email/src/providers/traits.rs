//! Email provider trait definitions and delivery value types

use std::borrow::Cow;
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EmailError;
use crate::message::Message;

/// Supported email provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderType {
    /// SendGrid v3 mail send API
    Sendgrid,
}

impl std::fmt::Display for EmailProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailProviderType::Sendgrid => write!(f, "sendgrid"),
        }
    }
}

impl EmailProviderType {
    pub fn from_str(s: &str) -> Result<Self, EmailError> {
        match s.to_lowercase().as_str() {
            "sendgrid" | "send_grid" | "send-grid" => Ok(EmailProviderType::Sendgrid),
            _ => Err(EmailError::InvalidProviderType(s.to_string())),
        }
    }
}

/// Wire-ready HTTP request for one provider: endpoint URL, transport
/// headers and the serialized body. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Raw HTTP response as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    /// HTTP status code
    pub code: u16,
    /// Transport-reported status message (reason phrase)
    pub message: String,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Response body as text, lossily decoded.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Terminal outcome of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Provider accepted the message; carries the unmodified raw response
    Sent { response: RawResponse },
    /// Delivery failed; carries the normalized failure detail
    Failed(FailureDetail),
}

impl DeliveryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryResult::Sent { .. })
    }
}

/// User-presentable failure details for one send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Transport-reported status message
    pub message: String,
    /// Transport-reported status code; 0 when no response exists
    pub code: u16,
    /// Granular, display-safe provider error strings
    pub errors: Vec<String>,
}

/// Email provider trait for abstracting transactional email services
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send one message.
    ///
    /// Total over its input: every outcome, including transport failures
    /// and malformed provider responses, resolves to a [`DeliveryResult`].
    async fn send(&self, message: &Message) -> DeliveryResult;

    /// Get the provider type
    fn provider_type(&self) -> EmailProviderType;
}
