//! Outbound email delivery for Mailway
//!
//! This crate translates a normalized, provider-agnostic email message into
//! a transactional email provider's wire request, submits it over HTTP, and
//! normalizes the provider's response back into a provider-agnostic
//! delivery result.
//!
//! Providers:
//! - SendGrid (v3 mail send API)
//!
//! Features:
//! - Request building with recipient grouping and attachment encoding
//! - Total, deterministic response classification
//! - Delivery telemetry hooks for the dispatch layer

pub mod errors;
pub mod message;
pub mod observer;
pub mod providers;

// Re-export main types
pub use errors::EmailError;
pub use message::{format_mailbox_list, Mailbox, Message, RecipientSummary};
pub use observer::{DeliveryObserver, DeliveryRecord, DynDeliveryObserver, NullObserver};
pub use providers::{
    DeliveryResult, EmailProvider, EmailProviderType, FailureDetail, ProviderRequest, RawResponse,
    SendgridCredentials, SendgridProvider,
};
