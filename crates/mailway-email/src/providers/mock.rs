//! Mock email provider for testing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Message;
use crate::providers::{
    DeliveryResult, EmailProvider, EmailProviderType, FailureDetail, RawResponse,
};

/// Mock email provider for testing
#[derive(Debug, Clone)]
pub struct MockEmailProvider {
    /// Counter for tracking calls
    pub send_count: Arc<AtomicUsize>,

    /// Configurable outcome
    pub should_fail_send: bool,
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self {
            send_count: Arc::new(AtomicUsize::new(0)),
            should_fail_send: false,
        }
    }

    pub fn with_send_failure(mut self) -> Self {
        self.should_fail_send = true;
        self
    }

    pub fn send_call_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, _message: &Message) -> DeliveryResult {
        self.send_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail_send {
            return DeliveryResult::Failed(FailureDetail {
                message: "Mock send failure".to_string(),
                code: 500,
                errors: Vec::new(),
            });
        }

        DeliveryResult::Sent {
            response: RawResponse {
                code: 202,
                message: "Accepted".to_string(),
                body: Vec::new(),
            },
        }
    }

    fn provider_type(&self) -> EmailProviderType {
        EmailProviderType::Sendgrid
    }
}
