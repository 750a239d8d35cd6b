//! Delivery telemetry hooks
//!
//! The dispatch layer owns logging and record-keeping; providers hand it
//! structured payloads through a [`DeliveryObserver`] instead of writing
//! records themselves. Observers are invoked once per send, after
//! classification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::providers::{FailureDetail, RawResponse};

/// Structured payload handed to the recording channel after a delivery was
/// accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Unmodified raw provider response, for the caller's record-keeping
    pub response: RawResponse,
    pub success: bool,
}

/// Observer for delivery outcomes.
///
/// Implementations must be cheap and non-blocking; the provider invokes
/// them inline on the send path.
pub trait DeliveryObserver: Send + Sync {
    /// Called once after a successful delivery.
    fn delivery_recorded(&self, record: &DeliveryRecord);

    /// Called once after a failed delivery with the normalized,
    /// display-safe failure detail.
    fn delivery_failed(&self, failure: &FailureDetail);
}

pub type DynDeliveryObserver = Arc<dyn DeliveryObserver>;

/// Observer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl DeliveryObserver for NullObserver {
    fn delivery_recorded(&self, _record: &DeliveryRecord) {}

    fn delivery_failed(&self, _failure: &FailureDetail) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_observer_accepts_events() {
        let observer = NullObserver;

        observer.delivery_recorded(&DeliveryRecord {
            response: RawResponse {
                code: 202,
                message: "Accepted".to_string(),
                body: Vec::new(),
            },
            success: true,
        });

        observer.delivery_failed(&FailureDetail {
            message: "Bad Request".to_string(),
            code: 400,
            errors: vec!["Invalid from - from.".to_string()],
        });
    }

    #[test]
    fn test_delivery_record_serialization() {
        let record = DeliveryRecord {
            response: RawResponse {
                code: 202,
                message: "Accepted".to_string(),
                body: b"{}".to_vec(),
            },
            success: true,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"success\":true"));

        let parsed: DeliveryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
