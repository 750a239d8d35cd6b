//! Provider credentials
//!
//! Credentials are consumed as opaque secrets obtained from configuration;
//! this crate never creates or stores them.

use serde::{Deserialize, Serialize};

/// SendGrid credentials
///
/// A single API key with `mail.send` scope.
/// Create at: https://app.sendgrid.com/settings/api_keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendgridCredentials {
    pub api_key: String,
}

impl SendgridCredentials {
    /// Get a masked representation of the credentials for display
    pub fn masked(&self) -> serde_json::Value {
        serde_json::json!({
            "api_key": mask_string(&self.api_key),
        })
    }
}

/// Mask a string, showing only first 4 and last 4 characters
fn mask_string(s: &str) -> String {
    if s.len() <= 8 {
        "***".to_string()
    } else {
        format!("{}...{}", &s[..4], &s[s.len() - 4..])
    }
}
