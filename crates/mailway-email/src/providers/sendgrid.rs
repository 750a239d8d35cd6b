//! SendGrid mail provider implementation
//!
//! Builds the SendGrid v3 `mail/send` request from a normalized message and
//! classifies the provider response into a [`DeliveryResult`]. The failure
//! body shape (`errors` array with `message`/`field`/`help`, singular
//! `error` on some endpoints) is SendGrid's documented contract and is
//! preserved here exactly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use super::credentials::SendgridCredentials;
use super::traits::{
    DeliveryResult, EmailProvider, EmailProviderType, FailureDetail, ProviderRequest, RawResponse,
};
use crate::errors::EmailError;
use crate::message::{Mailbox, Message};
use crate::observer::{DeliveryRecord, DynDeliveryObserver};

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Product identifier sent with every message
const X_MAILER: &str = "Mailway - SendGrid";

/// Status code SendGrid returns for an accepted message
const EMAIL_SENT_CODE: u16 = 202;
/// Status message expected alongside the accepted code; a 202 with any
/// other message is classified as a failure
const EMAIL_SENT_MESSAGE: &str = "Accepted";

/// SendGrid provider implementation
pub struct SendgridProvider {
    client: Client,
    credentials: SendgridCredentials,
    url: String,
    observer: Option<DynDeliveryObserver>,
}

// SendGrid v3 mail send payload

#[derive(Debug, Serialize)]
struct MailSendRequest {
    from: EmailAddress,
    personalizations: Vec<Personalization>,
    subject: String,
    content: Vec<Content>,
    headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<EmailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<AttachmentPayload>>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Mailbox> for EmailAddress {
    fn from(mailbox: &Mailbox) -> Self {
        Self {
            email: mailbox.email.clone(),
            name: mailbox.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Personalization {
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<Vec<EmailAddress>>,
}

#[derive(Debug, Serialize)]
struct Content {
    value: String,
    #[serde(rename = "type")]
    content_type: String,
}

#[derive(Debug, Serialize)]
struct AttachmentPayload {
    #[serde(rename = "type")]
    mime_type: String,
    filename: String,
    disposition: &'static str,
    content_id: String,
    /// Base64-encoded file contents
    content: String,
}

impl SendgridProvider {
    /// Create a new SendGrid provider with the given credentials
    pub fn new(credentials: SendgridCredentials) -> Result<Self, EmailError> {
        Self::with_url(credentials, SENDGRID_API_URL.to_string())
    }

    /// Create a provider with a custom endpoint URL (for testing)
    #[cfg(test)]
    pub fn with_base_url(
        credentials: SendgridCredentials,
        url: String,
    ) -> Result<Self, EmailError> {
        Self::with_url(credentials, url)
    }

    fn with_url(credentials: SendgridCredentials, url: String) -> Result<Self, EmailError> {
        if credentials.api_key.trim().is_empty() {
            return Err(EmailError::Configuration(
                "SendGrid API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                EmailError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            credentials,
            url,
            observer: None,
        })
    }

    /// Attach an observer that receives delivery outcomes
    pub fn with_observer(mut self, observer: DynDeliveryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the wire-ready request for a message.
    ///
    /// Pure apart from reading attachment files; unreadable attachments are
    /// skipped, never fatal.
    pub fn build_request(&self, message: &Message) -> Result<ProviderRequest, EmailError> {
        let payload = Self::build_payload(message);
        let body = serde_json::to_vec(&payload)?;

        Ok(ProviderRequest {
            url: self.url.clone(),
            headers: self.request_headers(),
            body,
        })
    }

    /// HTTP transport headers for the mail send endpoint
    fn request_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                "Content-Type".to_string(),
                "application/json".to_string(),
            ),
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.credentials.api_key),
            ),
        ])
    }

    fn build_payload(message: &Message) -> MailSendRequest {
        MailSendRequest {
            from: (&message.from).into(),
            personalizations: vec![Self::build_personalization(message)],
            subject: message.subject.clone(),
            content: vec![Content {
                value: message.body.clone(),
                content_type: message.content_type.clone(),
            }],
            headers: Self::build_payload_headers(message),
            reply_to: message.first_reply_to().map(EmailAddress::from),
            attachments: Self::build_attachments(&message.attachments),
        }
    }

    /// The single recipients object; empty groups are omitted entirely
    fn build_personalization(message: &Message) -> Personalization {
        Personalization {
            to: Self::address_group(&message.to),
            cc: Self::address_group(&message.cc),
            bcc: Self::address_group(&message.bcc),
        }
    }

    fn address_group(list: &[Mailbox]) -> Option<Vec<EmailAddress>> {
        if list.is_empty() {
            None
        } else {
            Some(list.iter().map(EmailAddress::from).collect())
        }
    }

    /// Payload headers: caller-supplied custom headers plus the fixed
    /// product identifier, which always wins on collision
    fn build_payload_headers(message: &Message) -> HashMap<String, String> {
        let mut headers = message.headers.clone();
        headers.insert("X-Mailer".to_string(), X_MAILER.to_string());
        headers
    }

    /// Encode attachments, dropping any path that cannot be read.
    ///
    /// Returns `None` when the message carries no attachments or none of
    /// them survived, so the `attachments` key is omitted from the wire.
    fn build_attachments(paths: &[PathBuf]) -> Option<Vec<AttachmentPayload>> {
        if paths.is_empty() {
            return None;
        }

        let attachments: Vec<AttachmentPayload> = paths
            .iter()
            .filter_map(|path| match Self::load_attachment(path) {
                Ok(attachment) => Some(attachment),
                Err(e) => {
                    warn!("Skipping attachment {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        if attachments.is_empty() {
            None
        } else {
            Some(attachments)
        }
    }

    fn load_attachment(path: &Path) -> Result<AttachmentPayload, EmailError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| EmailError::Attachment(format!("{}: {}", path.display(), e)))?;

        if !metadata.is_file() {
            return Err(EmailError::Attachment(format!(
                "{}: not a regular file",
                path.display()
            )));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| EmailError::Attachment(format!("{}: {}", path.display(), e)))?;

        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("attachment")
            .to_string();

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(AttachmentPayload {
            mime_type,
            filename,
            disposition: "attachment",
            content_id: Self::content_id(path),
            content: BASE64.encode(&bytes),
        })
    }

    /// Deterministic content id for an attachment path, usable for
    /// inline-content cross-referencing
    fn content_id(path: &Path) -> String {
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        hex::encode(digest)
    }

    /// Classify a raw transport response.
    ///
    /// Total and deterministic: every response, including malformed or
    /// empty bodies, maps to exactly one [`DeliveryResult`].
    pub fn interpret_response(response: &RawResponse) -> DeliveryResult {
        if Self::is_email_sent(response) {
            DeliveryResult::Sent {
                response: response.clone(),
            }
        } else {
            DeliveryResult::Failed(Self::response_error(response))
        }
    }

    /// SendGrid acknowledges with 202 "Accepted"; both the code and the
    /// status message must match
    fn is_email_sent(response: &RawResponse) -> bool {
        response.code == EMAIL_SENT_CODE && response.message == EMAIL_SENT_MESSAGE
    }

    fn response_error(response: &RawResponse) -> FailureDetail {
        let errors = serde_json::from_slice::<serde_json::Value>(&response.body)
            .map(|body| Self::extract_errors(&body))
            .unwrap_or_default();

        FailureDetail {
            message: response.message.clone(),
            code: response.code,
            errors,
        }
    }

    fn extract_errors(body: &serde_json::Value) -> Vec<String> {
        Self::error_entries(body)
            .into_iter()
            .filter_map(Self::format_error)
            .map(|s| ammonia::clean_text(&s))
            .collect()
    }

    /// SendGrid reports failures under a plural `errors` key; a few
    /// endpoints use a singular `error` instead. The plural key wins when
    /// both are present.
    fn error_entries(body: &serde_json::Value) -> Vec<&serde_json::Value> {
        let source = ["errors", "error"]
            .iter()
            .find_map(|key| body.get(key).filter(|v| Self::has_entries(v)));

        match source {
            Some(serde_json::Value::Array(entries)) => entries.iter().collect(),
            Some(serde_json::Value::Object(map)) => map.values().collect(),
            _ => Vec::new(),
        }
    }

    fn has_entries(value: &serde_json::Value) -> bool {
        match value {
            serde_json::Value::Array(entries) => !entries.is_empty(),
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => false,
        }
    }

    /// Display string for one error entry: the `message`, suffixed with
    /// `" - field.help"` where `field` and `help` are appended only when
    /// present and non-empty. Entries without a `message` are skipped.
    fn format_error(entry: &serde_json::Value) -> Option<String> {
        let message = entry.get("message").and_then(serde_json::Value::as_str)?;

        let mut extra = String::new();
        if let Some(field) = Self::non_empty_str(entry, "field") {
            extra.push_str(field);
            extra.push('.');
        }
        if let Some(help) = Self::non_empty_str(entry, "help") {
            extra.push_str(help);
        }

        if extra.is_empty() {
            Some(message.to_string())
        } else {
            Some(format!("{} - {}", message, extra))
        }
    }

    fn non_empty_str<'a>(entry: &'a serde_json::Value, key: &str) -> Option<&'a str> {
        entry
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Perform the single HTTP POST for a built request
    async fn execute(&self, request: &ProviderRequest) -> Result<RawResponse, reqwest::Error> {
        let mut post = self.client.post(&request.url);
        for (name, value) in &request.headers {
            post = post.header(name.as_str(), value.as_str());
        }

        let response = post.body(request.body.clone()).send().await?;

        let status = response.status();
        let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();

        Ok(RawResponse {
            code: status.as_u16(),
            // HTTP/2 carries no reason phrase; the canonical one for the
            // status code stands in for the transport status message
            message: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }

    fn notify(&self, result: &DeliveryResult) {
        let Some(observer) = &self.observer else {
            return;
        };

        match result {
            DeliveryResult::Sent { response } => observer.delivery_recorded(&DeliveryRecord {
                response: response.clone(),
                success: true,
            }),
            DeliveryResult::Failed(failure) => observer.delivery_failed(failure),
        }
    }

    fn fail(&self, failure: FailureDetail) -> DeliveryResult {
        error!(
            "SendGrid delivery failed ({}): {}",
            failure.code, failure.message
        );

        let result = DeliveryResult::Failed(failure);
        self.notify(&result);
        result
    }
}

#[async_trait]
impl EmailProvider for SendgridProvider {
    async fn send(&self, message: &Message) -> DeliveryResult {
        let summary = message.recipient_summary();
        debug!(
            "Sending email via SendGrid from {} to {}",
            message.from.email,
            summary.to.as_deref().unwrap_or("")
        );

        let request = match self.build_request(message) {
            Ok(request) => request,
            Err(e) => {
                return self.fail(FailureDetail {
                    message: e.to_string(),
                    code: 0,
                    errors: Vec::new(),
                });
            }
        };

        let raw = match self.execute(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                // Transport failure: no response exists, so no diagnostics
                return self.fail(FailureDetail {
                    message: e.to_string(),
                    code: 0,
                    errors: Vec::new(),
                });
            }
        };

        let result = Self::interpret_response(&raw);
        match &result {
            DeliveryResult::Sent { response } => {
                debug!("Email accepted by SendGrid ({})", response.code);
                self.notify(&result);
            }
            DeliveryResult::Failed(failure) => {
                error!(
                    "SendGrid rejected message ({}): {}",
                    failure.code, failure.message
                );
                self.notify(&result);
            }
        }

        result
    }

    fn provider_type(&self) -> EmailProviderType {
        EmailProviderType::Sendgrid
    }
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::observer::DeliveryObserver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingObserver {
        recorded: AtomicUsize,
        failed: AtomicUsize,
        last_failure: Mutex<Option<FailureDetail>>,
    }

    impl DeliveryObserver for RecordingObserver {
        fn delivery_recorded(&self, record: &DeliveryRecord) {
            assert!(record.success);
            self.recorded.fetch_add(1, Ordering::SeqCst);
        }

        fn delivery_failed(&self, failure: &FailureDetail) {
            self.failed.fetch_add(1, Ordering::SeqCst);
            *self.last_failure.lock().unwrap() = Some(failure.clone());
        }
    }

    fn mock_provider(mock_server: &MockServer) -> SendgridProvider {
        let credentials = SendgridCredentials {
            api_key: "SG.test-key-12345".to_string(),
        };

        SendgridProvider::with_base_url(
            credentials,
            format!("{}/v3/mail/send", mock_server.uri()),
        )
        .unwrap()
    }

    fn message() -> Message {
        Message::new(
            Mailbox::with_name("sender@example.com", "Sender"),
            vec![Mailbox::new("recipient@example.com")],
            "Test Subject",
            "Hello",
            "text/plain",
        )
    }

    #[tokio::test]
    async fn test_send_accepted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("Authorization", "Bearer SG.test-key-12345"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "from": {"email": "sender@example.com", "name": "Sender"},
                "personalizations": [{"to": [{"email": "recipient@example.com"}]}],
                "subject": "Test Subject",
                "content": [{"value": "Hello", "type": "text/plain"}],
                "headers": {"X-Mailer": "Mailway - SendGrid"}
            })))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let provider = mock_provider(&mock_server);
        let result = provider.send(&message()).await;

        match result {
            DeliveryResult::Sent { response } => {
                assert_eq!(response.code, 202);
                assert_eq!(response.message, "Accepted");
            }
            DeliveryResult::Failed(failure) => panic!("Expected Sent, got {:?}", failure),
        }
    }

    #[tokio::test]
    async fn test_send_rejected_with_error_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": [
                    {"message": "Invalid from", "field": "from"},
                    {"message": "Subject required", "field": "subject"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let provider = mock_provider(&mock_server);
        let result = provider.send(&message()).await;

        let DeliveryResult::Failed(failure) = result else {
            panic!("Expected Failed");
        };

        assert_eq!(failure.code, 400);
        assert_eq!(failure.message, "Bad Request");
        assert_eq!(
            failure.errors,
            vec![
                "Invalid from - from.".to_string(),
                "Subject required - subject.".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_send_connection_error_maps_to_failed() {
        let credentials = SendgridCredentials {
            api_key: "SG.test-key-12345".to_string(),
        };
        // Nothing listens here; the connection is refused
        let provider = SendgridProvider::with_base_url(
            credentials,
            "http://127.0.0.1:1/v3/mail/send".to_string(),
        )
        .unwrap();

        let result = provider.send(&message()).await;

        let DeliveryResult::Failed(failure) = result else {
            panic!("Expected Failed");
        };

        assert_eq!(failure.code, 0);
        assert!(failure.errors.is_empty());
        assert!(!failure.message.is_empty());
    }

    #[tokio::test]
    async fn test_observer_receives_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let observer = Arc::new(RecordingObserver::default());
        let provider = mock_provider(&mock_server).with_observer(observer.clone());

        provider.send(&message()).await;

        assert_eq!(observer.recorded.load(Ordering::SeqCst), 1);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_observer_receives_failure_detail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": [{"message": "Invalid from", "field": "from"}]
            })))
            .mount(&mock_server)
            .await;

        let observer = Arc::new(RecordingObserver::default());
        let provider = mock_provider(&mock_server).with_observer(observer.clone());

        provider.send(&message()).await;

        assert_eq!(observer.recorded.load(Ordering::SeqCst), 0);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);

        let failure = observer.last_failure.lock().unwrap().clone().unwrap();
        assert_eq!(failure.errors, vec!["Invalid from - from.".to_string()]);
    }

    #[tokio::test]
    async fn test_send_with_attachment_includes_payload() {
        let mock_server = MockServer::start().await;

        let dir = tempfile::tempdir().unwrap();
        let attachment_path = dir.path().join("note.txt");
        std::fs::write(&attachment_path, b"hello world").unwrap();

        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(body_partial_json(serde_json::json!({
                "attachments": [{
                    "type": "text/plain",
                    "filename": "note.txt",
                    "disposition": "attachment",
                    "content": "aGVsbG8gd29ybGQ="
                }]
            })))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let provider = mock_provider(&mock_server);
        let mut message = message();
        message.attachments = vec![attachment_path];

        let result = provider.send(&message).await;

        assert!(result.is_sent());
    }
}
