use async_trait::async_trait;
use reddify_core::{
    CoreError, NotificationError, NotificationResult, Notifier, PushMessage,
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

pub const PUSHOVER_API_BASE: &str = "https://api.pushover.net/1";

// Limits enforced by the messages endpoint.
pub const MAX_TITLE_CHARS: usize = 250;
pub const MAX_URL_CHARS: usize = 512;
pub const MAX_MESSAGE_CHARS: usize = 1024;

#[derive(Debug, Clone)]
pub struct PushoverClient {
    http_client: Client,
    api_key: String,
    api_base: String,
}

impl PushoverClient {
    pub fn new(api_key: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            http_client,
            api_key,
            api_base: PUSHOVER_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// POST a form and decode Pushover's JSON verdict. Pushover answers 4xx
    /// requests with a JSON body too, so the status code is not checked here.
    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<NotificationResult, CoreError> {
        let url = format!("{}{}", self.api_base, endpoint);
        let response = self.http_client.post(&url).form(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            error!("Unparseable Pushover response ({}) from {}: {}", status, endpoint, e);
            NotificationError::InvalidResponse {
                details: format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            }
            .into()
        })
    }

    /// Check the API token and user key before any stream is opened.
    pub async fn validate_user(&self, user: &str) -> Result<(), CoreError> {
        let result = self
            .post_form(
                "/users/validate.json",
                &[("token", self.api_key.as_str()), ("user", user)],
            )
            .await?;

        if result.is_ok() {
            info!("Pushover credentials validated");
            Ok(())
        } else {
            Err(NotificationError::InvalidCredentials {
                reason: result.errors.join("; "),
            }
            .into())
        }
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Form fields for a message, clipped to the endpoint's limits. Pushover
/// rejects a blank message, so an empty body falls back to the url.
pub fn message_fields(message: &PushMessage) -> [(&'static str, String); 4] {
    let body = if message.message.trim().is_empty() {
        message.url.as_str()
    } else {
        message.message.as_str()
    };

    [
        ("user", message.recipient.clone()),
        ("title", truncate_chars(&message.title, MAX_TITLE_CHARS)),
        ("url", truncate_chars(&message.url, MAX_URL_CHARS)),
        ("message", truncate_chars(body, MAX_MESSAGE_CHARS)),
    ]
}

#[async_trait]
impl Notifier for PushoverClient {
    async fn send_message(&self, message: &PushMessage) -> NotificationResult {
        let fields = message_fields(message);
        let mut form: Vec<(&str, &str)> = vec![("token", self.api_key.as_str())];
        form.extend(fields.iter().map(|(key, value)| (*key, value.as_str())));

        debug!("Sending Pushover message: {}", message.title);
        match self.post_form("/messages.json", &form).await {
            Ok(result) => result,
            Err(e) => {
                error!("Pushover request failed: {}", e);
                NotificationResult::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message(body: &str) -> PushMessage {
        PushMessage {
            recipient: "user-key".to_string(),
            title: "testsub: New Rocket launch".to_string(),
            url: "https://www.reddit.com/r/testsub/comments/abc/".to_string(),
            message: body.to_string(),
        }
    }

    async fn client_for(server: &MockServer) -> PushoverClient {
        PushoverClient::new("app-token".to_string())
            .unwrap()
            .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn test_send_message_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages.json"))
            .and(body_string_contains("token=app-token"))
            .and(body_string_contains("user=user-key"))
            .and(body_string_contains("title=testsub%3A+New+Rocket+launch"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": 1, "request": "req-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).await.send_message(&message("launch at noon")).await;
        assert!(result.is_ok());
        assert_eq!(result.request.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_rejected_message_is_not_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages.json"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "user": "invalid",
                "errors": ["user identifier is not a valid user, group, or subscribed user key"],
                "status": 0,
                "request": "req-2"
            })))
            .mount(&server)
            .await;

        let result = client_for(&server).await.send_message(&message("body")).await;
        assert!(!result.is_ok());
        assert_eq!(result.status, 0);
        assert!(result.errors[0].contains("user identifier"));
    }

    #[tokio::test]
    async fn test_server_error_is_not_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages.json"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let result = client_for(&server).await.send_message(&message("body")).await;
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("502"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_ok() {
        let client = PushoverClient::new("app-token".to_string())
            .unwrap()
            .with_api_base("http://127.0.0.1:9".to_string());

        let result = client.send_message(&message("body")).await;
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_body_falls_back_to_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages.json"))
            .and(body_string_contains(
                "message=https%3A%2F%2Fwww.reddit.com%2Fr%2Ftestsub%2Fcomments%2Fabc%2F",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).await.send_message(&message("")).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_message_fields_are_truncated() {
        let mut long = message(&"é".repeat(2000));
        long.title = "t".repeat(300);

        let fields = message_fields(&long);
        assert_eq!(fields[1].1.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(fields[3].1.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(fields[2].1, long.url);
    }

    #[tokio::test]
    async fn test_validate_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/validate.json"))
            .and(body_string_contains("user=good-user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/validate.json"))
            .and(body_string_contains("user=bad-user"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": 0,
                "errors": ["user key is invalid"]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.validate_user("good-user").await.is_ok());

        let err = client.validate_user("bad-user").await.unwrap_err();
        match err {
            CoreError::Notification(NotificationError::InvalidCredentials { reason }) => {
                assert_eq!(reason, "user key is invalid");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
