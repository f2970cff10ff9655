//! Default JSON-over-HTTP transport binding
//!
//! One concrete [`Transport`] for platforms exposing a conventional
//! login / refresh / cursor-poll / send surface. The core never depends
//! on this module; deployments with a different wire protocol implement
//! the trait themselves.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use crate::auth::Credentials;
use crate::config::HttpConfig;
use crate::error::{Error, Result, TransportErrorKind};
use crate::message::{Ack, OutboundMessage};
use crate::session::Session;
use crate::transport::{PollBatch, SessionPayload, Transport};

/// HTTP binding of the platform transport
pub struct HttpTransport {
    config: HttpConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Map an HTTP status onto the transport error taxonomy. `None` means
    /// the call succeeded.
    fn classify_status(status: StatusCode) -> Option<TransportErrorKind> {
        if status.is_success() {
            None
        } else if status == StatusCode::UNAUTHORIZED {
            Some(TransportErrorKind::SessionExpired)
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Some(TransportErrorKind::Retryable)
        } else {
            Some(TransportErrorKind::Terminal)
        }
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        match Self::classify_status(response.status()) {
            None => Ok(response),
            Some(kind) => Err(Error::Transport {
                kind,
                message: format!("{} from {}", response.status(), response.url()),
            }),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn login(&self, credentials: &Credentials) -> Result<SessionPayload> {
        let body = match credentials {
            Credentials::Cookie { cookies, account } => json!({
                "strategy": "cookie",
                "cookies": cookies,
                "account": account,
                "clientType": self.config.client_type,
                "deviceType": self.config.device_type,
            }),
            Credentials::Password {
                email,
                secret,
                account,
            } => json!({
                "strategy": "password",
                "email": email,
                "password": secret,
                "account": account,
                "clientType": self.config.client_type,
                "deviceType": self.config.device_type,
            }),
        };

        let response = self
            .client
            .post(self.url("/api/v1/login"))
            .json(&body)
            .send()
            .await?;
        let payload = Self::check(response)?.json::<SessionPayload>().await?;
        Ok(payload)
    }

    async fn refresh(&self, session: &Session) -> Result<SessionPayload> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::session_expired("session has no refresh token"))?;

        let response = self
            .client
            .post(self.url("/api/v1/refresh"))
            .bearer_auth(refresh_token)
            .send()
            .await?;
        let payload = Self::check(response)?.json::<SessionPayload>().await?;
        Ok(payload)
    }

    async fn poll(&self, session: &Session, cursor: Option<&str>) -> Result<PollBatch> {
        let mut query: Vec<(&str, String)> = vec![
            ("pingSecs", self.config.ping_secs.to_string()),
            ("clientType", self.config.client_type.clone()),
            ("deviceType", self.config.device_type.clone()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(self.url("/api/v1/events"))
            .bearer_auth(&session.token)
            .query(&query)
            .send()
            .await?;
        let batch = Self::check(response)?.json::<PollBatch>().await?;
        Ok(batch)
    }

    async fn send(
        &self,
        session: &Session,
        contact_id: &str,
        message: &OutboundMessage,
        send_id: &str,
    ) -> Result<Ack> {
        let mut body = serde_json::to_value(message)?;
        if let Some(map) = body.as_object_mut() {
            map.insert("sendId".to_string(), json!(send_id));
        }

        let response = self
            .client
            .post(self.url(&format!("/api/v1/messages/{}/send", contact_id)))
            .bearer_auth(&session.token)
            .json(&body)
            .send()
            .await?;
        let value = Self::check(response)?.json::<serde_json::Value>().await?;

        let message_id = value
            .get("messageId")
            .and_then(|v| v.as_str())
            .map(String::from);
        Ok(Ack {
            send_id: send_id.to_string(),
            message_id,
        })
    }
}
