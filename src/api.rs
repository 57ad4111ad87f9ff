use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::message::Outbound;

/// Bearer credential for outbound calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Usable iff `now` is strictly before the expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// `errcode`/`errmsg` pair the platform attaches to API responses.
#[derive(Debug, Default, Deserialize)]
struct PlatformStatus {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl PlatformStatus {
    fn check(&self) -> Result<()> {
        if self.errcode == 0 {
            Ok(())
        } else {
            Err(Error::Protocol {
                code: self.errcode,
                message: self.errmsg.clone(),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(flatten)]
    status: PlatformStatus,
}

impl TokenResponse {
    /// Lifetimes past the representable range clamp to the far end of it.
    fn into_token(self, acquired_at: DateTime<Utc>) -> AccessToken {
        let expires_at = TimeDelta::try_seconds(self.expires_in)
            .and_then(|lifetime| acquired_at.checked_add_signed(lifetime))
            .unwrap_or(if self.expires_in > 0 {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            });
        AccessToken {
            token: self.access_token,
            expires_at,
        }
    }
}

/// Follower profile returned by the user info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub subscribe: u32,
    #[serde(rename = "openid")]
    pub open_id: String,
    pub nickname: String,
    #[serde(rename = "sex")]
    pub gender: u32,
    pub language: String,
    pub city: String,
    pub province: String,
    pub country: String,
    #[serde(rename = "headimgurl")]
    pub avatar: String,
    pub subscribe_time: i64,
}

/// Client for the platform's HTTP API. Caches the access token between calls.
pub struct ApiClient {
    client: reqwest::Client,
    config: ApiConfig,
    token: Mutex<Option<AccessToken>>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Return the cached token, fetching a fresh one if it is missing or expired.
    ///
    /// The lock is not held across the fetch: concurrent callers may refresh
    /// at the same time, and the last one to finish wins.
    pub async fn access_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.token.lock().await.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }

        let token = self.fetch_token().await?;
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let url = self.endpoint("cgi-bin/token");
        debug!("Requesting access token from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("appid", self.config.app_id.as_str()),
                ("secret", self.config.app_secret.as_str()),
                ("grant_type", "client_credential"),
            ])
            .send()
            .await?;
        let acquired_at = Utc::now();

        let body = read_body(response).await?;
        let parsed: TokenResponse = serde_json::from_str(&body)?;
        parsed.status.check()?;

        info!("Acquired access token (expires in {}s)", parsed.expires_in);
        Ok(parsed.into_token(acquired_at))
    }

    /// Push a JSON payload through the custom-message send endpoint.
    pub async fn send(&self, payload: impl Into<String>) -> Result<()> {
        let result = self.try_send(payload.into()).await;
        if let Err(e) = &result {
            warn!("Custom message send failed: {}", e);
        }
        result
    }

    /// Render `msg` as a push payload and send it.
    pub async fn send_message(&self, msg: &impl Outbound) -> Result<()> {
        self.send(msg.to_push()?).await
    }

    async fn try_send(&self, payload: String) -> Result<()> {
        let token = self.access_token().await?;
        let url = self.endpoint("cgi-bin/message/custom/send");

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token.token.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let body = read_body(response).await?;
        let status: PlatformStatus = serde_json::from_str(&body)?;
        status.check()
    }

    /// Look up a follower's profile by open id.
    pub async fn user_info(&self, open_id: &str) -> Result<UserInfo> {
        let token = self.access_token().await?;
        let url = self.endpoint("cgi-bin/user/info");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_token", token.token.as_str()),
                ("openid", open_id),
                ("lang", "zh_CN"),
            ])
            .send()
            .await?;

        let body = read_body(response).await?;
        serde_json::from_str::<PlatformStatus>(&body)?.check()?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Read the response body, turning HTTP error statuses into [`Error::Api`].
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
