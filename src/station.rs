use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::{ApiConfig, StationConfig};
use crate::dispatch::{Processor, ProcessorTable};
use crate::error::{Error, Result};
use crate::message::InboundMessage;
use crate::processors;
use crate::signature;

/// One platform account: verifies webhook calls, routes inbound messages to
/// processors and owns the API client used for pushes.
///
/// Register processors before sharing the station; dispatch only needs `&self`.
pub struct Station {
    id: String,
    token: String,
    processors: ProcessorTable,
    api: Arc<ApiClient>,
}

impl Station {
    pub fn new(config: &StationConfig, api: ApiClient) -> Self {
        Self {
            id: config.id.clone(),
            token: config.token.clone(),
            processors: ProcessorTable::new(processors::unsupported()),
            api: Arc::new(api),
        }
    }

    pub fn from_config(station: &StationConfig, api: &ApiConfig) -> Result<Self> {
        Ok(Self::new(station, ApiClient::new(api.clone())?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared API client; handlers clone it to push messages on their own.
    pub fn api(&self) -> Arc<ApiClient> {
        Arc::clone(&self.api)
    }

    pub fn add_processor(&mut self, processor: Processor) {
        debug!("Registering processor {}", processor.key());
        self.processors.insert(processor);
    }

    /// Replace the processor used when no key matches.
    pub fn set_default_processor(&mut self, processor: Processor) {
        self.processors.set_default(processor);
    }

    /// Check a webhook call's signature against the station token.
    pub fn is_valid(&self, timestamp: &str, nonce: &str, signature: &str) -> Result<()> {
        if signature::verify(timestamp, nonce, &self.token, signature) {
            Ok(())
        } else {
            warn!("Rejected request with invalid signature (timestamp={})", timestamp);
            Err(Error::InvalidRequest)
        }
    }

    /// Parse an inbound body, run the matching processor and return its response.
    pub async fn process(&self, body: &[u8]) -> Result<String> {
        let msg = InboundMessage::parse(body)?;
        debug!("Parsed message: {:?}", msg);
        self.processors.dispatch(&msg).await
    }

    pub async fn send(&self, payload: impl Into<String>) -> Result<()> {
        self.api.send(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station() -> Station {
        Station::from_config(
            &StationConfig {
                id: "test".to_string(),
                token: "foobar".to_string(),
            },
            &ApiConfig {
                app_id: "a".to_string(),
                app_secret: "b".to_string(),
                base_url: "http://127.0.0.1:9".to_string(),
                timeout_secs: 1,
            },
        )
        .unwrap()
    }

    const SCENARIO: &[u8] = b"<xml><ToUserName>A</ToUserName><FromUserName>B</FromUserName>\
        <CreateTime>100</CreateTime><MsgType>text</MsgType><Content>hi</Content></xml>";

    #[test]
    fn test_is_valid() {
        let s = station();
        s.is_valid(
            "1232234123451",
            "adav2341asdf=-eq",
            "720fd5568eabf4cb9f9bd81dea494880d138253a",
        )
        .unwrap();

        let err = s
            .is_valid(
                "1232234123451",
                "adav2341as",
                "720fd5568eabf4cb9f9bd81dea494880d138253a",
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest));
    }

    #[tokio::test]
    async fn test_echo_scenario() {
        let mut s = station();
        s.add_processor(processors::echo_text());

        let reply = s.process(SCENARIO).await.unwrap();
        assert!(reply.starts_with("<xml><ToUserName>B</ToUserName><FromUserName>A</FromUserName>"));
        assert!(reply.contains("<MsgType>text</MsgType><Content>hi</Content></xml>"));
    }

    #[tokio::test]
    async fn test_unregistered_kind_uses_default() {
        let s = station();
        let reply = s.process(SCENARIO).await.unwrap();
        let parsed = InboundMessage::parse(reply.as_bytes()).unwrap();
        assert_eq!(parsed.to, "B");
        assert_eq!(parsed.from, "A");
        assert_eq!(parsed.content, processors::UNSUPPORTED_REPLY);
    }

    #[tokio::test]
    async fn test_custom_default_processor() {
        let mut s = station();
        s.set_default_processor(Processor::from_fn("*", |msg| Ok(format!("fallback:{}", msg.kind))));
        assert_eq!(s.process(SCENARIO).await.unwrap(), "fallback:text");
    }

    #[tokio::test]
    async fn test_event_routing() {
        let mut s = station();
        s.add_processor(processors::click());
        s.add_processor(Processor::from_fn("event.subscribe", |msg| {
            let sub = msg.as_subscribe_event()?;
            Ok(format!("welcome {} via {}", sub.user_id, sub.channel))
        }));

        let click = b"<xml><FromUserName>u</FromUserName><MsgType>event</MsgType>\
            <Event>CLICK</Event><EventKey>menu_1</EventKey></xml>";
        assert_eq!(s.process(click).await.unwrap(), "");

        let subscribe = b"<xml><FromUserName>u</FromUserName><MsgType>event</MsgType>\
            <Event>subscribe</Event><EventKey>qrscene_7</EventKey></xml>";
        assert_eq!(s.process(subscribe).await.unwrap(), "welcome u via 7");
    }

    #[tokio::test]
    async fn test_parse_error_skips_processors() {
        let mut s = station();
        s.set_default_processor(Processor::from_fn("*", |_| panic!("must not be called")));
        assert!(matches!(
            s.process(b"<xml><MsgType>text").await,
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_handler_error_aborts_request() {
        let mut s = station();
        s.add_processor(Processor::from_fn("image.", |msg| {
            msg.as_text_message().map(|_| String::new())
        }));
        let image = b"<xml><MsgType>image</MsgType><MediaId>m</MediaId></xml>";
        assert!(matches!(
            s.process(image).await,
            Err(Error::TypeMismatch { .. })
        ));
    }
}
