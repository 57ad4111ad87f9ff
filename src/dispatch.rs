use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::message::InboundMessage;

/// Business logic for one kind of inbound message.
///
/// The returned string is sent back verbatim as the webhook response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, msg: &InboundMessage) -> Result<String>;
}

/// Adapts a plain closure into a [`Handler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&InboundMessage) -> Result<String> + Send + Sync,
{
    async fn handle(&self, msg: &InboundMessage) -> Result<String> {
        (self.0)(msg)
    }
}

/// A handler bound to the dispatch key it serves (`"<kind>.<event>"`).
#[derive(Clone)]
pub struct Processor {
    key: String,
    handler: Arc<dyn Handler>,
}

impl Processor {
    pub fn new(key: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self {
            key: key.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn from_fn<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&InboundMessage) -> Result<String> + Send + Sync + 'static,
    {
        Self::new(key, FnHandler(f))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn handle(&self, msg: &InboundMessage) -> Result<String> {
        self.handler.handle(msg).await
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor").field("key", &self.key).finish()
    }
}

/// `"<kind>.<event>"`; the event part is empty for plain messages, e.g. `"text."`.
pub fn dispatch_key(msg: &InboundMessage) -> String {
    format!("{}.{}", msg.kind, msg.event)
}

/// Keyed processors plus the fallback used when no key matches.
#[derive(Debug, Clone)]
pub struct ProcessorTable {
    processors: HashMap<String, Processor>,
    default: Processor,
}

impl ProcessorTable {
    pub fn new(default: Processor) -> Self {
        Self {
            processors: HashMap::new(),
            default,
        }
    }

    /// Register a processor under its key; a later registration replaces an earlier one.
    pub fn insert(&mut self, processor: Processor) {
        self.processors.insert(processor.key.clone(), processor);
    }

    pub fn set_default(&mut self, processor: Processor) {
        self.default = processor;
    }

    pub async fn dispatch(&self, msg: &InboundMessage) -> Result<String> {
        let key = dispatch_key(msg);
        match self.processors.get(&key) {
            Some(processor) => {
                debug!("Dispatching {} to its processor", key);
                processor.handle(msg).await
            }
            None => {
                debug!("No processor for {}, using default", key);
                self.default.handle(msg).await
            }
        }
    }
}
