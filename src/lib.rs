//! Webhook adapter for the WeChat official-account platform.
//!
//! A [`Station`] verifies signed webhook calls, decodes the inbound `<xml>`
//! envelope, routes it by `"<kind>.<event>"` to a registered [`Processor`] and
//! returns the processor's reply. Outbound pushes go through [`ApiClient`],
//! which caches the platform access token between calls.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod processors;
pub mod server;
pub mod signature;
pub mod station;

pub use api::{AccessToken, ApiClient, UserInfo};
pub use config::Config;
pub use dispatch::{dispatch_key, Handler, Processor};
pub use error::{Error, Result};
pub use message::{InboundMessage, Outbound};
pub use station::Station;
