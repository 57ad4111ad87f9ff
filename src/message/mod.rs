//! Platform message envelopes.
//!
//! Inbound messages arrive as a flat `<xml>` document and are decoded into
//! [`InboundMessage`]; handlers narrow them with the `as_*` projections.
//! Replies are built from the outbound types and rendered either as a pull
//! response (XML returned on the webhook call) or as a push payload (JSON for
//! the custom-message send endpoint).

pub mod inbound;
pub mod outbound;

pub use inbound::{GeoEvent, InboundMessage, ScanEvent, SubscribeEvent, ViewEvent};
pub use outbound::{Article, Header, ImageMessage, NewsMessage, Outbound, TextMessage, VoiceMessage};
