//! Stock processors wired up by the server binary.

use crate::dispatch::Processor;
use crate::message::{Outbound, TextMessage};

/// Reply sent for message kinds nobody handles ("feature not supported yet").
pub const UNSUPPORTED_REPLY: &str = "暂不支持该功能";

/// Echo text messages back to their sender.
pub fn echo_text() -> Processor {
    Processor::from_fn("text.", |msg| {
        let text = msg.as_text_message()?;
        TextMessage::reply_to(msg, text.content).to_pull()
    })
}

/// Menu clicks are acknowledged with an empty body.
pub fn click() -> Processor {
    Processor::from_fn("event.CLICK", |_| Ok(String::new()))
}

pub fn unsupported() -> Processor {
    Processor::from_fn("*", |msg| TextMessage::reply_to(msg, UNSUPPORTED_REPLY).to_pull())
}
