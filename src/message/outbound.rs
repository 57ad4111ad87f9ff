use std::fmt::{self, Write};

use chrono::Utc;
use quick_xml::escape::escape;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::message::inbound::InboundMessage;

/// A reply the platform understands in both delivery modes.
pub trait Outbound {
    /// XML body returned directly on the webhook call.
    fn to_pull(&self) -> Result<String>;

    /// JSON body for the custom-message send endpoint.
    fn to_push(&self) -> Result<String>;
}

/// Fields shared by every outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u64,
    pub from: String,
    pub to: String,
    pub time: i64,
    pub kind: String,
}

impl Header {
    /// Header for a reply to `msg`: sender and recipient swapped, stamped with the current time.
    pub fn reply_to(msg: &InboundMessage, kind: &str) -> Self {
        Self {
            id: 0,
            from: msg.to.clone(),
            to: msg.from.clone(),
            time: Utc::now().timestamp(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMessage {
    pub header: Header,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMessage {
    pub header: Header,
    pub media_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceMessage {
    pub header: Header,
    pub media_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub url: String,
    pub pic_url: String,
}

/// Article list, rendered in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsMessage {
    pub header: Header,
    pub articles: Vec<Article>,
}

impl TextMessage {
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        Self {
            header: Header::reply_to(msg, "text"),
            content: content.into(),
        }
    }
}

fn json(s: &str) -> Value {
    Value::from(s)
}

fn pull_header(out: &mut String, h: &Header) -> fmt::Result {
    write!(
        out,
        "<ToUserName>{}</ToUserName><FromUserName>{}</FromUserName>\
         <CreateTime>{}</CreateTime><MsgType>{}</MsgType>",
        escape(&h.to),
        escape(&h.from),
        h.time,
        escape(&h.kind)
    )
}

fn push_header(out: &mut String, h: &Header) -> fmt::Result {
    write!(out, "\"touser\":{}, \"msgtype\":{},", json(&h.to), json(&h.kind))
}

/// The header's `MsgType` must name the payload being rendered.
fn check_kind(h: &Header, kind: &str) -> Result<()> {
    if h.kind == kind {
        Ok(())
    } else {
        Err(Error::Render(format!("{kind} payload with msgtype {:?}", h.kind)))
    }
}

/// Wraps a kind-specific payload writer into a full pull document.
fn render_pull(
    h: &Header,
    kind: &str,
    body: impl FnOnce(&mut String) -> fmt::Result,
) -> Result<String> {
    check_kind(h, kind)?;
    let mut out = String::from("<xml>");
    pull_header(&mut out, h)?;
    body(&mut out)?;
    out.push_str("</xml>");
    Ok(out)
}

fn render_push(
    h: &Header,
    kind: &str,
    body: impl FnOnce(&mut String) -> fmt::Result,
) -> Result<String> {
    check_kind(h, kind)?;
    let mut out = String::from("{");
    push_header(&mut out, h)?;
    body(&mut out)?;
    out.push('}');
    Ok(out)
}

impl Outbound for TextMessage {
    fn to_pull(&self) -> Result<String> {
        render_pull(&self.header, "text", |out| {
            write!(out, "<Content>{}</Content>", escape(&self.content))
        })
    }

    fn to_push(&self) -> Result<String> {
        render_push(&self.header, "text", |out| {
            write!(out, "\"text\":{{\"content\":{}}}", json(&self.content))
        })
    }
}

impl Outbound for ImageMessage {
    fn to_pull(&self) -> Result<String> {
        render_pull(&self.header, "image", |out| {
            write!(out, "<Image><MediaId>{}</MediaId></Image>", escape(&self.media_id))
        })
    }

    fn to_push(&self) -> Result<String> {
        render_push(&self.header, "image", |out| {
            write!(out, "\"image\":{{\"media_id\":{}}}", json(&self.media_id))
        })
    }
}

impl Outbound for VoiceMessage {
    fn to_pull(&self) -> Result<String> {
        render_pull(&self.header, "voice", |out| {
            write!(out, "<Voice><MediaId>{}</MediaId></Voice>", escape(&self.media_id))
        })
    }

    fn to_push(&self) -> Result<String> {
        render_push(&self.header, "voice", |out| {
            write!(out, "\"voice\":{{\"media_id\":{}}}", json(&self.media_id))
        })
    }
}

impl Outbound for NewsMessage {
    fn to_pull(&self) -> Result<String> {
        render_pull(&self.header, "news", |out| {
            write!(out, "<ArticleCount>{}</ArticleCount><Articles>", self.articles.len())?;
            for a in &self.articles {
                write!(
                    out,
                    "<item><Title>{}</Title><Description>{}</Description>\
                     <PicUrl>{}</PicUrl><Url>{}</Url></item>",
                    escape(&a.title),
                    escape(&a.description),
                    escape(&a.pic_url),
                    escape(&a.url)
                )?;
            }
            out.write_str("</Articles>")
        })
    }

    fn to_push(&self) -> Result<String> {
        render_push(&self.header, "news", |out| {
            out.write_str("\"news\":{\"articles\" : [ ")?;
            for (i, a) in self.articles.iter().enumerate() {
                if i > 0 {
                    out.write_char(',')?;
                }
                write!(
                    out,
                    "{{\"title\" : {}, \"description\" : {}, \"url\" : {}, \"picurl\" : {}}}",
                    json(&a.title),
                    json(&a.description),
                    json(&a.url),
                    json(&a.pic_url)
                )?;
            }
            out.write_str("]}")
        })
    }
}
