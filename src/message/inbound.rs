use std::borrow::Cow;
use std::str::FromStr;
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{Error, Result};
use crate::message::outbound::{Header, TextMessage};

/// Any message or event pushed by the platform.
///
/// Only the fields relevant to `kind` (and `event`, for events) are populated;
/// everything else keeps its zero value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundMessage {
    /// `MsgId`
    pub id: u64,
    /// `ToUserName`
    pub to: String,
    /// `FromUserName`
    pub from: String,
    /// `CreateTime`
    pub time: i64,
    /// `MsgType`, the only required element
    pub kind: String,
    pub content: String,
    // image | voice | video
    pub media_id: String,
    pub pic_url: String,
    // voice
    pub format: String,
    // video
    pub thumb_media_id: String,
    // location
    pub location_x: f64,
    pub location_y: f64,
    pub scale: u32,
    pub label: String,
    // link
    pub title: String,
    pub description: String,
    pub url: String,
    // event
    pub event: String,
    pub event_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub precision: f64,
    pub ticket: String,
}

/// Location reported by a `LOCATION` event.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEvent {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeEvent {
    pub user_id: String,
    /// Channel encoded in a `qrscene_<n>` event key, 0 when absent or unrecognized.
    pub channel: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub user_id: String,
    pub channel: i64,
}

/// Menu link click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    pub user_id: String,
    pub url: String,
}

static SUBSCRIBE_SCENE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"qrscene_([0-9]+)$").expect("static pattern is valid")
});

impl InboundMessage {
    /// Decode an inbound `<xml>` envelope.
    ///
    /// Character data is kept exactly as received. Unknown elements are
    /// skipped, a repeated element overwrites the earlier one and an empty
    /// numeric element decodes to zero.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let body = std::str::from_utf8(body).map_err(parse_error)?;
        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(false);

        if !open_root(&mut reader)? {
            return Err(Error::Parse("missing MsgType".to_string()));
        }

        let mut msg = InboundMessage::default();
        let mut has_kind = false;
        loop {
            match reader.read_event().map_err(parse_error)? {
                Event::Start(e) => {
                    let text = read_text(&mut reader)?;
                    has_kind |= msg.set_field(e.name().as_ref(), text)?;
                }
                Event::Empty(e) => {
                    has_kind |= msg.set_field(e.name().as_ref(), String::new())?;
                }
                Event::End(_) => break,
                Event::Eof => return Err(Error::Parse("unclosed <xml> element".to_string())),
                _ => {}
            }
        }

        if !has_kind {
            return Err(Error::Parse("missing MsgType".to_string()));
        }
        Ok(msg)
    }

    /// Store one element's text; returns true when it was `MsgType`.
    fn set_field(&mut self, name: &[u8], text: String) -> Result<bool> {
        match name {
            b"MsgId" => self.id = number("MsgId", &text)?,
            b"ToUserName" => self.to = text,
            b"FromUserName" => self.from = text,
            b"CreateTime" => self.time = number("CreateTime", &text)?,
            b"MsgType" => {
                self.kind = text;
                return Ok(true);
            }
            b"Content" => self.content = text,
            b"MediaId" => self.media_id = text,
            b"PicUrl" => self.pic_url = text,
            b"Format" => self.format = text,
            b"ThumbMediaId" => self.thumb_media_id = text,
            b"Location_X" => self.location_x = number("Location_X", &text)?,
            b"Location_Y" => self.location_y = number("Location_Y", &text)?,
            b"Scale" => self.scale = number("Scale", &text)?,
            b"Label" => self.label = text,
            b"Title" => self.title = text,
            b"Description" => self.description = text,
            b"url" => self.url = text,
            b"Event" => self.event = text,
            b"EventKey" => self.event_key = text,
            b"Latitude" => self.latitude = number("Latitude", &text)?,
            b"Longitude" => self.longitude = number("Longitude", &text)?,
            b"Precision" => self.precision = number("Precision", &text)?,
            b"Ticket" => self.ticket = text,
            _ => {}
        }
        Ok(false)
    }

    pub fn as_text_message(&self) -> Result<TextMessage> {
        if self.kind != "text" {
            return Err(Error::TypeMismatch {
                expected: "text message",
                actual: self.kind.clone(),
            });
        }

        Ok(TextMessage {
            header: Header {
                id: self.id,
                from: self.from.clone(),
                to: self.to.clone(),
                time: self.time,
                kind: self.kind.clone(),
            },
            content: self.content.clone(),
        })
    }

    pub fn as_geo_event(&self) -> Result<GeoEvent> {
        self.expect_event("LOCATION", "geo event")?;
        Ok(GeoEvent {
            user_id: self.from.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }

    pub fn as_subscribe_event(&self) -> Result<SubscribeEvent> {
        self.expect_event("subscribe", "subscribe event")?;

        let channel = SUBSCRIBE_SCENE
            .captures(&self.event_key)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);

        Ok(SubscribeEvent {
            user_id: self.from.clone(),
            channel,
        })
    }

    pub fn as_scan_event(&self) -> Result<ScanEvent> {
        self.expect_event("SCAN", "SCAN event")?;
        Ok(ScanEvent {
            user_id: self.from.clone(),
            channel: self.event_key.parse().unwrap_or(0),
        })
    }

    pub fn as_view_event(&self) -> Result<ViewEvent> {
        self.expect_event("VIEW", "VIEW event")?;
        Ok(ViewEvent {
            user_id: self.from.clone(),
            url: self.event_key.clone(),
        })
    }

    fn expect_event(&self, name: &str, expected: &'static str) -> Result<()> {
        if self.event == name {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected,
                actual: format!("{}.{}", self.kind, self.event),
            })
        }
    }
}

fn parse_error(e: impl std::fmt::Display) -> Error {
    Error::Parse(e.to_string())
}

/// Advance past the opening `<xml>` tag. Returns false for an empty `<xml/>`.
fn open_root(reader: &mut Reader<&[u8]>) -> Result<bool> {
    loop {
        let (e, has_children) = match reader.read_event().map_err(parse_error)? {
            Event::Start(e) => (e, true),
            Event::Empty(e) => (e, false),
            Event::Eof => return Err(Error::Parse("missing root element".to_string())),
            _ => continue,
        };
        let name = e.name();
        if name.as_ref() != b"xml" {
            return Err(Error::Parse(format!(
                "unexpected root element <{}>",
                String::from_utf8_lossy(name.as_ref())
            )));
        }
        return Ok(has_children);
    }
}

/// Collect the character data of the element just opened, up to its end tag.
/// Nested elements are skipped.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(parse_error)?),
            Event::CData(c) => {
                let raw: Cow<[u8]> = c.into_inner();
                text.push_str(std::str::from_utf8(&raw).map_err(parse_error)?);
            }
            Event::Start(e) => {
                reader.read_to_end(e.name()).map_err(parse_error)?;
            }
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(Error::Parse("unexpected end of document".to_string())),
            _ => {}
        }
    }
}

/// Numeric element text; surrounding whitespace is ignored and empty text is zero.
fn number<T>(field: &str, text: &str) -> Result<T>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let text = text.trim();
    if text.is_empty() {
        return Ok(T::default());
    }
    text.parse()
        .map_err(|e| Error::Parse(format!("invalid {field} {text:?}: {e}")))
}
