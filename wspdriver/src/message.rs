use crate::capability::{Browser, Node};
use crate::error::{DriverError, Result};
use crate::selectors;
use crate::session::Session;
use chrono::{NaiveDate, NaiveDateTime};
use image::DynamicImage;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

const METADATA_PATTERN: &str = r"^\[(\d+):(\d+),\s(\d+)/(\d+)/(\d+)\]\s(.*):";
const IDENTITY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    AnimatedImage,
    System,
}

const VARIANT_MARKERS: [(&str, MessageKind); 4] = [
    (selectors::TEXT_MARKER, MessageKind::Text),
    (selectors::IMAGE_MARKER, MessageKind::Image),
    (selectors::ANIMATED_IMAGE_MARKER, MessageKind::AnimatedImage),
    (selectors::SYSTEM_MARKER, MessageKind::System),
];

impl MessageKind {
    /// First variant whose marker appears in the node's class list.
    pub fn from_markers(classes: &str) -> Result<Self> {
        VARIANT_MARKERS
            .iter()
            .find(|(marker, _)| classes.contains(marker))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| DriverError::UnknownMessageType(classes.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    is_outbound: bool,
    identity: String,
    timestamp: NaiveDateTime,
    author: String,
    body: String,
}

impl TextMessage {
    pub fn new(
        is_outbound: bool,
        timestamp: NaiveDateTime,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let author = author.into();
        let body = body.into();
        let identity = digest(&format!(
            "{}{}{}",
            timestamp.format(IDENTITY_TIME_FORMAT),
            author,
            body
        ));
        Self {
            is_outbound,
            identity,
            timestamp,
            author,
            body,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMessage {
    is_outbound: bool,
    identity: String,
    thumbnail: String,
    display_time: String,
}

impl ImageMessage {
    pub fn new(
        is_outbound: bool,
        thumbnail: impl Into<String>,
        display_time: impl Into<String>,
    ) -> Self {
        let thumbnail = thumbnail.into();
        let display_time = display_time.into();
        let identity = digest(&format!("{thumbnail}{display_time}"));
        Self {
            is_outbound,
            identity,
            thumbnail,
            display_time,
        }
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn display_time(&self) -> &str {
        &self.display_time
    }

    /// Opens the thumbnail reference in a separate view and captures the
    /// rendered image.
    pub fn fetch_full_image<B: Browser>(&self, session: &Session<B>) -> Result<DynamicImage> {
        session.get_image(&self.thumbnail)
    }
}

/// Same payload as an image; identity is namespaced so an animation never
/// collides with a still image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimatedImageMessage {
    is_outbound: bool,
    identity: String,
    thumbnail: String,
    display_time: String,
}

impl AnimatedImageMessage {
    pub fn new(
        is_outbound: bool,
        thumbnail: impl Into<String>,
        display_time: impl Into<String>,
    ) -> Self {
        let thumbnail = thumbnail.into();
        let display_time = display_time.into();
        let identity = digest(&format!("gif{thumbnail}{display_time}"));
        Self {
            is_outbound,
            identity,
            thumbnail,
            display_time,
        }
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    pub fn display_time(&self) -> &str {
        &self.display_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemMessage {
    is_outbound: bool,
    identity: String,
}

impl SystemMessage {
    pub fn new(is_outbound: bool, notice: &str) -> Self {
        Self {
            is_outbound,
            identity: digest(&format!("system{notice}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Text(TextMessage),
    Image(ImageMessage),
    AnimatedImage(AnimatedImageMessage),
    System(SystemMessage),
}

impl Message {
    /// Classifies a raw message node and builds the matching variant.
    pub fn from_node<N: Node>(node: &N) -> Result<Self> {
        let classes = node
            .attribute(selectors::CLASS_ATTRIBUTE)?
            .unwrap_or_default();
        let kind = MessageKind::from_markers(&classes)?;
        let is_outbound = classes
            .split_whitespace()
            .any(|class| class == selectors::OUTBOUND_MARKER);

        let message = match kind {
            MessageKind::Text => Message::Text(parse_text(node, is_outbound)?),
            MessageKind::Image => {
                let (thumbnail, display_time) = parse_thumbnail(node)?;
                Message::Image(ImageMessage::new(is_outbound, thumbnail, display_time))
            }
            MessageKind::AnimatedImage => {
                let (thumbnail, display_time) = parse_thumbnail(node)?;
                Message::AnimatedImage(AnimatedImageMessage::new(
                    is_outbound,
                    thumbnail,
                    display_time,
                ))
            }
            MessageKind::System => {
                let notice = node.text()?;
                Message::System(SystemMessage::new(is_outbound, notice.trim()))
            }
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Text(_) => MessageKind::Text,
            Message::Image(_) => MessageKind::Image,
            Message::AnimatedImage(_) => MessageKind::AnimatedImage,
            Message::System(_) => MessageKind::System,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Message::Text(message) => &message.identity,
            Message::Image(message) => &message.identity,
            Message::AnimatedImage(message) => &message.identity,
            Message::System(message) => &message.identity,
        }
    }

    pub fn is_outbound(&self) -> bool {
        match self {
            Message::Text(message) => message.is_outbound,
            Message::Image(message) => message.is_outbound,
            Message::AnimatedImage(message) => message.is_outbound,
            Message::System(message) => message.is_outbound,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(message) => write!(
                f,
                "[{}] {}: {}",
                message.timestamp.format(IDENTITY_TIME_FORMAT),
                if message.is_outbound { "Me" } else { message.author.as_str() },
                message.body
            ),
            Message::Image(message) => write!(
                f,
                "[{}] {}: <image {}>",
                message.display_time,
                sender(message.is_outbound),
                message.thumbnail
            ),
            Message::AnimatedImage(message) => write!(
                f,
                "[{}] {}: <gif {}>",
                message.display_time,
                sender(message.is_outbound),
                message.thumbnail
            ),
            Message::System(_) => write!(f, "<system message>"),
        }
    }
}

fn sender(is_outbound: bool) -> &'static str {
    if is_outbound {
        "Me"
    } else {
        "Them"
    }
}

fn parse_text<N: Node>(node: &N, is_outbound: bool) -> Result<TextMessage> {
    let bubble = node
        .find(selectors::BUBBLE)?
        .ok_or(DriverError::MissingElement(selectors::BUBBLE))?;
    let metadata = bubble
        .attribute(selectors::METADATA_ATTRIBUTE)?
        .ok_or_else(|| DriverError::MetadataParse(String::new()))?;
    let (timestamp, author) = parse_metadata(&metadata)?;
    let body = node
        .find(selectors::TEXT_BODY)?
        .ok_or(DriverError::MissingElement(selectors::TEXT_BODY))?;
    let body = resolve_glyphs(&body.inner_html()?);
    Ok(TextMessage::new(is_outbound, timestamp, author, body))
}

fn parse_thumbnail<N: Node>(node: &N) -> Result<(String, String)> {
    let thumbnail = node
        .find(selectors::THUMBNAIL)?
        .ok_or(DriverError::MissingElement(selectors::THUMBNAIL))?
        .attribute(selectors::SOURCE_ATTRIBUTE)?
        .ok_or(DriverError::MissingElement(selectors::SOURCE_ATTRIBUTE))?;
    let display_time = node
        .find(selectors::DISPLAY_TIME)?
        .ok_or(DriverError::MissingElement(selectors::DISPLAY_TIME))?
        .text()?;
    Ok((thumbnail, display_time.trim().to_string()))
}

fn metadata_regex() -> &'static Regex {
    static METADATA: OnceLock<Regex> = OnceLock::new();
    METADATA.get_or_init(|| Regex::new(METADATA_PATTERN).expect("metadata pattern compiles"))
}

/// Parses `[HH:MM, DD/MM/YYYY] Author:` into a minute-precision timestamp and
/// the author's display name.
pub fn parse_metadata(metadata: &str) -> Result<(NaiveDateTime, String)> {
    let invalid = || DriverError::MetadataParse(metadata.to_string());
    let captures = metadata_regex().captures(metadata).ok_or_else(invalid)?;
    let field = |index: usize| -> Result<u32> {
        captures
            .get(index)
            .and_then(|value| value.as_str().parse().ok())
            .ok_or_else(invalid)
    };
    let (hour, minute) = (field(1)?, field(2)?);
    let (day, month) = (field(3)?, field(4)?);
    let year = i32::try_from(field(5)?).map_err(|_| invalid())?;
    let timestamp = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(invalid)?;
    let author = captures
        .get(6)
        .map(|value| value.as_str().to_string())
        .unwrap_or_default();
    Ok((timestamp, author))
}

/// Flattens a text body's markup to what a reader sees, replacing each glyph
/// image by its fallback text.
pub fn resolve_glyphs(html: &str) -> String {
    use scraper::{Html, Node as HtmlNode};

    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for node in fragment.root_element().descendants() {
        match node.value() {
            HtmlNode::Text(text) => out.push_str(text),
            HtmlNode::Element(element) if element.name() == "br" => out.push('\n'),
            HtmlNode::Element(element)
                if element.name() == selectors::GLYPH_TAG
                    && element.classes().any(|class| class == selectors::GLYPH_CLASS) =>
            {
                if let Some(fallback) = element.attr(selectors::GLYPH_FALLBACK_ATTRIBUTE) {
                    out.push_str(fallback);
                }
            }
            _ => {}
        }
    }
    out
}

fn digest(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}
