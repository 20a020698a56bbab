//! Blocking driver for the WhatsApp web client.
//!
//! A [`Session`] wraps one browser window behind the [`Browser`] capability
//! and exposes login, chat navigation, unread-message aggregation and
//! sending on top of it.

pub mod capability;
mod chat;
pub mod config;
mod error;
pub mod logging;
mod message;
mod outbound;
pub mod selectors;
mod session;
mod tracker;
mod unread;
mod user;

#[cfg(feature = "chrome")]
mod chrome;

pub use capability::{Bounds, Browser, Node, WaitCondition, WaitTimeout};
pub use chat::{Chat, MessageNodes, UnreadChats};
pub use config::Config;
pub use error::{DriverError, Result};
pub use message::{
    parse_metadata, resolve_glyphs, AnimatedImageMessage, ImageMessage, Message, MessageKind,
    SystemMessage, TextMessage,
};
pub use session::Session;
pub use tracker::{Deduplicated, ReadTracker};
pub use unread::UnreadMessages;
pub use user::User;

#[cfg(feature = "chrome")]
pub use chrome::{start, ChromeBrowser, ChromeNode};
