use anyhow::Result;
use std::fmt;
use std::time::Duration;

#[cfg(test)]
pub mod mock;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    Located,
    Clickable,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Returned (inside an `anyhow::Error`) by [`Browser::wait_until`] when the
/// condition is not met in time.
#[derive(Debug, Clone)]
pub struct WaitTimeout {
    pub selector: String,
    pub timeout: Duration,
}

impl fmt::Display for WaitTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timed out after {:?} waiting for {}",
            self.timeout, self.selector
        )
    }
}

impl std::error::Error for WaitTimeout {}

pub trait Node: Clone {
    fn text(&self) -> Result<String>;
    fn attribute(&self, name: &str) -> Result<Option<String>>;
    fn inner_html(&self) -> Result<String>;
    fn find(&self, selector: &str) -> Result<Option<Self>>;
    fn find_all(&self, selector: &str) -> Result<Vec<Self>>;
    fn click(&self) -> Result<()>;
    fn scroll_into_view(&self) -> Result<()>;
    fn send_keys(&self, text: &str) -> Result<()>;
    fn press_enter(&self) -> Result<()>;
    fn bounds(&self) -> Result<Bounds>;
}

/// Blocking browser capability the session drives. One implementation owns
/// one browser window; callers serialize all calls.
pub trait Browser {
    type Node: Node;

    fn navigate(&self, url: &str) -> Result<()>;
    fn find(&self, selector: &str) -> Result<Option<Self::Node>>;
    fn find_all(&self, selector: &str) -> Result<Vec<Self::Node>>;
    fn wait_until(
        &self,
        selector: &str,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<Self::Node>;
    /// PNG encoded capture of the active view, in device pixels.
    fn screenshot(&self) -> Result<Vec<u8>>;
    /// Device pixels per CSS pixel in the active view.
    fn device_pixel_ratio(&self) -> Result<f64>;
    /// Opens a blank view without activating it and returns its index.
    fn open_new_view(&self) -> Result<usize>;
    fn close_view(&self, index: usize) -> Result<()>;
    fn switch_view(&self, index: usize) -> Result<()>;
    fn quit(&self) -> Result<()>;
}

pub fn is_wait_timeout(err: &anyhow::Error) -> bool {
    err.is::<WaitTimeout>()
}
