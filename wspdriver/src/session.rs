use crate::capability::{is_wait_timeout, Browser, Node, WaitCondition};
use crate::config::{Config, TimingConfig};
use crate::error::{DriverError, Result};
use crate::message::Message;
use crate::selectors;
use crate::tracker::{Deduplicated, ReadTracker};
use crate::user::User;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::DynamicImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One logged-in (or logging-in) web client session.
///
/// All calls block the caller. Blocking waits observe the session's
/// cancellation token; clone it with [`Session::cancellation_token`] to stop
/// a wait from elsewhere.
pub struct Session<B: Browser> {
    browser: B,
    timing: TimingConfig,
    cancel: CancellationToken,
    logged_in: AtomicBool,
    read_messages: Mutex<ReadTracker>,
    web_client_version: String,
}

impl<B: Browser> Session<B> {
    pub fn open(browser: B, config: &Config) -> Result<Self> {
        browser.navigate(&config.browser.url)?;
        browser.wait_until(
            selectors::APP_WRAPPER,
            WaitCondition::Located,
            config.timing.app_ready_timeout(),
        )?;
        let web_client_version = compute_web_client_version(&browser)?;
        info!(
            version = %web_client_version,
            revision = selectors::MARKUP_REVISION,
            "web client ready"
        );
        Ok(Self {
            browser,
            timing: config.timing.clone(),
            cancel: CancellationToken::new(),
            logged_in: AtomicBool::new(false),
            read_messages: Mutex::new(ReadTracker::new()),
            web_client_version,
        })
    }

    pub(crate) fn browser(&self) -> &B {
        &self.browser
    }

    pub(crate) fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn web_client_version(&self) -> &str {
        &self.web_client_version
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Blocks until either the main app or the login screen is showing.
    /// Once the main app has been seen the answer stays `true`.
    pub fn is_logged_in(&self) -> Result<bool> {
        if self.logged_in.load(Ordering::Acquire) {
            return Ok(true);
        }
        loop {
            if self.cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            if self.main_app_visible()? {
                return Ok(true);
            }
            if !self.browser.find_all(selectors::LOGIN_LOGO)?.is_empty() {
                return Ok(false);
            }
            sleep(self.timing.login_poll_interval());
        }
    }

    pub fn wait_for_login(&self, timeout: Option<Duration>) -> Result<()> {
        let interval = self.timing.wait_for_login_interval();
        let started = Instant::now();
        while timeout.map_or(true, |limit| started.elapsed() < limit) {
            if self.cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            if self.main_app_visible()? {
                return Ok(());
            }
            sleep(interval);
        }
        let seconds = timeout.unwrap_or_default().as_secs();
        warn!(seconds, "login did not complete in time");
        Err(DriverError::LoginTimeout(format!("{seconds} seconds passed")))
    }

    fn main_app_visible(&self) -> Result<bool> {
        if self.browser.find_all(selectors::MAIN_APP)?.is_empty() {
            return Ok(false);
        }
        if !self.logged_in.swap(true, Ordering::AcqRel) {
            info!("logged in");
        }
        Ok(true)
    }

    pub(crate) fn require_login(&self) -> Result<()> {
        if self.is_logged_in()? {
            Ok(())
        } else {
            Err(DriverError::NotLoggedIn)
        }
    }

    /// The login QR code as a `data:image/png;base64,...` reference.
    pub fn get_log_in_code(&self) -> Result<String> {
        if self.is_logged_in()? {
            return Err(DriverError::AlreadyLoggedIn);
        }
        info!("waiting for login code");
        self.wait_for(selectors::LOGIN_CODE_IMAGE, WaitCondition::Located)?
            .attribute(selectors::SOURCE_ATTRIBUTE)?
            .ok_or(DriverError::MissingElement(selectors::LOGIN_CODE_IMAGE))
    }

    pub fn login_code_image(&self) -> Result<DynamicImage> {
        let code = self.get_log_in_code()?;
        let encoded = code
            .strip_prefix(selectors::LOGIN_CODE_PREFIX)
            .unwrap_or(&code);
        let encoded: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
        let bytes = STANDARD.decode(encoded)?;
        Ok(image::load_from_memory(&bytes)?)
    }

    pub fn save_login_as_image(&self, path: &Path) -> Result<()> {
        self.login_code_image()?.save(path)?;
        info!(path = %path.display(), "login code saved");
        Ok(())
    }

    pub fn get_user_data(&self) -> Result<User> {
        self.require_login()?;

        self.wait_for(selectors::PROFILE_AVATAR, WaitCondition::Clickable)?
            .click()?;
        let name = self
            .wait_for(selectors::PROFILE_NAME, WaitCondition::Clickable)?
            .text()?;

        let photo = self
            .browser
            .wait_until(
                selectors::PROFILE_PHOTO,
                WaitCondition::Clickable,
                self.timing.locate_timeout(),
            )
            .map_err(|err| {
                if is_wait_timeout(&err) {
                    DriverError::AvatarNotFound
                } else {
                    DriverError::Transport(err)
                }
            })?;
        let avatar_url = photo
            .attribute(selectors::SOURCE_ATTRIBUTE)?
            .ok_or(DriverError::AvatarNotFound)?;
        let avatar = self.get_image(&avatar_url)?;

        sleep(self.timing.animation_delay());
        photo.click()?;
        self.wait_for(selectors::VIEW_PHOTO, WaitCondition::Clickable)?
            .click()?;
        let phone_number = self
            .wait_for(selectors::PHONE_NUMBER, WaitCondition::Located)?
            .text()?;

        self.wait_for(selectors::CLOSE_VIEWER, WaitCondition::Clickable)?
            .click()?;
        sleep(self.timing.animation_delay());
        self.wait_for(selectors::CLOSE_DRAWER, WaitCondition::Clickable)?
            .click()?;
        sleep(self.timing.animation_delay());

        Ok(User::new(phone_number, name, avatar))
    }

    /// Renders `url` in a second view and crops the screenshot to its image.
    /// The extra view is closed even when the capture fails.
    pub fn get_image(&self, url: &str) -> Result<DynamicImage> {
        let extra = self.browser.open_new_view()?;
        let captured = self
            .browser
            .switch_view(extra)
            .map_err(DriverError::from)
            .and_then(|_| self.capture_image(url));
        let restored = self
            .browser
            .close_view(extra)
            .and_then(|_| self.browser.switch_view(0));
        let image = captured?;
        restored?;
        Ok(image)
    }

    fn capture_image(&self, url: &str) -> Result<DynamicImage> {
        debug!(url, "capturing image in secondary view");
        self.browser.navigate(url)?;
        let bounds = self
            .wait_for(selectors::STANDALONE_IMAGE, WaitCondition::Located)?
            .bounds()?;
        let scale = self.browser.device_pixel_ratio()?;
        let screenshot = image::load_from_memory(&self.browser.screenshot()?)?;
        // Bounds are CSS pixels, the screenshot is device pixels.
        let px = |value: f64| (value * scale).max(0.0).round() as u32;
        Ok(screenshot.crop_imm(
            px(bounds.x),
            px(bounds.y),
            px(bounds.width),
            px(bounds.height),
        ))
    }

    pub fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.browser.screenshot()?)
    }

    pub fn save_screenshot(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.browser.screenshot()?)?;
        Ok(())
    }

    /// Filters `messages` down to the ones this session has not surfaced yet.
    pub fn ensure_no_duplicates<I>(&self, messages: I) -> Deduplicated<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Result<Message>>,
    {
        Deduplicated::new(messages.into_iter(), &self.read_messages)
    }

    pub fn quit(&self) -> Result<()> {
        self.stop();
        info!("closing browser");
        self.browser.quit()?;
        Ok(())
    }

    pub(crate) fn wait_for(&self, selector: &str, condition: WaitCondition) -> Result<B::Node> {
        Ok(self
            .browser
            .wait_until(selector, condition, self.timing.locate_timeout())?)
    }
}

/// md5 of the `|`-joined, sorted script sources; changes whenever the client
/// ships a new bundle.
fn compute_web_client_version<B: Browser>(browser: &B) -> Result<String> {
    let mut sources = Vec::new();
    for script in browser.find_all(selectors::SCRIPT)? {
        sources.push(
            script
                .attribute(selectors::SOURCE_ATTRIBUTE)?
                .unwrap_or_default(),
        );
    }
    sources.sort();
    let joined = sources
        .iter()
        .fold(String::new(), |acc, source| acc + "|" + source);
    Ok(format!("{:x}", md5::compute(joined.as_bytes())))
}
