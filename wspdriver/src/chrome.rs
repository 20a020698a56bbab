use crate::capability::{Bounds, Browser, Node, WaitCondition, WaitTimeout};
use crate::config::{BrowserConfig, Config};
use crate::session::Session;
use anyhow::{anyhow, Context, Result};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser as CdpBrowser, BrowserConfig as CdpConfig, Element, Page};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, warn};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches Chrome with `config.browser` and opens a session on it.
pub fn start(config: &Config) -> crate::error::Result<Session<ChromeBrowser>> {
    let browser = ChromeBrowser::launch(&config.browser)?;
    Session::open(browser, config)
}

/// Chrome over the DevTools protocol, driven from blocking code. The browser
/// owns its runtime; every call blocks on it.
pub struct ChromeBrowser {
    runtime: Runtime,
    browser: Mutex<CdpBrowser>,
    views: Mutex<Vec<Page>>,
    active: AtomicUsize,
}

impl ChromeBrowser {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.user_data_dir).with_context(|| {
            format!(
                "failed to create profile dir {}",
                config.user_data_dir.display()
            )
        })?;

        let mut builder = CdpConfig::builder()
            .user_data_dir(&config.user_data_dir)
            .window_size(config.window_width, config.window_height)
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let cdp_config = builder.build().map_err(|err| anyhow!(err))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("failed to start browser runtime")?;

        let (browser, mut handler) = runtime
            .block_on(CdpBrowser::launch(cdp_config))
            .context("failed to launch chrome")?;
        runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!("browser handler error: {err}");
                }
            }
            debug!("browser handler ended");
        });

        let page = runtime
            .block_on(browser.new_page("about:blank"))
            .context("failed to open first tab")?;
        info!(headless = config.headless, "chrome launched");

        Ok(Self {
            runtime,
            browser: Mutex::new(browser),
            views: Mutex::new(vec![page]),
            active: AtomicUsize::new(0),
        })
    }

    fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    fn views(&self) -> Result<MutexGuard<'_, Vec<Page>>> {
        self.views.lock().map_err(|_| anyhow!("view list poisoned"))
    }

    fn page(&self) -> Result<Page> {
        let index = self.active.load(Ordering::Acquire);
        self.views()?
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("no view at index {index}"))
    }

    fn wrap(&self, element: Element) -> ChromeNode {
        ChromeNode {
            element: Arc::new(element),
            handle: self.handle(),
        }
    }

    fn ready(&self, node: &ChromeNode, condition: WaitCondition) -> bool {
        match condition {
            WaitCondition::Located => true,
            WaitCondition::Clickable => is_clickable(node.bounds()),
        }
    }
}

/// A node without a box model (not rendered yet) is not clickable yet.
fn is_clickable(bounds: Result<Bounds>) -> bool {
    bounds.is_ok_and(|bounds| bounds.width > 0.0 && bounds.height > 0.0)
}

impl Browser for ChromeBrowser {
    type Node = ChromeNode;

    fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page()?;
        self.runtime
            .block_on(page.goto(url))
            .with_context(|| format!("failed to navigate to {url}"))?;
        Ok(())
    }

    fn find(&self, selector: &str) -> Result<Option<ChromeNode>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    fn find_all(&self, selector: &str) -> Result<Vec<ChromeNode>> {
        let page = self.page()?;
        let elements = self.runtime.block_on(page.find_elements(selector))?;
        Ok(elements.into_iter().map(|el| self.wrap(el)).collect())
    }

    fn wait_until(
        &self,
        selector: &str,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<ChromeNode> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(node) = self.find(selector)? {
                if self.ready(&node, condition) {
                    return Ok(node);
                }
            }
            if Instant::now() >= deadline {
                return Err(WaitTimeout {
                    selector: selector.to_string(),
                    timeout,
                }
                .into());
            }
            sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.page()?;
        let png = self
            .runtime
            .block_on(page.screenshot(ScreenshotParams::builder().build()))?;
        Ok(png)
    }

    fn device_pixel_ratio(&self) -> Result<f64> {
        let page = self.page()?;
        let ratio: f64 = self
            .runtime
            .block_on(page.evaluate("window.devicePixelRatio"))?
            .into_value()?;
        Ok(if ratio > 0.0 { ratio } else { 1.0 })
    }

    fn open_new_view(&self) -> Result<usize> {
        let page = {
            let browser = self
                .browser
                .lock()
                .map_err(|_| anyhow!("browser poisoned"))?;
            self.runtime.block_on(browser.new_page("about:blank"))?
        };
        let mut views = self.views()?;
        views.push(page);
        Ok(views.len() - 1)
    }

    fn close_view(&self, index: usize) -> Result<()> {
        let page = {
            let mut views = self.views()?;
            if index >= views.len() {
                return Err(anyhow!("no view at index {index}"));
            }
            views.remove(index)
        };
        let active = self.active.load(Ordering::Acquire);
        if active == index {
            self.active.store(0, Ordering::Release);
        } else if active > index {
            self.active.store(active - 1, Ordering::Release);
        }
        self.runtime.block_on(page.close())?;
        Ok(())
    }

    fn switch_view(&self, index: usize) -> Result<()> {
        let page = self
            .views()?
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("no view at index {index}"))?;
        self.runtime.block_on(page.bring_to_front())?;
        self.active.store(index, Ordering::Release);
        Ok(())
    }

    fn quit(&self) -> Result<()> {
        let mut browser = self
            .browser
            .lock()
            .map_err(|_| anyhow!("browser poisoned"))?;
        self.runtime.block_on(async {
            browser.close().await?;
            browser.wait().await?;
            Ok::<_, anyhow::Error>(())
        })?;
        info!("chrome closed");
        Ok(())
    }
}

#[derive(Clone)]
pub struct ChromeNode {
    element: Arc<Element>,
    handle: Handle,
}

impl ChromeNode {
    fn wrap(&self, element: Element) -> Self {
        Self {
            element: Arc::new(element),
            handle: self.handle.clone(),
        }
    }
}

impl Node for ChromeNode {
    fn text(&self) -> Result<String> {
        Ok(self
            .handle
            .block_on(self.element.inner_text())?
            .unwrap_or_default())
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.handle.block_on(self.element.attribute(name))?)
    }

    fn inner_html(&self) -> Result<String> {
        Ok(self
            .handle
            .block_on(self.element.inner_html())?
            .unwrap_or_default())
    }

    fn find(&self, selector: &str) -> Result<Option<Self>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    fn find_all(&self, selector: &str) -> Result<Vec<Self>> {
        let elements = self.handle.block_on(self.element.find_elements(selector))?;
        Ok(elements.into_iter().map(|el| self.wrap(el)).collect())
    }

    fn click(&self) -> Result<()> {
        self.handle.block_on(self.element.click())?;
        Ok(())
    }

    fn scroll_into_view(&self) -> Result<()> {
        self.handle.block_on(self.element.scroll_into_view())?;
        Ok(())
    }

    fn send_keys(&self, text: &str) -> Result<()> {
        self.handle.block_on(async {
            self.element.focus().await?;
            self.element.type_str(text).await
        })?;
        Ok(())
    }

    fn press_enter(&self) -> Result<()> {
        self.handle.block_on(self.element.press_key("Enter"))?;
        Ok(())
    }

    fn bounds(&self) -> Result<Bounds> {
        let bbox = self.handle.block_on(self.element.bounding_box())?;
        Ok(Bounds {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrendered_node_is_not_clickable_yet() {
        assert!(!is_clickable(Err(anyhow!("Could not compute box model."))));
    }

    #[test]
    fn empty_box_is_not_clickable() {
        let collapsed = Bounds {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 24.0,
        };
        assert!(!is_clickable(Ok(collapsed)));
    }

    #[test]
    fn rendered_box_is_clickable() {
        let button = Bounds {
            x: 10.0,
            y: 10.0,
            width: 32.0,
            height: 24.0,
        };
        assert!(is_clickable(Ok(button)));
    }
}
