use super::{Bounds, Browser, Node, WaitCondition, WaitTimeout};
use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ClickHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct NodeState {
    text: String,
    attributes: HashMap<String, String>,
    inner_html: Option<String>,
    children: HashMap<String, Vec<MockNode>>,
    bounds: Bounds,
    click_error: Option<String>,
    keys_error: Option<String>,
    clicks: AtomicUsize,
    scrolls: AtomicUsize,
    enters: AtomicUsize,
    typed: Mutex<Vec<String>>,
    on_click: Mutex<Vec<ClickHook>>,
}

#[derive(Clone, Default)]
pub struct MockNode {
    inner: Arc<NodeState>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut NodeState {
        Arc::get_mut(&mut self.inner).expect("configure mock nodes before sharing them")
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.state_mut().text = text.to_string();
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.state_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_class(self, classes: &str) -> Self {
        self.with_attr("class", classes)
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.state_mut().inner_html = Some(html.to_string());
        self
    }

    pub fn with_child(mut self, selector: &str, child: MockNode) -> Self {
        self.state_mut()
            .children
            .entry(selector.to_string())
            .or_default()
            .push(child);
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.state_mut().bounds = bounds;
        self
    }

    pub fn failing_click(mut self, message: &str) -> Self {
        self.state_mut().click_error = Some(message.to_string());
        self
    }

    pub fn failing_keys(mut self, message: &str) -> Self {
        self.state_mut().keys_error = Some(message.to_string());
        self
    }

    pub fn on_click(&self, hook: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut hooks) = self.inner.on_click.lock() {
            hooks.push(Box::new(hook));
        }
    }

    pub fn clicks(&self) -> usize {
        self.inner.clicks.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.inner.scrolls.load(Ordering::SeqCst)
    }

    pub fn enters(&self) -> usize {
        self.inner.enters.load(Ordering::SeqCst)
    }

    pub fn typed(&self) -> Vec<String> {
        self.inner
            .typed
            .lock()
            .map(|typed| typed.clone())
            .unwrap_or_default()
    }

    pub fn same_as(&self, other: &MockNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Node for MockNode {
    fn text(&self) -> Result<String> {
        Ok(self.inner.text.clone())
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.inner.attributes.get(name).cloned())
    }

    fn inner_html(&self) -> Result<String> {
        Ok(self
            .inner
            .inner_html
            .clone()
            .unwrap_or_else(|| self.inner.text.clone()))
    }

    fn find(&self, selector: &str) -> Result<Option<Self>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    fn find_all(&self, selector: &str) -> Result<Vec<Self>> {
        Ok(self
            .inner
            .children
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    fn click(&self) -> Result<()> {
        if let Some(message) = &self.inner.click_error {
            return Err(anyhow!(message.clone()));
        }
        self.inner.clicks.fetch_add(1, Ordering::SeqCst);
        let hooks = self
            .inner
            .on_click
            .lock()
            .map_err(|_| anyhow!("click hooks poisoned"))?;
        for hook in hooks.iter() {
            hook();
        }
        Ok(())
    }

    fn scroll_into_view(&self) -> Result<()> {
        self.inner.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn send_keys(&self, text: &str) -> Result<()> {
        if let Some(message) = &self.inner.keys_error {
            return Err(anyhow!(message.clone()));
        }
        self.inner
            .typed
            .lock()
            .map_err(|_| anyhow!("typed log poisoned"))?
            .push(text.to_string());
        Ok(())
    }

    fn press_enter(&self) -> Result<()> {
        self.inner.enters.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn bounds(&self) -> Result<Bounds> {
        Ok(self.inner.bounds)
    }
}

struct Delayed {
    selector: String,
    node: MockNode,
    remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub open: usize,
    pub active: usize,
}

struct BrowserState {
    dom: Mutex<HashMap<String, Vec<MockNode>>>,
    delayed: Mutex<Vec<Delayed>>,
    queries: Mutex<HashMap<String, usize>>,
    navigations: Mutex<Vec<String>>,
    views: Mutex<ViewState>,
    closed_views: Mutex<Vec<usize>>,
    unreachable_view: Mutex<Option<usize>>,
    screenshot: Mutex<Vec<u8>>,
    pixel_ratio: Mutex<f64>,
    quit: AtomicBool,
}

impl Default for BrowserState {
    fn default() -> Self {
        Self {
            dom: Mutex::new(HashMap::new()),
            delayed: Mutex::new(Vec::new()),
            queries: Mutex::new(HashMap::new()),
            navigations: Mutex::new(Vec::new()),
            views: Mutex::new(ViewState { open: 1, active: 0 }),
            closed_views: Mutex::new(Vec::new()),
            unreachable_view: Mutex::new(None),
            screenshot: Mutex::new(solid_png(4, 4)),
            pixel_ratio: Mutex::new(1.0),
            quit: AtomicBool::new(false),
        }
    }
}

/// In-memory page keyed by selector. Clones share the same page.
#[derive(Clone, Default)]
pub struct MockBrowser {
    inner: Arc<BrowserState>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, selector: &str, node: MockNode) {
        if let Ok(mut dom) = self.inner.dom.lock() {
            dom.entry(selector.to_string()).or_default().push(node);
        }
    }

    pub fn remove(&self, selector: &str, node: &MockNode) {
        if let Ok(mut dom) = self.inner.dom.lock() {
            if let Some(nodes) = dom.get_mut(selector) {
                nodes.retain(|candidate| !candidate.same_as(node));
            }
        }
    }

    pub fn clear(&self, selector: &str) {
        if let Ok(mut dom) = self.inner.dom.lock() {
            dom.remove(selector);
        }
    }

    /// The node becomes visible once `selector` has been queried `queries`
    /// more times.
    pub fn appear_after(&self, selector: &str, node: MockNode, queries: usize) {
        if let Ok(mut delayed) = self.inner.delayed.lock() {
            delayed.push(Delayed {
                selector: selector.to_string(),
                node,
                remaining: queries,
            });
        }
    }

    pub fn query_count(&self, selector: &str) -> usize {
        self.inner
            .queries
            .lock()
            .map(|queries| queries.get(selector).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.inner
            .navigations
            .lock()
            .map(|navs| navs.clone())
            .unwrap_or_default()
    }

    pub fn views(&self) -> ViewState {
        self.inner
            .views
            .lock()
            .map(|views| *views)
            .unwrap_or(ViewState { open: 0, active: 0 })
    }

    /// Indexes passed to `close_view`, in call order.
    pub fn closed_views(&self) -> Vec<usize> {
        self.inner
            .closed_views
            .lock()
            .map(|closed| closed.clone())
            .unwrap_or_default()
    }

    /// Makes `switch_view(index)` fail while leaving the active view alone.
    pub fn refuse_switch_to(&self, index: usize) {
        if let Ok(mut unreachable) = self.inner.unreachable_view.lock() {
            *unreachable = Some(index);
        }
    }

    pub fn set_device_pixel_ratio(&self, ratio: f64) {
        if let Ok(mut pixel_ratio) = self.inner.pixel_ratio.lock() {
            *pixel_ratio = ratio;
        }
    }

    pub fn set_screenshot(&self, png: Vec<u8>) {
        if let Ok(mut shot) = self.inner.screenshot.lock() {
            *shot = png;
        }
    }

    pub fn was_quit(&self) -> bool {
        self.inner.quit.load(Ordering::SeqCst)
    }

    fn release_delayed(&self, selector: &str) -> Result<()> {
        let mut delayed = self
            .inner
            .delayed
            .lock()
            .map_err(|_| anyhow!("delayed nodes poisoned"))?;
        let mut ready = Vec::new();
        delayed.retain_mut(|item| {
            if item.selector != selector {
                return true;
            }
            if item.remaining == 0 {
                ready.push(item.node.clone());
                return false;
            }
            item.remaining -= 1;
            true
        });
        drop(delayed);
        for node in ready {
            self.insert(selector, node);
        }
        Ok(())
    }
}

impl Browser for MockBrowser {
    type Node = MockNode;

    fn navigate(&self, url: &str) -> Result<()> {
        self.inner
            .navigations
            .lock()
            .map_err(|_| anyhow!("navigation log poisoned"))?
            .push(url.to_string());
        Ok(())
    }

    fn find(&self, selector: &str) -> Result<Option<MockNode>> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    fn find_all(&self, selector: &str) -> Result<Vec<MockNode>> {
        *self
            .inner
            .queries
            .lock()
            .map_err(|_| anyhow!("query log poisoned"))?
            .entry(selector.to_string())
            .or_default() += 1;
        self.release_delayed(selector)?;
        let dom = self
            .inner
            .dom
            .lock()
            .map_err(|_| anyhow!("dom poisoned"))?;
        Ok(dom.get(selector).cloned().unwrap_or_default())
    }

    fn wait_until(
        &self,
        selector: &str,
        _condition: WaitCondition,
        timeout: Duration,
    ) -> Result<MockNode> {
        self.find(selector)?.ok_or_else(|| {
            anyhow::Error::new(WaitTimeout {
                selector: selector.to_string(),
                timeout,
            })
        })
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self
            .inner
            .screenshot
            .lock()
            .map_err(|_| anyhow!("screenshot poisoned"))?
            .clone())
    }

    fn device_pixel_ratio(&self) -> Result<f64> {
        Ok(*self
            .inner
            .pixel_ratio
            .lock()
            .map_err(|_| anyhow!("pixel ratio poisoned"))?)
    }

    fn open_new_view(&self) -> Result<usize> {
        let mut views = self
            .inner
            .views
            .lock()
            .map_err(|_| anyhow!("views poisoned"))?;
        views.open += 1;
        Ok(views.open - 1)
    }

    fn close_view(&self, index: usize) -> Result<()> {
        let mut views = self
            .inner
            .views
            .lock()
            .map_err(|_| anyhow!("views poisoned"))?;
        if index >= views.open {
            return Err(anyhow!("no such view: {index}"));
        }
        views.open -= 1;
        if views.active == index {
            views.active = 0;
        } else if views.active > index {
            views.active -= 1;
        }
        self.inner
            .closed_views
            .lock()
            .map_err(|_| anyhow!("closed views poisoned"))?
            .push(index);
        Ok(())
    }

    fn switch_view(&self, index: usize) -> Result<()> {
        let unreachable = *self
            .inner
            .unreachable_view
            .lock()
            .map_err(|_| anyhow!("unreachable view poisoned"))?;
        if unreachable == Some(index) {
            return Err(anyhow!("view {index} did not respond"));
        }
        let mut views = self
            .inner
            .views
            .lock()
            .map_err(|_| anyhow!("views poisoned"))?;
        if index >= views.open {
            return Err(anyhow!("no such view: {index}"));
        }
        views.active = index;
        Ok(())
    }

    fn quit(&self) -> Result<()> {
        self.inner.quit.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([20, 140, 90, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode test png");
    buf.into_inner()
}
