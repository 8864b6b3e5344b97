//! Rendered fetcher
//!
//! Pages are loaded in a real browser driven over WebDriver. The shared heavy
//! resource is the WebDriver endpoint; each [`RenderSession`] is one WebDriver
//! session with its own browser profile, so cookies and storage never cross
//! sessions.

use crate::config::RendererConfig;
use crate::extractor::parser::parse_document;
use crate::page::{ImageRef, LinkRef};
use crate::FetchError;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};
use url::Url;

/// Longest a session may take to close before it is abandoned
pub const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// What to wait for after navigation, before the DOM is read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WaitHint {
    /// Read the DOM as soon as the page load completes
    #[default]
    Load,
    /// Wait until an element matches this CSS selector
    Selector(String),
    /// Sleep a fixed number of milliseconds
    Millis(u64),
}

/// Options for a single render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub timeout: Duration,
    pub wait: WaitHint,
    pub screenshot: bool,
    pub full_page: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            wait: WaitHint::Load,
            screenshot: false,
            full_page: true,
        }
    }
}

/// The DOM of a page after scripts ran
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: Url,
    pub html: String,
    pub title: String,
    pub text: String,
    pub links: Vec<LinkRef>,
    pub images: Vec<ImageRef>,
    /// PNG bytes, when requested
    pub screenshot: Option<Vec<u8>>,
}

impl RenderedPage {
    /// Derives text, links and images from rendered page source
    ///
    /// A non-empty `title` reported by the browser wins over the one parsed
    /// from the source.
    pub fn from_source(
        final_url: Url,
        html: String,
        title: Option<String>,
        screenshot: Option<Vec<u8>>,
    ) -> Self {
        let parsed = parse_document(&html, &final_url);
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or(parsed.title);

        Self {
            final_url,
            html,
            title,
            text: parsed.text_content,
            links: parsed.links,
            images: parsed.images,
            screenshot,
        }
    }
}

/// One isolated browsing context
#[async_trait]
pub trait RenderSession: Send {
    /// Loads `url` and reads back the rendered DOM
    async fn render(
        &mut self,
        url: &Url,
        options: &RenderOptions,
    ) -> Result<RenderedPage, FetchError>;

    /// Ends the session; later renders fail with `SessionClosed`
    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Closes `session`, giving up after [`SESSION_CLOSE_TIMEOUT`]
pub async fn close_session(session: &mut dyn RenderSession) -> Result<(), FetchError> {
    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            timeout_ms: SESSION_CLOSE_TIMEOUT.as_millis() as u64,
        }),
    }
}

/// Shared rendering resource handing out isolated sessions
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, FetchError>;

    /// Closes every live session and refuses new ones
    async fn shutdown(&self) -> Result<(), FetchError>;
}

type LiveSessions = Arc<Mutex<HashMap<u64, Client>>>;

/// [`Renderer`] backed by a WebDriver endpoint through fantoccini
pub struct WebDriverRenderer {
    config: RendererConfig,
    user_agent: String,
    permits: Arc<Semaphore>,
    live: LiveSessions,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl WebDriverRenderer {
    pub fn new(config: RendererConfig, user_agent: impl Into<String>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_sessions.max(1)));
        Self {
            config,
            user_agent: user_agent.into(),
            permits,
            live: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of sessions currently open
    pub fn open_sessions(&self) -> usize {
        lock(&self.live).len()
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, FetchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FetchError::SessionClosed);
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::SessionClosed)?;

        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(&self.config, &self.user_agent));
        let client = builder
            .connect(&self.config.webdriver_url)
            .await
            .map_err(|e| FetchError::Render(format!("failed to start browser session: {}", e)))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.live).insert(id, client.clone());
        debug!(session = id, "Opened browser session");

        Ok(Box::new(WebDriverSession {
            id,
            client: Some(client),
            live: self.live.clone(),
            selector_timeout: Duration::from_millis(self.config.selector_timeout_ms),
            window_width: self.config.window_width,
            _permit: permit,
        }))
    }

    async fn shutdown(&self) -> Result<(), FetchError> {
        self.closed.store(true, Ordering::SeqCst);
        self.permits.close();

        let clients: Vec<(u64, Client)> = lock(&self.live).drain().collect();
        for (id, client) in clients {
            if let Err(e) = client.close().await {
                warn!(session = id, "Failed to close browser session: {}", e);
            }
        }

        Ok(())
    }
}

struct WebDriverSession {
    id: u64,
    client: Option<Client>,
    live: LiveSessions,
    selector_timeout: Duration,
    window_width: u32,
    _permit: OwnedSemaphorePermit,
}

impl WebDriverSession {
    async fn capture(&self, client: &Client, full_page: bool) -> Result<Vec<u8>, FetchError> {
        if full_page {
            let height = client
                .execute(
                    "return Math.max(document.body.scrollHeight, document.documentElement.scrollHeight);",
                    vec![],
                )
                .await
                .ok()
                .and_then(|v| v.as_u64());

            if let Some(height) = height {
                let height = u32::try_from(height).unwrap_or(u32::MAX);
                if let Err(e) = client.set_window_size(self.window_width, height).await {
                    debug!(session = self.id, "Could not resize for full-page capture: {}", e);
                }
            }
        }

        client.screenshot().await.map_err(render_error)
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn render(
        &mut self,
        url: &Url,
        options: &RenderOptions,
    ) -> Result<RenderedPage, FetchError> {
        let client = self.client.as_ref().ok_or(FetchError::SessionClosed)?;

        client.goto(url.as_str()).await.map_err(render_error)?;

        match &options.wait {
            WaitHint::Load => {}
            WaitHint::Selector(selector) => {
                client
                    .wait()
                    .at_most(self.selector_timeout)
                    .for_element(Locator::Css(selector))
                    .await
                    .map_err(|e| {
                        FetchError::Render(format!(
                            "selector '{}' never appeared: {}",
                            selector, e
                        ))
                    })?;
            }
            WaitHint::Millis(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
        }

        let html = client.source().await.map_err(render_error)?;
        let title = client.title().await.ok();
        let final_url = client.current_url().await.unwrap_or_else(|_| url.clone());

        let screenshot = if options.screenshot {
            Some(self.capture(client, options.full_page).await?)
        } else {
            None
        };

        Ok(RenderedPage::from_source(final_url, html, title, screenshot))
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        lock(&self.live).remove(&self.id);
        debug!(session = self.id, "Closing browser session");
        client.close().await.map_err(render_error)
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        lock(&self.live).remove(&self.id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let id = self.id;
            handle.spawn(async move {
                if let Err(e) = client.close().await {
                    warn!(session = id, "Failed to close abandoned browser session: {}", e);
                }
            });
        }
    }
}

/// WebDriver capabilities for a Chrome session
pub fn chrome_capabilities(config: &RendererConfig, user_agent: &str) -> Map<String, Value> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        format!("--window-size={},{}", config.window_width, config.window_height),
        format!("--user-agent={}", user_agent),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}

fn render_error(error: fantoccini::error::CmdError) -> FetchError {
    FetchError::Render(error.to_string())
}

fn lock(live: &LiveSessions) -> std::sync::MutexGuard<'_, HashMap<u64, Client>> {
    live.lock().unwrap_or_else(|e| e.into_inner())
}
