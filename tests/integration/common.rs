//! Shared fixtures for the integration tests

use async_trait::async_trait;
use hivecrawl::config::Config;
use hivecrawl::extractor::{RenderOptions, RenderSession, RenderedPage, Renderer};
use hivecrawl::FetchError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Default)]
struct StubState {
    pages: Mutex<HashMap<String, String>>,
    sessions: AtomicUsize,
    renders: AtomicUsize,
    closes: AtomicUsize,
    shut_down: AtomicBool,
}

/// Renderer double serving canned "rendered" DOMs by URL
///
/// Unknown URLs fail like a navigation error. Every call is counted.
#[derive(Clone, Default)]
pub struct StubRenderer {
    state: Arc<StubState>,
}

impl StubRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, html: &str) {
        self.state
            .pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    pub fn sessions(&self) -> usize {
        self.state.sessions.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.state.renders.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn was_shut_down(&self) -> bool {
        self.state.shut_down.load(Ordering::SeqCst)
    }
}

struct StubSession {
    state: Arc<StubState>,
    open: bool,
}

#[async_trait]
impl RenderSession for StubSession {
    async fn render(
        &mut self,
        url: &Url,
        options: &RenderOptions,
    ) -> Result<RenderedPage, FetchError> {
        if !self.open {
            return Err(FetchError::SessionClosed);
        }
        self.state.renders.fetch_add(1, Ordering::SeqCst);

        let html = self.state.pages.lock().unwrap().get(url.as_str()).cloned();
        match html {
            Some(html) => Ok(RenderedPage::from_source(
                url.clone(),
                html,
                None,
                options.screenshot.then(|| b"\x89PNG\r\n".to_vec()),
            )),
            None => Err(FetchError::Render(format!("net::ERR_NAME_NOT_RESOLVED at {}", url))),
        }
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        if self.open {
            self.open = false;
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, FetchError> {
        if self.was_shut_down() {
            return Err(FetchError::SessionClosed);
        }
        self.state.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            state: self.state.clone(),
            open: true,
        }))
    }

    async fn shutdown(&self) -> Result<(), FetchError> {
        self.state.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Configuration for tests against a local mock server
///
/// Private hosts are allowed (the mock server is on 127.0.0.1), the limiter
/// never spaces requests and crawls never pause between pages.
pub fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.security.allow_private_hosts = true;
    config.limiter.min_interval_ms = 0;
    config.extractor.timeout_ms = 2_000;
    config.crawl.page_delay_ms = 0;
    config.search.endpoint = server_uri.to_string();
    config.search.api_endpoint = server_uri.to_string();
    config.search.attempts = 2;
    config.search.retry_delay_ms = 0;
    config
}

/// A server-rendered article page that passes content validation
pub fn article(title: &str, links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{}">{}</a></li>"#, href, href))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body>
  <nav><ul>{anchors}</ul></nav>
  <main>
    <h1>{title}</h1>
    <p>This page about {title} is rendered on the server, so its full text is
    present in the HTML response and no script has to run before a reader can
    see it. That makes the static fetch sufficient for extraction.</p>
    <img src="/images/{title}.png" alt="{title} figure">
  </main>
</body>
</html>"#,
        title = title,
        anchors = anchors
    )
}

/// A client-rendered shell whose static HTML carries no content
pub fn spa_shell() -> String {
    r#"<!DOCTYPE html><html><head><title>App</title></head><body><div id="root"></div><script src="/bundle.js"></script></body></html>"#
        .to_string()
}
