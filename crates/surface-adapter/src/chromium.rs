//! chromiumoxide-backed [`PageSurface`] and session lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::SurfaceConfig;
use crate::error::SurfaceError;
use crate::exchange::{NetworkExchange, ResponseLog};
use crate::surface::{js_string, PageSurface, WaitPolicy};

/// One launched browser plus its event-handler loop. Owns the process; pages
/// handed out through [`BrowserSession::new_surface`] stay valid until
/// [`BrowserSession::close`].
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    config: SurfaceConfig,
}

impl BrowserSession {
    pub async fn launch(config: SurfaceConfig) -> Result<Self, SurfaceError> {
        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                ..Default::default()
            })
            .args(config.extra_args.iter().map(String::as_str).collect::<Vec<_>>());
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(SurfaceError::Session)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| SurfaceError::Session(err.to_string()))?;
        info!(headless = config.headless, "browser launched");

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(%err, "browser handler event error");
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            config,
        })
    }

    /// Open a fresh tab with UA/locale overrides and the init script
    /// installed, and attach the XHR/fetch capture task feeding `log`.
    pub async fn new_surface(&self, log: ResponseLog) -> Result<ChromiumSurface, SurfaceError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|err| SurfaceError::Session(err.to_string()))?;

        let overrides = SetUserAgentOverrideParams::builder()
            .user_agent(self.config.user_agent.clone())
            .accept_language(self.config.accept_language.clone())
            .build()
            .map_err(SurfaceError::Session)?;
        page.set_user_agent(overrides)
            .await
            .map_err(|err| SurfaceError::Session(err.to_string()))?;

        if let Some(script) = &self.config.init_script {
            page.evaluate_on_new_document(script.as_str())
                .await
                .map_err(|err| SurfaceError::Session(err.to_string()))?;
        }

        let capture_task = spawn_capture(page.clone(), log.clone()).await?;

        Ok(ChromiumSurface {
            page,
            slow_mo: Duration::from_millis(self.config.slow_mo_ms),
            default_timeout: Duration::from_millis(self.config.default_timeout_ms),
            log,
            capture_task: Some(capture_task),
        })
    }

    pub async fn close(mut self) -> Result<(), SurfaceError> {
        self.browser
            .close()
            .await
            .map_err(|err| SurfaceError::Session(err.to_string()))?;
        self.handler_task.abort();
        Ok(())
    }
}

async fn spawn_capture(page: Page, log: ResponseLog) -> Result<JoinHandle<()>, SurfaceError> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|err| SurfaceError::Session(err.to_string()))?;
    let body_page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            if !matches!(event.r#type, ResourceType::Xhr | ResourceType::Fetch) {
                continue;
            }
            let body = fetch_body(&body_page, &event).await;
            log.push(NetworkExchange {
                url: event.response.url.clone(),
                status: event.response.status,
                resource_kind: format!("{:?}", event.r#type).to_lowercase(),
                content_type: event.response.mime_type.clone(),
                body,
                captured_at: Utc::now(),
            });
        }
    }))
}

/// Body fetch is best-effort: the buffer may already be evicted, or the
/// response may still be streaming. A miss records the exchange without a
/// body.
async fn fetch_body(page: &Page, event: &Arc<EventResponseReceived>) -> Option<String> {
    let params = GetResponseBodyParams::new(event.request_id.clone());
    match page.execute(params).await {
        Ok(response) => {
            let returns = response.result;
            if returns.base64_encoded {
                base64::engine::general_purpose::STANDARD
                    .decode(returns.body.as_bytes())
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            } else {
                Some(returns.body)
            }
        }
        Err(err) => {
            debug!(url = %event.response.url, %err, "response body unavailable");
            None
        }
    }
}

/// Production page surface bound to one chromiumoxide tab.
pub struct ChromiumSurface {
    page: Page,
    slow_mo: Duration,
    default_timeout: Duration,
    log: ResponseLog,
    capture_task: Option<JoinHandle<()>>,
}

impl ChromiumSurface {
    pub fn exchanges(&self) -> Vec<NetworkExchange> {
        self.log.snapshot()
    }

    pub fn response_log(&self) -> &ResponseLog {
        &self.log
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            sleep(self.slow_mo).await;
        }
    }

    fn io(err: impl std::fmt::Display) -> SurfaceError {
        SurfaceError::BrowserIo(err.to_string())
    }
}

impl Drop for ChromiumSurface {
    fn drop(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl PageSurface for ChromiumSurface {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), SurfaceError> {
        self.pace().await;
        timeout(self.default_timeout, async {
            self.page.goto(url).await.map_err(Self::io)?;
            self.page.wait_for_navigation().await.map_err(Self::io)?;
            Ok::<(), SurfaceError>(())
        })
        .await
        .map_err(|_| SurfaceError::NavTimeout(url.to_string()))??;

        if wait == WaitPolicy::NetworkIdle {
            // chromiumoxide has no networkidle gate; approximate with a
            // readyState check plus a short settle window.
            self.wait_for_function("document.readyState === 'complete'", self.default_timeout)
                .await?;
            sleep(Duration::from_millis(500)).await;
        }
        debug!(url, "navigation complete");
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SurfaceError> {
        self.page
            .url()
            .await
            .map_err(Self::io)?
            .ok_or_else(|| SurfaceError::BrowserIo("page has no url".to_string()))
    }

    async fn content(&self) -> Result<String, SurfaceError> {
        self.page.content().await.map_err(Self::io)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, SurfaceError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|err| SurfaceError::Evaluation(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn count(&self, selector: &str) -> Result<usize, SurfaceError> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            // "no node found" comes back as an error for some selectors;
            // a zero count is the honest answer either way.
            Err(err) => {
                debug!(selector, %err, "find_elements failed; reporting zero");
                Ok(0)
            }
        }
    }

    async fn inner_text(&self, selector: &str, index: usize) -> Result<String, SurfaceError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(Self::io)?;
        let element = elements
            .get(index)
            .ok_or_else(|| SurfaceError::ElementNotFound(format!("{selector}[{index}]")))?;
        let text = element.inner_text().await.map_err(Self::io)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, SurfaceError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(Self::io)?;
        let element = elements
            .get(index)
            .ok_or_else(|| SurfaceError::ElementNotFound(format!("{selector}[{index}]")))?;
        element.attribute(name).await.map_err(Self::io)
    }

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool, SurfaceError> {
        let expression = format!(
            "(() => {{ const els = document.querySelectorAll({sel}); \
             const el = els[{index}]; \
             return !!(el && el.offsetParent !== null); }})()",
            sel = js_string(selector),
        );
        Ok(self.evaluate(&expression).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<(), SurfaceError> {
        self.pace().await;
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(Self::io)?;
        let element = elements
            .get(index)
            .ok_or_else(|| SurfaceError::ElementNotFound(format!("{selector}[{index}]")))?;
        if let Err(err) = element.click().await {
            // Overlays intercept pointer clicks on this site; a synthetic
            // click delivers regardless of hit-testing.
            warn!(selector, %err, "pointer click failed; forcing script click");
            let expression = format!(
                "(() => {{ const els = document.querySelectorAll({sel}); \
                 const el = els[{index}]; if (!el) return false; el.click(); return true; }})()",
                sel = js_string(selector),
            );
            let forced = self.evaluate(&expression).await?;
            if forced.as_bool() != Some(true) {
                return Err(SurfaceError::ElementNotFound(format!(
                    "{selector}[{index}] vanished before forced click"
                )));
            }
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, index: usize, text: &str) -> Result<(), SurfaceError> {
        self.pace().await;
        // Value assignment plus input/change dispatch plays better with
        // widget-bound inputs than synthetic keystrokes.
        let expression = format!(
            "(() => {{ const els = document.querySelectorAll({sel}); \
             const el = els[{index}]; if (!el) return false; \
             el.focus(); el.value = {value}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            sel = js_string(selector),
            value = js_string(text),
        );
        let filled = self.evaluate(&expression).await?;
        if filled.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(SurfaceError::ElementNotFound(format!("{selector}[{index}]")))
        }
    }

    async fn frame_contents(&self) -> Result<Vec<String>, SurfaceError> {
        let mut contents = vec![self.content().await?];
        let expression = "(() => Array.from(document.querySelectorAll('iframe,frame'))\
            .map(f => { try { return f.contentDocument ? f.contentDocument.documentElement.outerHTML : null; } catch (e) { return null; } })\
            .filter(Boolean))()";
        match self.evaluate(expression).await {
            Ok(Value::Array(frames)) => {
                for frame in frames {
                    if let Value::String(html) = frame {
                        contents.push(html);
                    }
                }
            }
            Ok(_) => {}
            Err(err) => debug!(%err, "frame content scan failed; main document only"),
        }
        Ok(contents)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(Self::io)
    }
}
