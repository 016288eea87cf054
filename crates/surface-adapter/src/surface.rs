//! The capability set the engine drives a live page through.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::error::SurfaceError;

/// Readiness the caller wants a navigation to reach before returning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitPolicy {
    /// DOM parsed; subresources may still be loading.
    DomContentLoaded,
    /// DOM loaded and the network has gone quiet.
    NetworkIdle,
}

/// Element condition for selector waits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitState {
    /// Present in the DOM, rendered or not.
    Attached,
    /// Present and visibly rendered.
    Visible,
}

/// Capability interface over one browser tab/document. The caller owns the
/// underlying page for its whole lifetime; implementations only read and
/// mutate it.
///
/// Poll-based waits are provided on top of the primitive operations so that
/// scripted test surfaces get them for free.
#[async_trait]
pub trait PageSurface: Send + Sync {
    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), SurfaceError>;

    async fn current_url(&self) -> Result<String, SurfaceError>;

    /// Raw outer HTML of the main document.
    async fn content(&self) -> Result<String, SurfaceError>;

    /// Evaluate a script expression in page context. Expressions returning
    /// `undefined` yield `Value::Null`.
    async fn evaluate(&self, expression: &str) -> Result<Value, SurfaceError>;

    /// Number of elements matching a CSS selector. Zero when the selector
    /// matches nothing; errors are reserved for transport failure.
    async fn count(&self, selector: &str) -> Result<usize, SurfaceError>;

    async fn inner_text(&self, selector: &str, index: usize) -> Result<String, SurfaceError>;

    async fn attribute(
        &self,
        selector: &str,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, SurfaceError>;

    async fn is_visible(&self, selector: &str, index: usize) -> Result<bool, SurfaceError>;

    async fn click(&self, selector: &str, index: usize) -> Result<(), SurfaceError>;

    async fn fill(&self, selector: &str, index: usize, text: &str) -> Result<(), SurfaceError>;

    /// Raw HTML of the main document plus every same-origin nested frame.
    async fn frame_contents(&self) -> Result<Vec<String>, SurfaceError>;

    /// Full-page screenshot; diagnostic only.
    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError>;

    /// Poll until `expression` evaluates truthy or the bound expires.
    async fn wait_for_function(
        &self,
        expression: &str,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.evaluate(expression).await {
                Ok(value) if is_truthy(&value) => return Ok(()),
                Ok(_) => {}
                // Evaluation can fail transiently mid-navigation; keep
                // polling until the deadline decides.
                Err(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(SurfaceError::WaitTimeout(format!(
                    "predicate never became truthy: {}",
                    truncate_expr(expression)
                )));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    /// Poll until an element matching `selector` reaches `state` or the
    /// bound expires.
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            let satisfied = match state {
                WaitState::Attached => self.count(selector).await.map(|n| n > 0),
                WaitState::Visible => self.is_visible(selector, 0).await,
            };
            if satisfied.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SurfaceError::WaitTimeout(format!(
                    "selector {selector} never reached {state:?}"
                )));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }
}

/// JSON string literal form of `text`, safe to splice into a page script.
pub fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truncate_expr(expression: &str) -> String {
    const LIMIT: usize = 120;
    if expression.len() <= LIMIT {
        expression.to_string()
    } else {
        let cut = expression
            .char_indices()
            .take_while(|(i, _)| *i < LIMIT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(LIMIT);
        format!("{}…", &expression[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Surface whose `evaluate` becomes truthy after N polls.
    struct CountdownSurface {
        remaining: AtomicUsize,
    }

    #[async_trait]
    impl PageSurface for CountdownSurface {
        async fn navigate(&self, _: &str, _: WaitPolicy) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok("about:blank".into())
        }
        async fn content(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn evaluate(&self, _: &str) -> Result<Value, SurfaceError> {
            let left = self.remaining.load(Ordering::SeqCst);
            if left == 0 {
                Ok(Value::Bool(true))
            } else {
                self.remaining.store(left - 1, Ordering::SeqCst);
                Ok(Value::Bool(false))
            }
        }
        async fn count(&self, _: &str) -> Result<usize, SurfaceError> {
            Ok(0)
        }
        async fn inner_text(&self, _: &str, _: usize) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn attribute(
            &self,
            _: &str,
            _: usize,
            _: &str,
        ) -> Result<Option<String>, SurfaceError> {
            Ok(None)
        }
        async fn is_visible(&self, _: &str, _: usize) -> Result<bool, SurfaceError> {
            Ok(false)
        }
        async fn click(&self, _: &str, _: usize) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn fill(&self, _: &str, _: usize, _: &str) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn frame_contents(&self) -> Result<Vec<String>, SurfaceError> {
            Ok(Vec::new())
        }
        async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn wait_for_function_polls_until_truthy() {
        let surface = CountdownSurface {
            remaining: AtomicUsize::new(2),
        };
        surface
            .wait_for_function("window.ready", Duration::from_secs(2))
            .await
            .expect("predicate eventually truthy");
    }

    #[tokio::test]
    async fn wait_for_selector_times_out() {
        let surface = CountdownSurface {
            remaining: AtomicUsize::new(usize::MAX),
        };
        let err = surface
            .wait_for_selector("#missing", WaitState::Attached, Duration::from_millis(250))
            .await
            .expect_err("must time out");
        assert!(matches!(err, SurfaceError::WaitTimeout(_)));
    }

    #[test]
    fn truthiness_follows_js_semantics() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(is_truthy(&serde_json::json!({"a": 1})));
        assert!(is_truthy(&serde_json::json!(1.5)));
    }
}
