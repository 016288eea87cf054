//! Activation of the Related Targets section on the detail page.
//!
//! The detail page hides its sections behind two nested tab strips. Each
//! level is selected through the widget API first, then by clicking the tab
//! header text, and finally, if the pane still reports hidden, by forcing
//! its display attributes. Only total failure after the forced override is
//! an error.

use std::time::Duration;

use tracing::{debug, warn};

use surface_adapter::{js_string, PageSurface, WaitState};

use crate::errors::EngineError;
use crate::popup::dismiss_popup;
use crate::view::DETAIL_GRID;

const SETTLE: Duration = Duration::from_millis(300);
const ATTEMPTS: u32 = 3;

struct TabLevel {
    strip: &'static str,
    pane: &'static str,
    index: usize,
    labels: [&'static str; 2],
}

const OUTER: TabLevel = TabLevel {
    strip: "#tabstrip",
    pane: "#tabstrip-2",
    index: 1,
    labels: ["Related Targets", "相关靶点"],
};

const INNER: TabLevel = TabLevel {
    strip: "#tabstrip2",
    pane: "#tabstrip2-2",
    index: 1,
    labels: ["Targets Info", "靶点信息"],
};

/// Bring the Related Targets grid into the visible pane. Returns once the
/// detail grid has at least one attached row, or fails with
/// [`EngineError::SectionNotVisible`].
pub async fn ensure_related_targets_section(
    surface: &dyn PageSurface,
    timeout: Duration,
) -> Result<(), EngineError> {
    select_level(surface, &OUTER).await;
    select_level(surface, &INNER).await;

    let row_sel = format!("#{DETAIL_GRID} .k-grid-content tbody tr");
    if let Err(err) = surface
        .wait_for_selector(&row_sel, WaitState::Attached, timeout)
        .await
    {
        debug!(%err, "detail grid rows not attached after selection");
    }

    if pane_visible(surface, OUTER.pane).await {
        return Ok(());
    }
    warn!("related targets pane still hidden after all fallbacks");
    Err(EngineError::SectionNotVisible)
}

/// Select one tab level, retrying, then force the pane open as a last
/// resort. Never fails; the caller checks visibility afterwards.
async fn select_level(surface: &dyn PageSurface, level: &TabLevel) {
    for attempt in 0..ATTEMPTS {
        dismiss_popup(surface).await;
        if !widget_select(surface, level).await {
            text_click(surface, level).await;
        }
        tokio::time::sleep(SETTLE).await;
        if pane_visible(surface, level.pane).await {
            return;
        }
        debug!(strip = level.strip, attempt, "pane not visible after select");
    }
    force_show_pane(surface, level).await;
}

/// Drive the tab strip through its widget API. True when the widget existed
/// and accepted the selection.
async fn widget_select(surface: &dyn PageSurface, level: &TabLevel) -> bool {
    let script = format!(
        "(() => {{ \
            const strip = window.$ && $('{strip}').data('kendoTabStrip'); \
            if (!strip) return false; \
            strip.select({index}); \
            return true; \
        }})()",
        strip = level.strip,
        index = level.index,
    );
    match surface.evaluate(&script).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(err) => {
            debug!(strip = level.strip, %err, "tab strip widget select failed");
            false
        }
    }
}

/// Click the tab whose visible text matches one of the level's labels.
async fn text_click(surface: &dyn PageSurface, level: &TabLevel) {
    let selector = format!("{} [role='tab']", level.strip);
    let count = surface.count(&selector).await.unwrap_or(0);
    for i in 0..count {
        let text = surface.inner_text(&selector, i).await.unwrap_or_default();
        if level.labels.iter().any(|label| text.contains(label)) {
            if let Err(err) = surface.click(&selector, i).await {
                debug!(%err, tab = %text.trim(), "tab header click failed");
            }
            return;
        }
    }
}

/// Last resort: mark the tab active and force the pane displayed, bypassing
/// the widget entirely.
async fn force_show_pane(surface: &dyn PageSurface, level: &TabLevel) {
    let script = format!(
        "(() => {{ \
            const pane = document.querySelector({pane}); \
            if (!pane) return false; \
            pane.style.display = 'block'; \
            pane.setAttribute('aria-hidden', 'false'); \
            pane.classList.add('k-state-active'); \
            const tabs = document.querySelectorAll({strip} + ' [role=\"tab\"]'); \
            if (tabs[{index}]) tabs[{index}].classList.add('k-state-active'); \
            return true; \
        }})()",
        pane = js_string(level.pane),
        strip = js_string(level.strip),
        index = level.index,
    );
    match surface.evaluate(&script).await {
        Ok(_) => debug!(pane = level.pane, "forced pane display"),
        Err(err) => warn!(pane = level.pane, %err, "forced pane display failed"),
    }
}

async fn pane_visible(surface: &dyn PageSurface, pane: &str) -> bool {
    surface.is_visible(pane, 0).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use surface_adapter::{SurfaceError, WaitPolicy};

    /// Panes become visible only after the forced override runs; the widget
    /// select reports missing and the tab headers do not exist.
    struct StubbornTabs {
        forced: AtomicBool,
        evaluates: AtomicU32,
    }

    #[async_trait]
    impl surface_adapter::PageSurface for StubbornTabs {
        async fn navigate(&self, _: &str, _: WaitPolicy) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn content(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn evaluate(&self, script: &str) -> Result<Value, SurfaceError> {
            self.evaluates.fetch_add(1, Ordering::SeqCst);
            if script.contains("kendoTabStrip") {
                return Ok(json!(false));
            }
            if script.contains("style.display") {
                self.forced.store(true, Ordering::SeqCst);
                return Ok(json!(true));
            }
            Ok(json!(null))
        }
        async fn count(&self, selector: &str) -> Result<usize, SurfaceError> {
            if selector.contains("tbody tr") && self.forced.load(Ordering::SeqCst) {
                return Ok(1);
            }
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
            Ok(self.forced.load(Ordering::SeqCst))
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
    async fn forced_override_rescues_hidden_pane() {
        let page = StubbornTabs {
            forced: AtomicBool::new(false),
            evaluates: AtomicU32::new(0),
        };
        ensure_related_targets_section(&page, Duration::from_secs(2))
            .await
            .expect("forced override makes the pane visible");
        assert!(page.forced.load(Ordering::SeqCst));
    }

    /// Nothing makes the pane visible; the activation fails loudly.
    struct DeadTabs;

    #[async_trait]
    impl surface_adapter::PageSurface for DeadTabs {
        async fn navigate(&self, _: &str, _: WaitPolicy) -> Result<(), SurfaceError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn content(&self) -> Result<String, SurfaceError> {
            Ok(String::new())
        }
        async fn evaluate(&self, _: &str) -> Result<Value, SurfaceError> {
            Ok(json!(false))
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
    async fn total_failure_is_section_not_visible() {
        let err = ensure_related_targets_section(&DeadTabs, Duration::from_millis(200))
            .await
            .expect_err("nothing made the pane visible");
        assert!(matches!(err, EngineError::SectionNotVisible));
    }
}
