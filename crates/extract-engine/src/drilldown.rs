//! Drill-down from the search-results list to the detail view.
//!
//! Search results can themselves be multi-level: a row may lead to an
//! intermediate disambiguation list before the true detail page. The walk is
//! therefore a bounded loop, not a single hop, with three link-following
//! strategies per round and stagnation detection on the URL.

use std::time::Duration;

use tracing::{debug, info, warn};

use surface_adapter::{urls, PageSurface, WaitPolicy};
use table_core::html as raw_html;

use crate::diagnostics::DiagnosticSink;
use crate::errors::EngineError;
use crate::popup::dismiss_popup;
use crate::view::{is_search_list_page, latin_link, wait_for_grid_ready};

/// Terminal state of the walk. `Stuck` means "no detail reached", which the
/// caller may still extract against; it is not an error by itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DrillOutcome {
    /// A non-list view was reached.
    DetailView,
    /// Maximum depth or URL stagnation; the surface is still on a list view.
    Stuck,
}

/// Maximum drill rounds before giving up.
const MAX_DEPTH: u32 = 4;
/// Consecutive rounds with an unchanged URL that count as stagnation.
const STAGNANT_LIMIT: u32 = 2;
/// Bound for the post-click settle wait; shorter than the shared default
/// because a dead click should fall through to direct navigation quickly.
const CLICK_SETTLE: Duration = Duration::from_secs(10);

pub async fn drill_down_to_detail(
    surface: &dyn PageSurface,
    sink: &dyn DiagnosticSink,
    timeout: Duration,
) -> Result<DrillOutcome, EngineError> {
    let mut last_url: Option<String> = None;
    let mut stagnant_rounds: u32 = 0;

    for depth in 0..MAX_DEPTH {
        dismiss_popup(surface).await;
        sink.dump(surface, &format!("drill_{depth}")).await;
        let url = surface.current_url().await.unwrap_or_default();
        sink.step(&format!("drill_{depth}_url: {url}"));
        debug!(depth, %url, "drill round");

        if !is_search_list_page(surface).await {
            info!(depth, "detail view reached");
            return Ok(DrillOutcome::DetailView);
        }

        wait_for_grid_ready(surface, timeout).await?;

        if try_click(surface, sink, depth).await && !is_search_list_page(surface).await {
            return Ok(DrillOutcome::DetailView);
        }
        if try_direct_goto(surface, sink, depth).await && !is_search_list_page(surface).await {
            return Ok(DrillOutcome::DetailView);
        }
        if try_html_href(surface, sink, depth).await && !is_search_list_page(surface).await {
            return Ok(DrillOutcome::DetailView);
        }

        let current = surface.current_url().await.unwrap_or_default();
        if last_url.as_deref() == Some(current.as_str()) {
            stagnant_rounds += 1;
        } else {
            stagnant_rounds = 0;
        }
        last_url = Some(current);
        if stagnant_rounds >= STAGNANT_LIMIT {
            warn!(depth, "url stagnant across rounds; drill-down stuck");
            break;
        }
    }

    warn!("drill-down exhausted without reaching a detail view");
    Ok(DrillOutcome::Stuck)
}

/// Strategy (a): click the live anchor and let the same-tab navigation
/// settle. Returns whether anything plausibly happened.
async fn try_click(surface: &dyn PageSurface, sink: &dyn DiagnosticSink, depth: u32) -> bool {
    let Some(link) = latin_link(surface).await else {
        return false;
    };
    if let Some(href) = &link.href {
        sink.step(&format!("latin_href: {href}"));
    }
    if let Err(err) = surface.click(&link.selector, 0).await {
        debug!(%err, "anchor click failed");
        return false;
    }
    if let Err(err) = surface
        .wait_for_function("document.readyState === 'complete'", CLICK_SETTLE)
        .await
    {
        debug!(%err, "post-click settle never completed");
    }
    sink.dump(surface, &format!("drill_click_{depth}")).await;
    true
}

/// Strategy (b): resolve the href against the base origin and navigate
/// directly, bypassing click delivery entirely.
async fn try_direct_goto(surface: &dyn PageSurface, sink: &dyn DiagnosticSink, depth: u32) -> bool {
    let Some(link) = latin_link(surface).await else {
        return false;
    };
    let Some(href) = link.href else {
        return false;
    };
    let Some(target) = urls::resolve_href(&href) else {
        return false;
    };
    sink.step(&format!("drill_link_{depth}: {target}"));
    match surface.navigate(&target, WaitPolicy::NetworkIdle).await {
        Ok(()) => {
            sink.dump(surface, &format!("drill_link_{depth}")).await;
            true
        }
        Err(err) => {
            debug!(%err, "direct navigation failed");
            false
        }
    }
}

/// Strategy (c): recover the href from raw page source, independent of the
/// live DOM. Covers overlay-intercepted locator queries.
async fn try_html_href(surface: &dyn PageSurface, sink: &dyn DiagnosticSink, depth: u32) -> bool {
    let html = match surface.content().await {
        Ok(html) => html,
        Err(err) => {
            debug!(%err, "page source unavailable for href recovery");
            return false;
        }
    };
    let Some(href) = raw_html::latin_name_href(&html) else {
        return false;
    };
    sink.step(&format!("latin_href_html: {href}"));
    let Some(target) = urls::resolve_href(&href) else {
        return false;
    };
    match surface.navigate(&target, WaitPolicy::NetworkIdle).await {
        Ok(()) => {
            sink.dump(surface, &format!("drill_html_{depth}")).await;
            true
        }
        Err(err) => {
            debug!(%err, "raw-html navigation failed");
            false
        }
    }
}
