//! Daily-popup and overlay cleanup.

use tracing::debug;

use surface_adapter::PageSurface;

const DISMISS_SELECTORS: [&str; 2] = ["#dc", "button#dc"];

/// Dismiss the daily popup and strip blocking overlays. Idempotent and
/// side-effect only: calling on a clean page does nothing, and no failure
/// here is ever surfaced.
pub async fn dismiss_popup(surface: &dyn PageSurface) {
    for selector in DISMISS_SELECTORS {
        if surface.count(selector).await.unwrap_or(0) > 0 {
            match surface.click(selector, 0).await {
                Ok(()) => {
                    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                    return;
                }
                Err(err) => debug!(selector, %err, "popup close click failed"),
            }
        }
    }
    // Script removal covers popups whose close button is unclickable.
    let script = "(() => { \
        const el = document.getElementById('dp'); if (el) el.remove(); \
        const btn = document.getElementById('dc'); if (btn) btn.remove(); \
        document.querySelectorAll('.k-overlay, .modal-backdrop').forEach(o => o.remove()); \
        })()";
    if let Err(err) = surface.evaluate(script).await {
        debug!(%err, "overlay removal script failed");
    }
}
