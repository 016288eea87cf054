//! One export run, end to end: session, search, drill-down, extraction,
//! persistence, reference check.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use extract_engine::popup::dismiss_popup;
use extract_engine::view::search_has_no_results;
use extract_engine::{
    drill_down_to_detail, extract_related_targets, DiagnosticSink, DrillOutcome,
};
use surface_adapter::{
    urls, BrowserSession, ChromiumSurface, PageSurface, ResponseLog, SurfaceConfig, WaitPolicy,
    WaitState,
};
use table_core::schema::RELATED_COLUMNS;
use table_core::{compare_with_reference, ExtractedTable};

use crate::config::RunConfig;
use crate::debug::FileSink;
use crate::export;

/// Default entry points, tried in order. A `step_urls.txt` in the working
/// directory overrides them.
const ENTRY_URLS: [&str; 2] = [
    "https://tcmsp-e.com/tcmsp.php",
    "https://tcmsp-e.com/load_intro.php?id=43",
];

const STEP_URLS_FILE: &str = "step_urls.txt";

/// Search box candidates, most specific first. First visible match wins.
const SEARCH_INPUTS: [&str; 3] = ["#inputVarTcm", "input[name='q']", "input[type='text']"];
/// Submit candidates tried before falling back to text-matched buttons.
const SEARCH_TRIGGERS: [&str; 2] = ["#searchBtTcm", "input[type='submit']"];

/// Pre-seed the daily-popup cookie so fresh sessions never see the dialog.
const POPUP_PRESEED: &str = "try { \
    localStorage.setItem('tcmsp_daily_popup_date', new Date().toISOString().slice(0, 10)); \
    } catch (e) {}";

/// Run the whole export once. The debug sink collects artifacts throughout;
/// the final error chain, if any, lands in `error.txt`.
pub async fn run_export(config: &RunConfig) -> Result<()> {
    let sink = FileSink::new(&config.debug_dir, &config.term);
    info!(term = %config.term, debug_dir = %sink.dir().display(), "export starting");
    match run_session(config, &sink).await {
        Ok(()) => Ok(()),
        Err(err) => {
            sink.write_error(&err);
            Err(err)
        }
    }
}

async fn run_session(config: &RunConfig, sink: &FileSink) -> Result<()> {
    let surface_config = SurfaceConfig {
        headless: config.headless,
        slow_mo_ms: config.slow_mo.as_millis() as u64,
        default_timeout_ms: config.timeout.as_millis() as u64,
        init_script: Some(POPUP_PRESEED.to_string()),
        ..SurfaceConfig::default()
    };
    let body_ceiling = surface_config.body_ceiling_bytes;

    let session = BrowserSession::launch(surface_config)
        .await
        .context("launching browser")?;
    let result = drive(config, sink, &session, body_ceiling).await;
    if let Err(err) = session.close().await {
        warn!(%err, "browser close failed");
    }
    result
}

async fn drive(
    config: &RunConfig,
    sink: &FileSink,
    session: &BrowserSession,
    body_ceiling: usize,
) -> Result<()> {
    let log = ResponseLog::new(body_ceiling);
    let surface: ChromiumSurface = session
        .new_surface(log.clone())
        .await
        .context("opening page")?;

    enter_site(&surface, config, sink).await?;
    submit_search(&surface, config, sink).await?;

    if search_has_no_results(&surface).await {
        info!(term = %config.term, "search returned no results");
        sink.step("no results");
        let empty = ExtractedTable::headers_only(&RELATED_COLUMNS);
        return export::write_csv(&empty, &config.output_path());
    }

    match drill_down_to_detail(&surface, sink, config.timeout).await? {
        DrillOutcome::DetailView => {}
        DrillOutcome::Stuck => {
            warn!("drill-down stuck on the list view; extracting in place");
        }
    }

    let extraction = extract_related_targets(&surface, &log.snapshot(), sink, config.timeout).await;
    sink.write_xhr_log(&log.snapshot());
    let extraction = extraction.context("extracting related targets")?;
    info!(provenance = %extraction.provenance, rows = extraction.table.row_count(), "extraction complete");

    export::write_csv(&extraction.table, &config.output_path())?;
    check_reference(&extraction.table, &config.reference_path())
}

/// Navigate to the first working entry URL, retrying each. Success means a
/// visible search box, not just a loaded document.
async fn enter_site(
    surface: &dyn PageSurface,
    config: &RunConfig,
    sink: &FileSink,
) -> Result<()> {
    let mut last_err: Option<anyhow::Error> = None;
    for entry in entry_urls() {
        let url = urls::normalize_url(&entry);
        sink.step(&format!("entry: {url}"));
        let navigated = with_retry(config.retry_attempts, config.retry_delay, || {
            surface.navigate(&url, WaitPolicy::NetworkIdle)
        })
        .await;
        if let Err(err) = navigated {
            warn!(%url, %err, "entry navigation failed");
            last_err = Some(anyhow!(err).context(format!("navigating {url}")));
            continue;
        }
        dismiss_popup(surface).await;
        sink.dump(surface, "entry").await;
        if find_visible(surface, &SEARCH_INPUTS).await.is_some() {
            return Ok(());
        }
        warn!(%url, "entry page carries no search box");
        last_err = Some(anyhow!("no search box on {url}"));
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no entry urls configured")))
}

/// Entry URLs from `step_urls.txt` when present, defaults otherwise.
fn entry_urls() -> Vec<String> {
    if let Ok(text) = std::fs::read_to_string(STEP_URLS_FILE) {
        let overrides: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http"))
            .map(String::from)
            .collect();
        if !overrides.is_empty() {
            info!(count = overrides.len(), "entry urls overridden from {STEP_URLS_FILE}");
            return overrides;
        }
    }
    ENTRY_URLS.iter().map(|s| s.to_string()).collect()
}

/// Fill the herb term and fire the search. Missing input or trigger is
/// fatal; the site is unusable without them.
async fn submit_search(
    surface: &dyn PageSurface,
    config: &RunConfig,
    sink: &FileSink,
) -> Result<()> {
    let (input_sel, input_idx) = find_visible(surface, &SEARCH_INPUTS)
        .await
        .ok_or_else(|| anyhow!("search input not found"))?;
    surface
        .fill(input_sel, input_idx, &config.term)
        .await
        .context("filling search input")?;

    let trigger = match find_visible(surface, &SEARCH_TRIGGERS).await {
        Some(found) => Some(found),
        None => find_button_by_text(surface, "search").await,
    };
    let (trigger_sel, trigger_idx) = trigger.ok_or_else(|| anyhow!("search trigger not found"))?;
    surface
        .click(trigger_sel, trigger_idx)
        .await
        .context("clicking search trigger")?;
    sink.step(&format!("search: {}", config.term));

    // The results grid and the no-results banner share the same container;
    // waiting for it covers both outcomes.
    if let Err(err) = surface
        .wait_for_selector("#grid", WaitState::Attached, config.timeout)
        .await
    {
        warn!(%err, "results container never attached");
    }
    dismiss_popup(surface).await;
    sink.dump(surface, "search_results").await;
    Ok(())
}

/// First visible element among the candidate selectors, in candidate order.
async fn find_visible<'a>(
    surface: &dyn PageSurface,
    candidates: &[&'a str],
) -> Option<(&'a str, usize)> {
    for &selector in candidates {
        let count = surface.count(selector).await.unwrap_or(0);
        for index in 0..count {
            if surface.is_visible(selector, index).await.unwrap_or(false) {
                return Some((selector, index));
            }
        }
    }
    None
}

/// First visible `button` whose text contains `needle`, case-insensitive.
async fn find_button_by_text(
    surface: &dyn PageSurface,
    needle: &str,
) -> Option<(&'static str, usize)> {
    const BUTTONS: &str = "button";
    let count = surface.count(BUTTONS).await.unwrap_or(0);
    for index in 0..count {
        let text = surface.inner_text(BUTTONS, index).await.unwrap_or_default();
        if text.to_lowercase().contains(needle)
            && surface.is_visible(BUTTONS, index).await.unwrap_or(false)
        {
            return Some((BUTTONS, index));
        }
    }
    None
}

/// Retry a whole step a fixed number of times with a fixed delay, re-raising
/// the last error on exhaustion.
async fn with_retry<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last = None;
    for attempt in 1..=attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, %err, "step failed");
                last = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last.expect("at least one attempt"))
}

/// Compare against a previously saved table when one exists. A mismatch is
/// its own failure mode, distinct from extraction failure.
fn check_reference(table: &ExtractedTable, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let reference = export::read_csv(path)
        .with_context(|| format!("reading reference {}", path.display()))?;
    if compare_with_reference(table, &reference) {
        info!(path = %path.display(), "extracted table matches reference");
        Ok(())
    } else {
        bail!(
            "extracted table does not match reference {}",
            path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err("not yet".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_reraises_last_error() {
        let result: Result<(), String> = with_retry(2, Duration::from_millis(1), || async {
            Err("still broken".to_string())
        })
        .await;
        assert_eq!(result.unwrap_err(), "still broken");
    }

    #[test]
    fn zero_results_table_has_canonical_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Success1.csv");
        let empty = ExtractedTable::headers_only(&RELATED_COLUMNS);
        export::write_csv(&empty, &path).unwrap();
        let back = export::read_csv(&path).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.column_names(), RELATED_COLUMNS.to_vec());
    }

    #[test]
    fn reference_check_passes_after_dtype_coercion() {
        let dir = tempfile::tempdir().unwrap();
        let reference_path = dir.path().join("licorice_RelatedTargets.csv");
        let reference = ExtractedTable::from_rows(
            vec!["molecule_ID".into(), "SVM_score".into()],
            vec![vec!["100".into(), "0.93".into()]],
        );
        export::write_csv(&reference, &reference_path).unwrap();

        // Candidate carries the same data with an extra column and string
        // cells; coercion must make them equal.
        let candidate = ExtractedTable::from_rows(
            vec!["extra".into(), "molecule_ID".into(), "SVM_score".into()],
            vec![vec!["x".into(), "100".into(), "0.93".into()]],
        );
        check_reference(&candidate, &reference_path).unwrap();
    }

    #[test]
    fn reference_mismatch_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let reference_path = dir.path().join("licorice_RelatedTargets.csv");
        let reference = ExtractedTable::from_rows(
            vec!["molecule_ID".into()],
            vec![vec!["100".into()]],
        );
        export::write_csv(&reference, &reference_path).unwrap();

        let candidate = ExtractedTable::from_rows(
            vec!["molecule_ID".into()],
            vec![vec!["999".into()]],
        );
        assert!(check_reference(&candidate, &reference_path).is_err());
    }
}
