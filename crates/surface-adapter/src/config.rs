//! Session and surface configuration.
//!
//! Everything runtime-tunable is carried explicitly in this value; the
//! adapter never consults ambient environment state.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_BODY_CEILING_BYTES: usize = 2_000_000;

const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0.0.0 Safari/537.36";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub headless: bool,
    /// Fixed delay inserted before each mutating action, for headed
    /// debugging. Zero disables it.
    pub slow_mo_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Shared bound applied to every navigation and wait.
    pub default_timeout_ms: u64,
    /// Response bodies above this size are captured without their body.
    pub body_ceiling_bytes: usize,
    /// Script evaluated in every new document before page scripts run.
    pub init_script: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            headless: true,
            slow_mo_ms: 0,
            user_agent: DESKTOP_UA.to_string(),
            accept_language: "zh-CN".to_string(),
            viewport_width: 1280,
            viewport_height: 800,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            body_ceiling_bytes: DEFAULT_BODY_CEILING_BYTES,
            init_script: None,
            extra_args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--no-sandbox".to_string(),
            ],
        }
    }
}
