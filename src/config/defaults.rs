use super::{
    CatalogConfig, Config, HistoryConfig, LyricsConfig, PlayerConfig, TranslationConfig,
};
use crate::catalog::CatalogClient;
use crate::lyrics::LrclibClient;
use crate::queue::HISTORY_CAP;
use crate::translate::GtxClient;
use crate::translate::cache::PLAIN_PREFETCH_WINDOW;

/// The configuration written on first run.
pub fn defaults() -> Config {
    Config::default()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: CatalogClient::DEFAULT_BASE_URL.to_string(),
            search_limit: 20,
        }
    }
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            base_url: LrclibClient::DEFAULT_BASE_URL.to_string(),
            duration_tolerance_secs: 5.0,
            assist_language: "en".to_string(),
            memo_capacity: 64,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: GtxClient::DEFAULT_BASE_URL.to_string(),
            default_target: "en".to_string(),
            enabled: true,
            plain_prefetch_window: PLAIN_PREFETCH_WINDOW,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_device: None,
            volume: 80,
            error_skip_delay_ms: 1500,
            restart_threshold_secs: 3.0,
            mpv_log: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { cap: HISTORY_CAP }
    }
}
