use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Title-block annotator for one rendered drawing page.
#[derive(Debug, Clone, Parser)]
#[command(name = "titleblock-annotator", version)]
pub struct EditorConfig {
    /// Id of the page record to annotate.
    pub page_id: String,

    /// Base URL of the page service.
    #[arg(long, env = "TITLEBLOCK_API_URL", default_value = "http://localhost:3000")]
    pub api_url: String,

    /// Directory that non-URL image references are relative to.
    #[arg(long, env = "TITLEBLOCK_IMAGE_ROOT", default_value = ".")]
    pub image_root: PathBuf,

    /// Per-request timeout for the page service, in seconds.
    #[arg(long, env = "TITLEBLOCK_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl EditorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn window_title(&self) -> String {
        format!("Title block: {}", self.page_id)
    }
}

/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_and_flags() {
        let cfg = EditorConfig::try_parse_from([
            "titleblock-annotator",
            "page-42",
            "--api-url",
            "http://docs.internal:8080",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        assert_eq!(cfg.page_id, "page-42");
        assert_eq!(cfg.api_url, "http://docs.internal:8080");
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.window_title(), "Title block: page-42");
        assert!(cfg.window_title().is_ascii());
    }

    #[test]
    fn page_id_is_required() {
        assert!(EditorConfig::try_parse_from(["titleblock-annotator"]).is_err());
    }
}
