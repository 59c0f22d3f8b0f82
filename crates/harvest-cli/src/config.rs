use harvest_fetch::{DEFAULT_CONCURRENCY, DEFAULT_USER_AGENT};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Run configuration, loaded from `HARVEST_*` environment variables.
/// Command-line flags override individual fields afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the on-disk layout (catalogs, files, faces).
    pub output_root: PathBuf,
    /// Prefix for attachment download hrefs.
    pub base_endpoint: String,
    pub user_agent: String,
    /// Maximum requests in flight.
    pub concurrency: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; later retries back off exponentially.
    pub retry_delay: Duration,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Where missing models are fetched from; unset means fail instead.
    pub model_base_url: Option<String>,
    /// Face crop padding fraction.
    pub padding: f32,
    /// Whether the face stage records encodings.
    pub write_encodings: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("HARVEST_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                lookup("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("harvest/models")
            });

        Self {
            output_root: lookup("HARVEST_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output")),
            base_endpoint: lookup("HARVEST_BASE_ENDPOINT")
                .unwrap_or_else(|| "https://www.namus.gov".to_string()),
            user_agent: lookup("HARVEST_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            concurrency: parse_var(&lookup, "HARVEST_CONCURRENCY")
                .unwrap_or(DEFAULT_CONCURRENCY),
            request_timeout: Duration::from_secs(
                parse_var(&lookup, "HARVEST_REQUEST_TIMEOUT_SECS").unwrap_or(60),
            ),
            max_attempts: parse_var(&lookup, "HARVEST_MAX_ATTEMPTS").unwrap_or(3),
            retry_delay: Duration::from_millis(
                parse_var(&lookup, "HARVEST_RETRY_DELAY_MS").unwrap_or(1000),
            ),
            model_dir,
            model_base_url: lookup("HARVEST_MODEL_BASE_URL").filter(|v| !v.trim().is_empty()),
            padding: parse_var(&lookup, "HARVEST_PADDING").unwrap_or(0.0),
            write_encodings: lookup("HARVEST_WRITE_ENCODINGS")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
