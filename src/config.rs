use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_POSITIONS_DIR: &str = ".positions";
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_LAYOUT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSettings {
    pub api_base_url: String,
    pub positions_dir: PathBuf,
    pub position_save_debounce_ms: u64,
    pub handle_save_debounce_ms: u64,
    pub layout_max_iterations: usize,
    pub http_timeout_ms: u64,
    pub show_inactive: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            positions_dir: PathBuf::from(DEFAULT_POSITIONS_DIR),
            position_save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            handle_save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            layout_max_iterations: DEFAULT_LAYOUT_MAX_ITERATIONS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            show_inactive: true,
            log_dir: None,
        }
    }
}

impl BoardSettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| {
            lookup(name).and_then(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            })
        };

        let api_base_url =
            read("BOARD_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        ensure!(
            api_base_url.starts_with("http://") || api_base_url.starts_with("https://"),
            "BOARD_API_BASE_URL must start with http:// or https://"
        );

        let positions_dir = read("BOARD_POSITIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_POSITIONS_DIR));

        let position_save_debounce_ms = parse_or(
            read("BOARD_POSITION_SAVE_DEBOUNCE_MS"),
            "BOARD_POSITION_SAVE_DEBOUNCE_MS",
            DEFAULT_SAVE_DEBOUNCE_MS,
        )?;
        let handle_save_debounce_ms = parse_or(
            read("BOARD_HANDLE_SAVE_DEBOUNCE_MS"),
            "BOARD_HANDLE_SAVE_DEBOUNCE_MS",
            DEFAULT_SAVE_DEBOUNCE_MS,
        )?;

        let layout_max_iterations = parse_or(
            read("BOARD_LAYOUT_MAX_ITERATIONS"),
            "BOARD_LAYOUT_MAX_ITERATIONS",
            DEFAULT_LAYOUT_MAX_ITERATIONS,
        )?;
        ensure!(
            layout_max_iterations > 0,
            "BOARD_LAYOUT_MAX_ITERATIONS must be greater than 0"
        );

        let http_timeout_ms = parse_or(
            read("BOARD_HTTP_TIMEOUT_MS"),
            "BOARD_HTTP_TIMEOUT_MS",
            DEFAULT_HTTP_TIMEOUT_MS,
        )?;
        ensure!(
            http_timeout_ms > 0,
            "BOARD_HTTP_TIMEOUT_MS must be greater than 0"
        );

        let show_inactive = match read("BOARD_SHOW_INACTIVE") {
            Some(raw) => parse_bool(&raw).context("failed to parse BOARD_SHOW_INACTIVE")?,
            None => true,
        };

        let log_dir = read("BOARD_LOG_DIR").map(PathBuf::from);

        Ok(Self {
            api_base_url,
            positions_dir,
            position_save_debounce_ms,
            handle_save_debounce_ms,
            layout_max_iterations,
            http_timeout_ms,
            show_inactive,
            log_dir,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("failed to parse {name} as {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{other}`"),
    }
}
