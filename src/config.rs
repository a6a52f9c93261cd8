//! Application-level configuration loading: wheel palettes and spin timing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LUNCH_ROULETTE_CONFIG_PATH";
/// How long a wheel keeps spinning before the result is drawn.
pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_millis(2_000);
const DEFAULT_SSE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    restaurant_palette: Vec<String>,
    coffee_palette: Vec<String>,
    spin_duration: Duration,
    sse_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        spin_ms = app_config.spin_duration.as_millis(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; keys left out keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Replace the spin duration, mostly useful to keep tests fast.
    pub fn with_spin_duration(mut self, spin_duration: Duration) -> Self {
        self.spin_duration = spin_duration;
        self
    }

    /// Colors cycled over the restaurant wheel segments.
    pub fn restaurant_palette(&self) -> &[String] {
        &self.restaurant_palette
    }

    /// Colors cycled over the coffee wheel segments.
    pub fn coffee_palette(&self) -> &[String] {
        &self.coffee_palette
    }

    pub fn spin_duration(&self) -> Duration {
        self.spin_duration
    }

    /// Capacity of the public SSE broadcast channel.
    pub fn sse_capacity(&self) -> usize {
        self.sse_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            restaurant_palette: palette(&DEFAULT_RESTAURANT_PALETTE),
            coffee_palette: palette(&DEFAULT_COFFEE_PALETTE),
            spin_duration: DEFAULT_SPIN_DURATION,
            sse_capacity: DEFAULT_SSE_CAPACITY,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    restaurant_palette: Option<Vec<String>>,
    #[serde(default)]
    coffee_palette: Option<Vec<String>>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    spin_duration_ms: Option<Duration>,
    #[serde(default)]
    sse_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            restaurant_palette: value
                .restaurant_palette
                .filter(|colors| !colors.is_empty())
                .unwrap_or(defaults.restaurant_palette),
            coffee_palette: value
                .coffee_palette
                .filter(|colors| !colors.is_empty())
                .unwrap_or(defaults.coffee_palette),
            spin_duration: value.spin_duration_ms.unwrap_or(defaults.spin_duration),
            sse_capacity: value
                .sse_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.sse_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn palette(colors: &[&str]) -> Vec<String> {
    colors.iter().map(|color| (*color).to_owned()).collect()
}

/// red, blue, green, yellow, purple, pink, indigo, orange (400 shades).
const DEFAULT_RESTAURANT_PALETTE: [&str; 8] = [
    "#f87171", "#60a5fa", "#4ade80", "#facc15", "#c084fc", "#f472b6", "#818cf8", "#fb923c",
];

/// orange, yellow, amber, red, pink, rose, purple, indigo (400 shades).
const DEFAULT_COFFEE_PALETTE: [&str; 8] = [
    "#fb923c", "#facc15", "#fbbf24", "#f87171", "#f472b6", "#fb7185", "#c084fc", "#818cf8",
];
