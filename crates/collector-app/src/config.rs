use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;

use poll_cache::PollerConfig;
use sensor::ResetPolicy;
use types::DeviceIdentity;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;
const DEFAULT_FRESHNESS_WINDOW_MS: u64 = 20_000;
const DEFAULT_UPDATE_INTERVAL_MS: u64 = 30_000;
const DEFAULT_STATE_PATH: &str = "solplus-state.json";

/// Which transport implementation to compose the pollers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Non-blocking reqwest client.
    Async,
    /// Blocking ureq client offloaded to the blocking pool.
    Blocking,
}

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub devices: Vec<DeviceIdentity>,
    pub log_http_errors: bool,
    pub transport: TransportKind,
    pub request_timeout_ms: u64,
    pub refresh_interval_ms: u64,
    pub freshness_window_ms: u64,
    /// Scheduler tick cadence for sensor updates.
    pub update_interval_ms: u64,
    pub reset_policy: ResetPolicy,
    pub state_path: String,
}

impl CollectorConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config)?;
        }

        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashMap::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                anyhow::bail!("devices entries must have a non-empty id");
            }
            if device.name.trim().is_empty() {
                anyhow::bail!("device {} must have a non-empty name", device.id);
            }
            if device.host.trim().is_empty() {
                anyhow::bail!("device {} must have a non-empty host", device.id);
            }
            if seen.insert(device.id.clone(), ()).is_some() {
                anyhow::bail!("device id {} configured more than once", device.id);
            }
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("poller.request_timeout_ms must be >= 1");
        }
        if self.refresh_interval_ms == 0 {
            anyhow::bail!("poller.refresh_interval_ms must be >= 1");
        }
        if self.freshness_window_ms == 0 {
            anyhow::bail!("poller.freshness_window_ms must be >= 1");
        }
        if self.freshness_window_ms > self.refresh_interval_ms {
            anyhow::bail!("poller.freshness_window_ms must not exceed poller.refresh_interval_ms");
        }
        if self.update_interval_ms < 1_000 {
            anyhow::bail!("scheduler.update_interval_ms must be >= 1000");
        }
        if let ResetPolicy::DeadBand { start, end } = &self.reset_policy {
            if start == end {
                anyhow::bail!("reset.dead_band_start and reset.dead_band_end must differ");
            }
        }
        if self.state_path.trim().is_empty() {
            anyhow::bail!("state.path must be non-empty");
        }
        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            freshness_window: Duration::from_millis(self.freshness_window_ms),
            log_http_errors: self.log_http_errors,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            log_http_errors: false,
            transport: TransportKind::Async,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            freshness_window_ms: DEFAULT_FRESHNESS_WINDOW_MS,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            reset_policy: ResetPolicy::DateMarker,
            state_path: DEFAULT_STATE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    devices: Option<HashMap<String, FileDeviceConfig>>,
    log_http_errors: Option<bool>,
    transport: Option<String>,
    poller: Option<FilePollerConfig>,
    scheduler: Option<FileSchedulerConfig>,
    reset: Option<FileResetConfig>,
    state: Option<FileStateConfig>,
}

#[derive(Debug, Deserialize)]
struct FileDeviceConfig {
    name: String,
    host: String,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    request_timeout_ms: Option<u64>,
    refresh_interval_ms: Option<u64>,
    freshness_window_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileSchedulerConfig {
    update_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileResetConfig {
    policy: Option<String>,
    dead_band_start: Option<String>,
    dead_band_end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileStateConfig {
    path: Option<String>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("SOLPLUS_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content =
        fs::read_to_string(&path).with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut CollectorConfig, file: FileConfig) -> Result<()> {
    if let Some(devices) = file.devices {
        let mut parsed: Vec<DeviceIdentity> = devices
            .into_iter()
            .map(|(id, device)| DeviceIdentity {
                id,
                name: device.name,
                host: device.host,
            })
            .collect();
        parsed.sort_by(|a, b| a.id.cmp(&b.id));
        config.devices = parsed;
    }

    if let Some(log_http_errors) = file.log_http_errors {
        config.log_http_errors = log_http_errors;
    }

    if let Some(transport) = file.transport {
        config.transport = parse_transport(&transport)?;
    }

    if let Some(poller) = file.poller {
        if let Some(timeout_ms) = poller.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = poller.refresh_interval_ms {
            config.refresh_interval_ms = interval_ms;
        }
        if let Some(window_ms) = poller.freshness_window_ms {
            config.freshness_window_ms = window_ms;
        }
    }

    if let Some(scheduler) = file.scheduler {
        if let Some(interval_ms) = scheduler.update_interval_ms {
            config.update_interval_ms = interval_ms;
        }
    }

    if let Some(reset) = file.reset {
        config.reset_policy = parse_reset_policy(
            reset.policy.as_deref(),
            reset.dead_band_start.as_deref(),
            reset.dead_band_end.as_deref(),
            &config.reset_policy,
        )?;
    }

    if let Some(state) = file.state {
        if let Some(path) = state.path {
            config.state_path = path;
        }
    }

    Ok(())
}

fn apply_env_overrides(config: &mut CollectorConfig) -> Result<()> {
    if let Ok(value) = env::var("SOLPLUS_DEVICES") {
        config.devices = parse_device_list(&value);
    }
    if let Some(value) = parse_env_bool("SOLPLUS_LOG_HTTP_ERRORS") {
        config.log_http_errors = value;
    }
    if let Ok(value) = env::var("SOLPLUS_TRANSPORT") {
        config.transport = parse_transport(&value)?;
    }
    if let Some(timeout_ms) = parse_env_u64("SOLPLUS_REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = timeout_ms;
    }
    if let Some(interval_ms) = parse_env_u64("SOLPLUS_REFRESH_INTERVAL_MS") {
        config.refresh_interval_ms = interval_ms;
    }
    if let Some(window_ms) = parse_env_u64("SOLPLUS_FRESHNESS_WINDOW_MS") {
        config.freshness_window_ms = window_ms;
    }
    if let Some(interval_ms) = parse_env_u64("SOLPLUS_UPDATE_INTERVAL_MS") {
        config.update_interval_ms = interval_ms;
    }
    if let Ok(value) = env::var("SOLPLUS_RESET_POLICY") {
        config.reset_policy = parse_reset_policy(
            Some(&value),
            env::var("SOLPLUS_DEAD_BAND_START").ok().as_deref(),
            env::var("SOLPLUS_DEAD_BAND_END").ok().as_deref(),
            &config.reset_policy,
        )?;
    }
    if let Ok(value) = env::var("SOLPLUS_STATE_PATH") {
        config.state_path = value;
    }
    Ok(())
}

fn parse_transport(value: &str) -> Result<TransportKind> {
    match value {
        "async" => Ok(TransportKind::Async),
        "blocking" => Ok(TransportKind::Blocking),
        other => anyhow::bail!("transport must be \"async\" or \"blocking\", got {other:?}"),
    }
}

fn parse_reset_policy(
    policy: Option<&str>,
    dead_band_start: Option<&str>,
    dead_band_end: Option<&str>,
    current: &ResetPolicy,
) -> Result<ResetPolicy> {
    match policy {
        None => Ok(current.clone()),
        Some("date_marker") => Ok(ResetPolicy::DateMarker),
        Some("dead_band") => {
            let start = parse_clock_time(dead_band_start.unwrap_or("23:00"))?;
            let end = parse_clock_time(dead_band_end.unwrap_or("03:00"))?;
            Ok(ResetPolicy::DeadBand { start, end })
        }
        Some(other) => {
            anyhow::bail!("reset.policy must be \"date_marker\" or \"dead_band\", got {other:?}")
        }
    }
}

fn parse_clock_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("clock time {value:?} must be HH:MM"))
}

/// Comma list of `id@host` entries; the id doubles as display name.
fn parse_device_list(value: &str) -> Vec<DeviceIdentity> {
    value
        .split(',')
        .filter_map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                return None;
            }
            let (id, host) = trimmed.split_once('@')?;
            Some(DeviceIdentity {
                id: id.to_string(),
                name: id.to_string(),
                host: host.to_string(),
            })
        })
        .collect()
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
