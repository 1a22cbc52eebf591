#![allow(dead_code)]

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info};

use http_client::{Transport, TransportError};
use solplus_parser::ParserError;
use types::{DeviceIdentity, MeasurementSet};

/// Timing policy for one device's poll cache.
///
/// `refresh_interval` rate-limits how often the embedded HTTP server is hit;
/// `freshness_window` is the shorter cutoff below which a cached value still
/// counts as confirmed good.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub refresh_interval: Duration,
    pub freshness_window: Duration,
    /// Log transport failures at error level instead of debug, for chasing
    /// connection issues on a live deployment.
    pub log_http_errors: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            freshness_window: Duration::from_secs(20),
            log_http_errors: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("inverter answered with status code {status}")]
    Status { status: u16 },
    #[error(transparent)]
    Parse(#[from] ParserError),
}

/// Last-known values plus the poll throttle for a single inverter.
///
/// Mutated only by a successful poll; transient failures leave the stored
/// values untouched so a flaky device never zeroes out a running total.
pub struct DevicePoller {
    device: DeviceIdentity,
    transport: Box<dyn Transport>,
    config: PollerConfig,
    last_success_at: Option<Instant>,
    values: MeasurementSet,
}

impl DevicePoller {
    pub fn new(device: DeviceIdentity, transport: Box<dyn Transport>, config: PollerConfig) -> Self {
        Self {
            device,
            transport,
            config,
            last_success_at: None,
            values: MeasurementSet::default(),
        }
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Returns the last-known values, refreshing them first when the refresh
    /// interval has elapsed. The flag reports whether the values were
    /// confirmed by a successful poll within the freshness window.
    pub async fn get_values(&mut self) -> (bool, MeasurementSet) {
        let now = Instant::now();
        let elapsed = self.last_success_at.map(|at| now - at);

        let due = match elapsed {
            Some(elapsed) => elapsed >= self.config.refresh_interval,
            None => true,
        };
        if !due {
            // Not due for a re-check; freshness depends on the shorter window.
            let is_fresh = elapsed.is_some_and(|elapsed| elapsed < self.config.freshness_window);
            return (is_fresh, self.values);
        }

        match self.poll().await {
            Ok(new_values) => {
                self.values = new_values;
                self.last_success_at = Some(now);
                debug!(device = %self.device.id, ?new_values, "poll succeeded");
                (true, self.values)
            }
            Err(err) => {
                self.log_failure(&err);
                (false, self.values)
            }
        }
    }

    /// Startup probe: one fetch, status check only. Never fatal.
    pub async fn check_connectivity(&self) -> Result<(), PollError> {
        let response = self.transport.fetch(&self.device.host).await?;
        if !response.is_ok() {
            return Err(PollError::Status {
                status: response.status,
            });
        }
        info!(device = %self.device.id, host = %self.device.host, "inverter reachable");
        Ok(())
    }

    async fn poll(&self) -> Result<MeasurementSet, PollError> {
        let response = self.transport.fetch(&self.device.host).await?;
        if !response.is_ok() {
            return Err(PollError::Status {
                status: response.status,
            });
        }
        Ok(solplus_parser::parse_status_page(&response.body)?)
    }

    fn log_failure(&self, err: &PollError) {
        match err {
            PollError::Transport(err) if !self.config.log_http_errors => {
                debug!(device = %self.device.id, host = %self.device.host, error = %err, "poll failed");
            }
            PollError::Transport(err) => {
                error!(device = %self.device.id, host = %self.device.host, error = %err, "poll failed");
            }
            PollError::Status { status } => {
                error!(device = %self.device.id, host = %self.device.host, status, "inverter returned unexpected status");
            }
            PollError::Parse(err) => {
                error!(device = %self.device.id, host = %self.device.host, error = %err, "status page received but parsing failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_match_device_cadence() {
        let config = PollerConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.freshness_window, Duration::from_secs(20));
        assert!(config.freshness_window < config.refresh_interval);
    }
}
