#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use poll_cache::DevicePoller;
use types::{DeviceIdentity, MeasurementKind, StateClass};

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state store io error: {0}")]
    Io(String),
}

/// Value handed back by the persistence collaborator on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoredValue {
    pub value: u32,
    pub reset_marker: Option<NaiveDate>,
}

/// Persistence seam: restores a sensor's last known value across restarts
/// and records updates as they happen.
pub trait StateStore: Send + Sync {
    fn restore_last_value(&self, sensor_id: &str) -> Option<RestoredValue>;
    fn save_last_value(
        &self,
        sensor_id: &str,
        value: u32,
        reset_marker: Option<NaiveDate>,
    ) -> Result<(), StateStoreError>;
}

/// For compositions that run without persistence.
pub struct NoopStateStore;

impl StateStore for NoopStateStore {
    fn restore_last_value(&self, _sensor_id: &str) -> Option<RestoredValue> {
        None
    }

    fn save_last_value(
        &self,
        _sensor_id: &str,
        _value: u32,
        _reset_marker: Option<NaiveDate>,
    ) -> Result<(), StateStoreError> {
        Ok(())
    }
}

/// When to zero the cumulative energy counter, independent of poll success.
/// The two strategies emulate the same inverter behavior (no generation
/// overnight); pick one, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Zero exactly once when the stored local date advances.
    DateMarker,
    /// Zero exactly once when the local clock enters the overnight window.
    /// The window may span midnight (e.g. 23:00-03:00).
    DeadBand { start: NaiveTime, end: NaiveTime },
}

/// One exposed value per (device, measurement kind).
pub struct InverterSensor {
    id: String,
    name: String,
    kind: MeasurementKind,
    poller: Arc<Mutex<DevicePoller>>,
    store: Arc<dyn StateStore>,
    policy: ResetPolicy,
    value: u32,
    restored: bool,
    last_reset: Option<NaiveDate>,
    /// Previous dead-band membership, None until first observed.
    was_in_dead_band: Option<bool>,
}

impl InverterSensor {
    pub fn new(
        device: &DeviceIdentity,
        kind: MeasurementKind,
        poller: Arc<Mutex<DevicePoller>>,
        store: Arc<dyn StateStore>,
        policy: ResetPolicy,
    ) -> Self {
        Self {
            id: device.sensor_id(kind),
            name: device.sensor_name(kind),
            kind,
            poller,
            store,
            policy,
            value: 0,
            restored: false,
            last_reset: None,
            was_in_dead_band: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn unit(&self) -> &'static str {
        self.kind.unit()
    }

    pub fn read(&self) -> u32 {
        self.value
    }

    /// Scheduler entry point; correct under any tick cadence of a few
    /// seconds or more, decoupled from the poll cache's own throttle.
    pub async fn update(&mut self) {
        self.update_at(chrono::Local::now().naive_local()).await;
    }

    /// `update` with an explicit clock reading.
    pub async fn update_at(&mut self, now: NaiveDateTime) {
        if !self.restored {
            self.restored = true;
            if let Some(restored) = self.store.restore_last_value(&self.id) {
                self.value = restored.value;
                if self.kind.state_class() == StateClass::TotalIncreasing {
                    self.last_reset = restored.reset_marker;
                }
                info!(sensor = %self.id, value = restored.value, "restored last known value");
            }
        }

        let (is_fresh, values) = self.poller.lock().await.get_values().await;
        match self.kind.state_class() {
            StateClass::Measurement => {
                self.value = values.get(self.kind);
            }
            StateClass::TotalIncreasing => {
                // Only a confirmed-fresh value may overwrite the counter. A
                // default 0 from an offline inverter would otherwise look
                // like a reset that never happened on the device.
                if is_fresh {
                    self.value = values.get(self.kind);
                }
            }
        }

        self.apply_daily_reset(now);

        if let Err(err) = self
            .store
            .save_last_value(&self.id, self.value, self.last_reset)
        {
            warn!(sensor = %self.id, error = %err, "saving sensor state failed");
        }
    }

    fn apply_daily_reset(&mut self, now: NaiveDateTime) {
        if self.kind.state_class() != StateClass::TotalIncreasing {
            return;
        }
        match self.policy {
            ResetPolicy::DateMarker => {
                let today = now.date();
                match self.last_reset {
                    Some(marker) if marker < today => {
                        self.value = 0;
                        self.last_reset = Some(today);
                        info!(sensor = %self.id, %today, "daily energy reset");
                    }
                    None => {
                        // First observation seeds the marker without zeroing.
                        self.last_reset = Some(today);
                    }
                    Some(_) => {}
                }
            }
            ResetPolicy::DeadBand { start, end } => {
                let inside = time_in_range(start, end, now.time());
                let entered = self.was_in_dead_band == Some(false) && inside;
                self.was_in_dead_band = Some(inside);
                if entered {
                    self.value = 0;
                    info!(sensor = %self.id, "daily energy reset (dead-band entry)");
                }
            }
        }
    }
}

/// Window membership; a window with `start > end` spans midnight.
fn time_in_range(start: NaiveTime, end: NaiveTime, time: NaiveTime) -> bool {
    if start <= end {
        start <= time && time <= end
    } else {
        start <= time || time <= end
    }
}
