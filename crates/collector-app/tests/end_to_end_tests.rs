use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::NaiveDate;
use collector_app::FileStateStore;
use http_client::{HttpResponse, Transport, TransportError};
use poll_cache::{DevicePoller, PollerConfig};
use sensor::{InverterSensor, ResetPolicy, StateStore};
use tokio::sync::Mutex;
use types::{DeviceIdentity, MeasurementKind};

enum Outcome {
    Page(String),
    Timeout,
}

/// Replays scripted outcomes in order; the last one repeats.
struct ScriptedTransport {
    outcomes: StdMutex<VecDeque<Outcome>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, _host: &str) -> Result<HttpResponse, TransportError> {
        let mut outcomes = self.outcomes.lock().expect("outcomes lock");
        let outcome = if outcomes.len() > 1 {
            outcomes.pop_front().expect("non-empty script")
        } else {
            match outcomes.front().expect("non-empty script") {
                Outcome::Page(html) => Outcome::Page(html.clone()),
                Outcome::Timeout => Outcome::Timeout,
            }
        };
        match outcome {
            Outcome::Page(body) => Ok(HttpResponse { status: 200, body }),
            Outcome::Timeout => Err(TransportError::Timeout),
        }
    }
}

fn status_page(energy: u32, power: u32) -> String {
    format!(
        "<li>Energie Tag: {energy} kWh</li>\
         <b>Leistung AC: {power} Watt</b>\
         <b>Netzspannung: 230 Volt</b>\
         <b>Gleichspannung: 400 Volt</b>"
    )
}

fn device() -> DeviceIdentity {
    DeviceIdentity {
        id: "inverter1".to_string(),
        name: "Roof".to_string(),
        host: "192.168.1.40".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn restart_with_dark_device_then_recovery() {
    let path = temp_state_path("restart_with_dark_device");
    std::fs::write(
        &path,
        r#"{"inverter1_energy": {"value": 500, "reset_marker": "2026-08-25"}}"#,
    )
    .expect("seed state file");

    let store: Arc<dyn StateStore> =
        Arc::new(FileStateStore::load(&path).expect("load state store"));
    let transport = Box::new(ScriptedTransport {
        outcomes: StdMutex::new(
            vec![
                Outcome::Timeout,
                Outcome::Timeout,
                Outcome::Page(status_page(512, 900)),
            ]
            .into(),
        ),
    });
    let poller = Arc::new(Mutex::new(DevicePoller::new(
        device(),
        transport,
        PollerConfig::default(),
    )));

    let mut energy = InverterSensor::new(
        &device(),
        MeasurementKind::Energy,
        poller.clone(),
        store.clone(),
        ResetPolicy::DateMarker,
    );
    let mut power = InverterSensor::new(
        &device(),
        MeasurementKind::Power,
        poller,
        store.clone(),
        ResetPolicy::DateMarker,
    );

    // First scheduler tick after restart: the device times out, the parser
    // is never reached, and the restored counter survives while the
    // instantaneous reading shows the cache's default zero.
    energy.update_at(date(2026, 8, 25).and_hms_opt(12, 0, 0).expect("time")).await;
    power.update_at(date(2026, 8, 25).and_hms_opt(12, 0, 5).expect("time")).await;
    assert_eq!(energy.read(), 500);
    assert_eq!(power.read(), 0);

    // Device comes back: the fresh page flows through cache and resolvers.
    energy.update_at(date(2026, 8, 25).and_hms_opt(12, 1, 0).expect("time")).await;
    tokio::time::advance(Duration::from_secs(61)).await;
    power.update_at(date(2026, 8, 25).and_hms_opt(12, 2, 0).expect("time")).await;
    assert_eq!(energy.read(), 512);
    assert_eq!(power.read(), 900);

    // The new values made it back to disk.
    let reloaded = FileStateStore::load(&path).expect("reload state store");
    let saved = reloaded
        .restore_last_value("inverter1_energy")
        .expect("energy persisted");
    assert_eq!(saved.value, 512);
    assert_eq!(saved.reset_marker, Some(date(2026, 8, 25)));
    let saved = reloaded
        .restore_last_value("inverter1_power")
        .expect("power persisted");
    assert_eq!(saved.value, 900);

    let _ = std::fs::remove_file(&path);
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn temp_state_path(prefix: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let pid = std::process::id();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    path.push(format!("{prefix}-{pid}-{ts}.json"));
    path
}
