use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{info, warn};

use collector_app::config::TransportKind;
use collector_app::{CollectorConfig, FileStateStore};
use http_client::{BlockingTransport, HttpTransport, Transport};
use poll_cache::DevicePoller;
use sensor::{InverterSensor, StateStore};
use types::MeasurementKind;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = parse_config_arg();
    let config = CollectorConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;
    if config.devices.is_empty() {
        warn!("no devices configured");
    }

    let store: Arc<dyn StateStore> = Arc::new(
        FileStateStore::load(&config.state_path).context("state store init failed")?,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut join_set = JoinSet::new();
    for device in &config.devices {
        let transport = build_transport(&config)?;
        let poller = DevicePoller::new(device.clone(), transport, config.poller_config());

        // A dark or rebooting inverter is routine; note it and keep going.
        if let Err(err) = poller.check_connectivity().await {
            warn!(device = %device.id, host = %device.host, error = %err, "inverter not reachable at startup");
        }

        let poller = Arc::new(Mutex::new(poller));
        let sensors: Vec<InverterSensor> = MeasurementKind::ALL
            .into_iter()
            .map(|kind| {
                InverterSensor::new(
                    device,
                    kind,
                    poller.clone(),
                    store.clone(),
                    config.reset_policy.clone(),
                )
            })
            .collect();

        info!(device = %device.id, host = %device.host, "device scheduled");
        join_set.spawn(run_device(
            device.id.clone(),
            sensors,
            config.update_interval(),
            shutdown_rx.clone(),
        ));
    }

    tokio::signal::ctrl_c().await.context("await ctrl_c")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    while let Some(result) = join_set.join_next().await {
        if let Err(err) = result {
            warn!(error = %err, "device task join failed");
        }
    }

    Ok(())
}

/// Per-device scheduler: ticks every `update_interval` and updates the four
/// sensors in turn. Updates for one device are never issued concurrently.
async fn run_device(
    device_id: String,
    mut sensors: Vec<InverterSensor>,
    update_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(update_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for sensor in &mut sensors {
                    sensor.update().await;
                    info!(
                        sensor = %sensor.id(),
                        value = sensor.read(),
                        unit = sensor.unit(),
                        "sensor updated"
                    );
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(device = %device_id, "device scheduler stopped");
                    break;
                }
            }
        }
    }
}

fn build_transport(config: &CollectorConfig) -> Result<Box<dyn Transport>> {
    let timeout = config.request_timeout();
    match config.transport {
        TransportKind::Async => Ok(Box::new(
            HttpTransport::new(timeout).context("build http client failed")?,
        )),
        TransportKind::Blocking => Ok(Box::new(BlockingTransport::new(timeout))),
    }
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}
