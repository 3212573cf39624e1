//! Smart trainer link: BLE discovery, telemetry notifications and control point writes.
//!
//! Telemetry flows out through a crossbeam channel of [`SensorEvent`]s. Commands
//! go through a [`TrainerController`], which allows at most one in-flight write
//! per command kind and drops (rather than queues) a second one.

use crate::sensors::ftms::{
    decode_rider_telemetry, encode_request_control, encode_reset, encode_set_gradient,
    encode_set_target_power, FTMS_CONTROL_POINT_UUID, FTMS_SERVICE_UUID, INDOOR_BIKE_DATA_UUID,
};
use crate::sensors::types::{ConnectionState, SensorError, SensorEvent, TransmitError};
use crate::storage::config::TrainerSettings;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use crossbeam::channel::{Receiver, Sender};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the adapter is polled for new peripherals while scanning.
const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A writable control channel on the trainer.
pub trait ControlPoint: Send + Sync + 'static {
    /// Write one command and wait for the device to accept it.
    fn write<'a>(&'a self, command: &'a [u8]) -> BoxFuture<'a, Result<(), TransmitError>>;
}

/// Resets a busy flag when the write completes, successfully or not.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, TransmitError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(TransmitError::Busy);
        }
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes control point writes per command kind.
pub struct TrainerController<C: ControlPoint> {
    control: C,
    setting_gradient: AtomicBool,
    setting_erg: AtomicBool,
}

impl<C: ControlPoint> TrainerController<C> {
    /// Wrap a control point.
    pub fn new(control: C) -> Self {
        Self {
            control,
            setting_gradient: AtomicBool::new(false),
            setting_erg: AtomicBool::new(false),
        }
    }

    /// Access the underlying control point.
    pub fn control(&self) -> &C {
        &self.control
    }

    /// Whether a gradient write is in flight.
    pub fn is_setting_gradient(&self) -> bool {
        self.setting_gradient.load(Ordering::Acquire)
    }

    /// Whether an ERG write is in flight.
    pub fn is_setting_erg(&self) -> bool {
        self.setting_erg.load(Ordering::Acquire)
    }

    /// Ask the trainer for control. Required by most trainers before any other command.
    pub async fn request_control(&self) -> Result<(), TransmitError> {
        self.control.write(&encode_request_control()).await
    }

    /// Send a reset command.
    pub async fn reset(&self) -> Result<(), TransmitError> {
        self.control.write(&encode_reset()).await?;
        tracing::info!("Trainer reset command sent");
        Ok(())
    }

    /// Send simulation parameters for a grade.
    ///
    /// Returns [`TransmitError::Busy`] without writing if a gradient write is in flight.
    pub async fn set_gradient(&self, grade_percent: f64) -> Result<(), TransmitError> {
        let _guard = BusyGuard::acquire(&self.setting_gradient)?;
        self.control.write(&encode_set_gradient(grade_percent)).await?;
        tracing::debug!("Set gradient to {:.2}%", grade_percent);
        Ok(())
    }

    /// Set target power for ERG mode.
    ///
    /// Returns [`TransmitError::Busy`] without writing if an ERG write is in flight.
    pub async fn set_target_power(&self, target_watts: u16) -> Result<(), TransmitError> {
        let _guard = BusyGuard::acquire(&self.setting_erg)?;
        self.control.write(&encode_set_target_power(target_watts)).await?;
        tracing::debug!("ERG target set to {}W", target_watts);
        Ok(())
    }
}

/// Control point backed by a connected BLE peripheral.
pub struct BleControlPoint {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl ControlPoint for BleControlPoint {
    fn write<'a>(&'a self, command: &'a [u8]) -> BoxFuture<'a, Result<(), TransmitError>> {
        Box::pin(async move {
            self.peripheral
                .write(&self.characteristic, command, WriteType::WithResponse)
                .await
                .map_err(|e| TransmitError::WriteFailed(e.to_string()))
        })
    }
}

/// A connected FTMS trainer.
pub struct TrainerLink {
    /// BLE device identifier
    pub device_id: String,
    /// Advertised name
    pub name: String,
    /// Command channel, absent on trainers without a control point
    pub controller: Option<Arc<TrainerController<BleControlPoint>>>,
    peripheral: Peripheral,
}

impl TrainerLink {
    /// Disconnect from the trainer.
    pub async fn disconnect(&self) -> Result<(), SensorError> {
        tracing::info!("Disconnecting from trainer: {}", self.name);
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))
    }
}

/// Scan for an FTMS trainer, connect, and start streaming telemetry.
///
/// Telemetry and connection changes are delivered on the returned receiver.
pub async fn connect_trainer(
    settings: &TrainerSettings,
) -> Result<(TrainerLink, Receiver<SensorEvent>), SensorError> {
    let adapter = first_adapter().await?;

    tracing::info!("Scanning for FTMS trainers");
    adapter
        .start_scan(ScanFilter {
            services: vec![FTMS_SERVICE_UUID],
        })
        .await
        .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

    let found = find_trainer(
        &adapter,
        settings.device_name.as_deref(),
        Duration::from_secs(settings.discovery_timeout_secs),
    )
    .await;

    if let Err(e) = adapter.stop_scan().await {
        tracing::warn!("Failed to stop scan: {}", e);
    }

    let (peripheral, name) =
        found.ok_or(SensorError::TrainerNotFound(settings.discovery_timeout_secs))?;
    let device_id = peripheral.id().to_string();

    tracing::info!("Connecting to trainer: {} ({})", name, device_id);

    tokio::time::timeout(
        Duration::from_secs(settings.connection_timeout_secs),
        peripheral.connect(),
    )
    .await
    .map_err(|_| SensorError::ConnectionTimeout)?
    .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

    peripheral
        .discover_services()
        .await
        .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

    let characteristics = peripheral.characteristics();

    let data_char = characteristics
        .iter()
        .find(|c| c.uuid == INDOOR_BIKE_DATA_UUID)
        .cloned()
        .ok_or_else(|| {
            SensorError::SubscriptionFailed("Indoor Bike Data characteristic missing".to_string())
        })?;

    peripheral
        .subscribe(&data_char)
        .await
        .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

    let controller = match characteristics
        .iter()
        .find(|c| c.uuid == FTMS_CONTROL_POINT_UUID)
        .cloned()
    {
        Some(characteristic) => Some(Arc::new(TrainerController::new(BleControlPoint {
            peripheral: peripheral.clone(),
            characteristic,
        }))),
        None => {
            tracing::warn!("Control point not available; trainer resistance will not follow the route");
            None
        }
    };

    let (tx, rx) = crossbeam::channel::unbounded();
    let _ = tx.send(SensorEvent::ConnectionChanged {
        device_id: device_id.clone(),
        state: ConnectionState::Connected,
    });

    let notify_peripheral = peripheral.clone();
    let notify_id = device_id.clone();
    tokio::spawn(async move {
        handle_notifications(notify_peripheral, tx, notify_id).await;
    });

    if let Some(controller) = &controller {
        if let Err(e) = controller.request_control().await {
            tracing::warn!("Request control failed: {}", e);
        }
        if let Err(e) = controller.reset().await {
            tracing::warn!("Error sending reset command: {}", e);
        }
    }

    tracing::info!("Connected to trainer: {}", name);

    Ok((
        TrainerLink {
            device_id,
            name,
            controller,
            peripheral,
        },
        rx,
    ))
}

async fn first_adapter() -> Result<Adapter, SensorError> {
    let manager = Manager::new()
        .await
        .map_err(|e| SensorError::BleError(e.to_string()))?;

    let adapters = manager
        .adapters()
        .await
        .map_err(|e| SensorError::BleError(e.to_string()))?;

    adapters
        .into_iter()
        .next()
        .ok_or(SensorError::AdapterNotFound)
}

/// Poll the adapter until an FTMS peripheral matching `name_filter` appears.
async fn find_trainer(
    adapter: &Adapter,
    name_filter: Option<&str>,
    timeout: Duration,
) -> Option<(Peripheral, String)> {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if let Ok(peripherals) = adapter.peripherals().await {
            for peripheral in peripherals {
                let Ok(Some(properties)) = peripheral.properties().await else {
                    continue;
                };
                if !properties.services.contains(&FTMS_SERVICE_UUID) {
                    continue;
                }

                let name = properties
                    .local_name
                    .unwrap_or_else(|| "Unknown Trainer".to_string());
                if name_filter.map_or(true, |filter| name.contains(filter)) {
                    return Some((peripheral, name));
                }
            }
        }

        tokio::time::sleep(DISCOVERY_POLL_INTERVAL).await;
    }

    None
}

/// Malformed notifications between repeated warnings.
const DECODE_WARN_EVERY: u64 = 100;

/// Counts decode faults so a misbehaving trainer warns without flooding the log.
#[derive(Debug, Default)]
struct DecodeFaults {
    count: u64,
}

impl DecodeFaults {
    /// Record a fault; true when this one should be logged at warn.
    fn record(&mut self) -> bool {
        self.count += 1;
        self.count == 1 || self.count % DECODE_WARN_EVERY == 0
    }
}

/// Decode notifications until the stream ends, then report the disconnect.
async fn handle_notifications(peripheral: Peripheral, tx: Sender<SensorEvent>, device_id: String) {
    use futures::stream::StreamExt;

    let mut notification_stream = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to get notification stream: {}", e);
            return;
        }
    };

    let mut faults = DecodeFaults::default();

    while let Some(notification) = notification_stream.next().await {
        if notification.uuid != INDOOR_BIKE_DATA_UUID {
            continue;
        }

        match decode_rider_telemetry(&notification.value) {
            Ok(reading) => {
                let _ = tx.send(SensorEvent::Telemetry {
                    reading,
                    received_at: Instant::now(),
                });
            }
            Err(e) => {
                if faults.record() {
                    tracing::warn!(
                        "Ignoring indoor bike data notification ({} so far): {}",
                        faults.count,
                        e
                    );
                } else {
                    tracing::debug!("Ignoring indoor bike data notification: {}", e);
                }
            }
        }
    }

    tracing::warn!("Trainer notification stream ended: {}", device_id);
    let _ = tx.send(SensorEvent::ConnectionChanged {
        device_id,
        state: ConnectionState::Disconnected,
    });
}
