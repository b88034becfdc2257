//! Gyroscope telemetry.
//!
//! Samples the motion sensor once per period, converts the raw counts to
//! degrees per second and publishes a text line to the telemetry topic.
//! Read and publish failures are logged and the loop keeps going.

use meshroute_core::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{MeshError, MeshResult};
use crate::link::{MotionSensor, StatusSink};

/// Sensor sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySettings {
    /// Sampling period
    pub period: Duration,
    /// Raw counts per degree/second
    pub scale: f32,
    /// Bias subtracted after scaling
    pub offset: [f32; 3],
    /// Topic for sample lines
    pub topic: String,
}

impl TelemetrySettings {
    /// Pull the relevant values out of the node config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            period: config.sensor.period(),
            scale: config.sensor.scale,
            offset: config.sensor.offset,
            topic: config.status.telemetry_topic.clone(),
        }
    }

    /// Reject a zero period or a scale that cannot divide.
    pub fn validate(&self) -> MeshResult<()> {
        if self.period.is_zero() {
            return Err(MeshError::InvalidSettings(
                "telemetry period must be non-zero".to_string(),
            ));
        }
        if self.scale == 0.0 || !self.scale.is_finite() {
            return Err(MeshError::InvalidSettings(format!(
                "gyro scale {} is not usable",
                self.scale
            )));
        }
        Ok(())
    }

    /// Convert raw counts to calibrated degrees/second.
    pub fn convert(&self, raw: [i16; 3]) -> [f32; 3] {
        let mut out = [0.0; 3];
        for (axis, value) in out.iter_mut().enumerate() {
            *value = f32::from(raw[axis]) / self.scale - self.offset[axis];
        }
        out
    }
}

/// Text form of one calibrated sample.
pub fn format_sample(sample: [f32; 3]) -> String {
    format!("X: {:.2}, Y: {:.2}, Z: {:.2}", sample[0], sample[1], sample[2])
}

/// Periodic sensor publisher.
pub struct TelemetryTask {
    sensor: Arc<dyn MotionSensor>,
    sink: Arc<dyn StatusSink>,
    settings: TelemetrySettings,
}

impl TelemetryTask {
    /// Create a task reading `sensor` and publishing to `sink`.
    pub fn new(
        sensor: Arc<dyn MotionSensor>,
        sink: Arc<dyn StatusSink>,
        settings: TelemetrySettings,
    ) -> MeshResult<Self> {
        settings.validate()?;
        Ok(Self {
            sensor,
            sink,
            settings,
        })
    }

    /// Take and publish one sample, returning the published line.
    pub async fn sample_once(&self) -> MeshResult<String> {
        let raw = self.sensor.read_gyro()?;
        let line = format_sample(self.settings.convert(raw));
        self.sink.publish(&self.settings.topic, &line).await?;
        Ok(line)
    }

    /// Loop until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.settings.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.sample_once().await {
                Ok(line) => debug!(topic = %self.settings.topic, %line, "gyro sample published"),
                Err(err) => warn!(%err, "gyro sample dropped"),
            }
        }
        info!("telemetry task stopped");
    }
}
