//! Motion sensor producer
//!
//! Raw samples arrive in device axes and are remapped into the controller
//! frame before they land in the sensor snapshot. Registering the sensors is
//! left to whoever drives the session lifecycle through [`LifecycleObserver`].

use super::state::ControllerState;
use crate::config::InputConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Standard gravity in m/s²
pub const GRAVITY_EARTH: f32 = 9.806_65;

/// Sampling period requested for every motion sensor
pub const SAMPLING_PERIOD: Duration = Duration::from_micros(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    RotationVector,
}

/// One reading from a motion sensor, in device axes
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSample {
    /// m/s² along x, y, z
    Accelerometer([f32; 3]),
    /// rad/s around x, y, z
    Gyroscope([f32; 3]),
    /// x·sin(θ/2), y·sin(θ/2), z·sin(θ/2) and optionally cos(θ/2)
    RotationVector(Vec<f32>),
}

impl SensorSample {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorSample::Accelerometer(_) => SensorKind::Accelerometer,
            SensorSample::Gyroscope(_) => SensorKind::Gyroscope,
            SensorSample::RotationVector(_) => SensorKind::RotationVector,
        }
    }

    /// Stores the sample in `state`. Returns `false` for malformed samples,
    /// which leave `state` untouched.
    pub fn apply_to(&self, state: &mut ControllerState) -> bool {
        match self {
            SensorSample::Accelerometer(v) => {
                state.accel_x = v[1] / GRAVITY_EARTH;
                state.accel_y = v[2] / GRAVITY_EARTH;
                state.accel_z = v[0] / GRAVITY_EARTH;
            }
            SensorSample::Gyroscope(v) => {
                state.gyro_x = v[1];
                state.gyro_y = v[2];
                state.gyro_z = v[0];
            }
            SensorSample::RotationVector(v) => {
                let Some(q) = quaternion_from_vector(v) else {
                    warn!("Rotation vector with {} components ignored", v.len());
                    return false;
                };
                state.orient_x = q[2];
                state.orient_y = q[3];
                state.orient_z = q[1];
                state.orient_w = q[0];
            }
        }
        true
    }
}

/// Converts a rotation vector into a `[w, x, y, z]` quaternion. The scalar
/// part is reconstructed when the vector only carries three components.
pub fn quaternion_from_vector(v: &[f32]) -> Option<[f32; 4]> {
    if v.len() < 3 {
        return None;
    }
    let (x, y, z) = (v[0], v[1], v[2]);
    let w = match v.get(3) {
        Some(w) => *w,
        None => (1.0 - x * x - y * y - z * z).max(0.0).sqrt(),
    };
    Some([w, x, y, z])
}

/// Receives motion sensor samples
pub trait SensorListener {
    fn on_sensor_sample(&mut self, sample: SensorSample);
}

/// Hooks a component into the start/stop lifecycle of the stream
pub trait LifecycleObserver {
    fn on_lifecycle_start(&mut self);
    fn on_lifecycle_stop(&mut self);
}

/// Platform motion sensors
pub trait SensorSource {
    /// Whether the device has this sensor at all
    fn has_sensor(&self, kind: SensorKind) -> bool;

    fn register(&mut self, kind: SensorKind, sampling_period: Duration);

    /// Unregisters every sensor registered before
    fn unregister_all(&mut self);
}

/// Registers the motion sensors while the stream is in the foreground
#[derive(Debug)]
pub struct MotionSensorObserver<S: SensorSource> {
    source: S,
    registered: bool,
}

impl<S: SensorSource> MotionSensorObserver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            registered: false,
        }
    }

    /// Returns `None` when motion forwarding is switched off
    pub fn from_config(config: &InputConfig, source: S) -> Option<Self> {
        if !config.motion_enabled {
            info!("Motion sensors disabled in config");
            return None;
        }
        Some(Self::new(source))
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: SensorSource> LifecycleObserver for MotionSensorObserver<S> {
    fn on_lifecycle_start(&mut self) {
        let kinds = [
            SensorKind::Accelerometer,
            SensorKind::Gyroscope,
            SensorKind::RotationVector,
        ];
        for kind in kinds {
            if self.source.has_sensor(kind) {
                debug!("Registering {:?} at {:?}", kind, SAMPLING_PERIOD);
                self.source.register(kind, SAMPLING_PERIOD);
            } else {
                info!("No {:?} available, skipping", kind);
            }
        }
        self.registered = true;
    }

    fn on_lifecycle_stop(&mut self) {
        if self.registered {
            debug!("Unregistering motion sensors");
            self.source.unregister_all();
            self.registered = false;
        }
    }
}
