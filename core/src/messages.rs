//! Simulator message format.
//!
//! The driving simulator talks in text frames of the form `42[<event>, <payload>]`: the `42` prefix marks an
//! event frame and the rest is a JSON array holding the event name and its payload object. The simulator
//! encodes every number in a telemetry payload as a string and every observation list as a space separated
//! string. This module decodes telemetry into typed filter inputs and encodes the best-particle reply. Only
//! the message format lives here; the transport that carries the frames does not.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{parse_array, parse_scalar};
use crate::error::{FilterError, Result};
use crate::observation::Observation;
use crate::particle::Particle;
use crate::{ControlInput, Pose};

/// Prefix of every event frame
pub const EVENT_PREFIX: &str = "42";
/// Reply sent when a frame carries no data, handing control back to manual driving
pub const MANUAL_FRAME: &str = "42[\"manual\",{}]";
pub const TELEMETRY_EVENT: &str = "telemetry";
pub const BEST_PARTICLE_EVENT: &str = "best_particle";

/// Return the JSON array text of an event frame.
///
/// `None` when the frame holds a `null` payload or no bracketed array at all.
pub fn extract_payload(frame: &str) -> Option<&str> {
    if frame.contains("null") {
        return None;
    }
    let start = frame.find('[')?;
    let end = frame.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&frame[start..=end])
}

/// Telemetry payload sent by the simulator once per step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Noisy GPS-like position x, used only to initialize the filter
    pub sense_x: String,
    pub sense_y: String,
    pub sense_theta: String,
    /// Control applied since the previous step
    #[serde(default)]
    pub previous_velocity: Option<String>,
    #[serde(default)]
    pub previous_yawrate: Option<String>,
    /// Space separated vehicle-frame observation x coordinates
    #[serde(default)]
    pub sense_observations_x: String,
    #[serde(default)]
    pub sense_observations_y: String,
}
impl TelemetryMessage {
    pub fn gps(&self) -> Result<Pose> {
        Ok(Pose::new(
            parse_field(&self.sense_x, "sense_x")?,
            parse_field(&self.sense_y, "sense_y")?,
            parse_field(&self.sense_theta, "sense_theta")?,
        ))
    }
    /// Previous control, zero when the simulator did not send one.
    pub fn control(&self) -> Result<ControlInput> {
        let velocity = match &self.previous_velocity {
            Some(v) => parse_field(v, "previous_velocity")?,
            None => 0.0,
        };
        let yaw_rate = match &self.previous_yawrate {
            Some(v) => parse_field(v, "previous_yawrate")?,
            None => 0.0,
        };
        Ok(ControlInput::new(velocity, yaw_rate))
    }
    pub fn observations(&self) -> Result<Vec<Observation>> {
        let xs = parse_array(&self.sense_observations_x)
            .map_err(|e| FilterError::Message(format!("sense_observations_x: {}", e)))?;
        let ys = parse_array(&self.sense_observations_y)
            .map_err(|e| FilterError::Message(format!("sense_observations_y: {}", e)))?;
        Observation::from_components(&xs, &ys)
    }
}

fn parse_field(value: &str, name: &str) -> Result<f64> {
    parse_scalar(value).map_err(|e| FilterError::Message(format!("{}: {}", name, e)))
}

/// Decode an event frame into its event name and payload.
///
/// `Ok(None)` for frames that are not event frames or carry no data.
pub fn decode_event(frame: &str) -> Result<Option<(String, Value)>> {
    if !frame.starts_with(EVENT_PREFIX) {
        return Ok(None);
    }
    let Some(payload) = extract_payload(frame) else {
        return Ok(None);
    };
    let array: Vec<Value> = serde_json::from_str(payload)?;
    let mut items = array.into_iter();
    let event = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(FilterError::Message("event name missing".to_string())),
    };
    Ok(Some((event, items.next().unwrap_or(Value::Null))))
}

/// Decode a telemetry frame, `Ok(None)` for any other kind of frame.
pub fn decode_telemetry(frame: &str) -> Result<Option<TelemetryMessage>> {
    match decode_event(frame)? {
        Some((event, payload)) if event == TELEMETRY_EVENT => {
            Ok(Some(serde_json::from_value(payload)?))
        }
        _ => Ok(None),
    }
}

/// Reply carrying the best particle and its debug annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BestParticleMessage {
    pub best_particle_x: f64,
    pub best_particle_y: f64,
    pub best_particle_theta: f64,
    pub best_particle_associations: String,
    pub best_particle_sense_x: String,
    pub best_particle_sense_y: String,
}
impl From<&Particle> for BestParticleMessage {
    fn from(particle: &Particle) -> Self {
        BestParticleMessage {
            best_particle_x: particle.x,
            best_particle_y: particle.y,
            best_particle_theta: particle.theta,
            best_particle_associations: particle.associations_text(),
            best_particle_sense_x: particle.sense_x_text(),
            best_particle_sense_y: particle.sense_y_text(),
        }
    }
}
impl BestParticleMessage {
    /// Encode as a `42["best_particle",{...}]` frame.
    pub fn to_frame(&self) -> Result<String> {
        let body = serde_json::to_string(self)?;
        Ok(format!("{}[\"{}\",{}]", EVENT_PREFIX, BEST_PARTICLE_EVENT, body))
    }
}
