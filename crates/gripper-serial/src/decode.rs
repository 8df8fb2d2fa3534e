use crate::DecodeError;
use serde_json::Value;

/// Top-level key the angle sensor reports under.
pub const SENSOR_KEY: &str = "AS5047";

/// Degrees-to-radians factor used by the sensor tooling since the first
/// firmware. It is 0.01745, not pi/180 (0.0174533); readings derived from
/// `angle` are off by roughly 0.002% as a result. Kept so values line up
/// with existing bench logs.
pub const LEGACY_DEG_TO_RAD: f64 = 0.01745;

/// Angle and distance carried by one sensor record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub angle: f64,
    pub distance: f64,
}

/// Decode one extracted record.
///
/// `Ok(None)` for well-formed records that carry no usable sample: other
/// devices' keys, or a sensor fault report.
pub fn decode_record(text: &str) -> Result<Option<Sample>, DecodeError> {
    let root: Value = serde_json::from_str(text)?;
    let Some(sensor) = root.get(SENSOR_KEY) else {
        return Ok(None);
    };
    let fields = sensor
        .as_object()
        .ok_or(DecodeError::Shape("sensor entry is not an object"))?;
    if fields.contains_key("error") {
        return Ok(None);
    }

    let angle = match fields.get("rad") {
        Some(rad) => number(rad, "rad")?,
        None => match fields.get("angle") {
            Some(deg) => number(deg, "angle")? * LEGACY_DEG_TO_RAD,
            None => 0.0,
        },
    };
    let distance = match fields.get("distance") {
        Some(d) => number(d, "distance")?,
        None => 0.0,
    };
    Ok(Some(Sample { angle, distance }))
}

fn number(v: &Value, field: &'static str) -> Result<f64, DecodeError> {
    v.as_f64().ok_or(DecodeError::Shape(field))
}
