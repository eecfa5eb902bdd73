use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::util::{lenient_f64, lenient_id};

const DEFAULT_CONFIDENCE: f64 = 0.8;

const REFERENCE_KEYS: [&str; 2] = ["reference_point", "参考点号"];
const DIRECTION_TYPE_KEYS: [&str; 2] = ["direction_type", "方向类型"];
const DISTANCE_KEYS: [&str; 2] = ["distance", "距离"];
const TOWARD_KEYS: [&str; 2] = ["direction_reference_point", "方向参考点号"];
const LATERAL_KEYS: [&str; 2] = ["lateral_offset", "侧向偏移"];
const VERTICAL_KEYS: [&str; 2] = ["vertical_offset", "垂直偏移"];
const OFFSET_DIRECTION_KEYS: [&str; 2] = ["direction", "方向"];
const CONFIDENCE_KEYS: [&str; 2] = ["confidence", "置信度"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionType {
    Forward,
    Backward,
    Between,
    Lateral,
    Unknown,
}

impl DirectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Between => "between",
            Self::Lateral => "lateral",
            Self::Unknown => "unknown",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "forward" => Self::Forward,
            "backward" => Self::Backward,
            "between" => Self::Between,
            "lateral" => Self::Lateral,
            _ => Self::Unknown,
        }
    }
}

/// Geometric relation to the reference point, with the fields each relation
/// needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Forward { toward: String, distance: f64 },
    Backward { toward: String, distance: f64 },
    /// `distance` is measured from the reference point along the XY segment;
    /// `None` means the midpoint.
    Between {
        toward: String,
        distance: Option<f64>,
    },
    Lateral,
    Unknown,
}

impl Placement {
    pub fn direction_type(&self) -> DirectionType {
        match self {
            Self::Forward { .. } => DirectionType::Forward,
            Self::Backward { .. } => DirectionType::Backward,
            Self::Between { .. } => DirectionType::Between,
            Self::Lateral => DirectionType::Lateral,
            Self::Unknown => DirectionType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LateralOffset {
    pub side: Side,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertical {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalOffset {
    pub direction: Vertical,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationDirective {
    pub reference: String,
    pub placement: Placement,
    pub lateral_offset: Option<LateralOffset>,
    pub vertical_offset: Option<VerticalOffset>,
    pub confidence: f64,
    /// False when the reply carried no confidence and `confidence` is the
    /// default.
    pub confidence_stated: bool,
}

impl LocationDirective {
    pub fn direction_type(&self) -> DirectionType {
        self.placement.direction_type()
    }

    /// Validates a model payload into a directive. Keys may be English or the
    /// Chinese names used by earlier prompts.
    pub fn from_payload(map: &Map<String, Value>) -> Result<Self, CoreError> {
        let reference = field(map, &REFERENCE_KEYS)
            .and_then(lenient_id)
            .ok_or_else(|| invalid("missing reference point"))?;

        let direction_type = field(map, &DIRECTION_TYPE_KEYS)
            .and_then(Value::as_str)
            .map(DirectionType::parse)
            .unwrap_or(DirectionType::Unknown);
        let distance = field(map, &DISTANCE_KEYS).and_then(lenient_f64);
        let toward = field(map, &TOWARD_KEYS).and_then(lenient_id);

        let require_toward = |toward: Option<String>| {
            toward.ok_or_else(|| {
                invalid(&format!(
                    "{} directive needs a direction reference point",
                    direction_type.as_str()
                ))
            })
        };

        let placement = match direction_type {
            DirectionType::Forward => Placement::Forward {
                toward: require_toward(toward)?,
                distance: distance.unwrap_or(0.0),
            },
            DirectionType::Backward => Placement::Backward {
                toward: require_toward(toward)?,
                distance: distance.unwrap_or(0.0),
            },
            DirectionType::Between => Placement::Between {
                toward: require_toward(toward)?,
                distance: distance.filter(|value| *value != 0.0),
            },
            DirectionType::Lateral => Placement::Lateral,
            DirectionType::Unknown => Placement::Unknown,
        };

        let stated = field(map, &CONFIDENCE_KEYS).and_then(lenient_f64);
        let confidence = stated.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);

        Ok(Self {
            reference,
            placement,
            lateral_offset: offset(map, &LATERAL_KEYS).and_then(|(direction, distance)| {
                let side = match direction.as_str() {
                    "left" | "左" => Side::Left,
                    "right" | "右" => Side::Right,
                    _ => return None,
                };
                Some(LateralOffset { side, distance })
            }),
            vertical_offset: offset(map, &VERTICAL_KEYS).and_then(|(direction, distance)| {
                let direction = match direction.as_str() {
                    "up" | "上" => Vertical::Up,
                    "down" | "下" => Vertical::Down,
                    _ => return None,
                };
                Some(VerticalOffset {
                    direction,
                    distance,
                })
            }),
            confidence,
            confidence_stated: stated.is_some(),
        })
    }
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| map.get(*key))
        .filter(|value| !value.is_null())
}

/// Offset direction label and non-zero distance, if both are present.
fn offset(map: &Map<String, Value>, keys: &[&str]) -> Option<(String, f64)> {
    let offset = field(map, keys)?.as_object()?;
    let direction = field(offset, &OFFSET_DIRECTION_KEYS)?
        .as_str()?
        .trim()
        .to_ascii_lowercase();
    let distance = field(offset, &DISTANCE_KEYS)
        .and_then(lenient_f64)
        .filter(|value| *value != 0.0)?;
    if direction.is_empty() {
        return None;
    }
    Some((direction, distance))
}

fn invalid(reason: &str) -> CoreError {
    CoreError::InvalidDirective {
        reason: reason.to_string(),
    }
}
