use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignParams {
    pub depth: Option<f64>,
    pub azimuth: Option<f64>,
    pub inclination: Option<f64>,
    pub diameter: Option<f64>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualParams {
    pub depth: Option<f64>,
    pub azimuth: Option<f64>,
    pub inclination: Option<f64>,
    pub diameter: Option<f64>,
    pub start_formation: Option<String>,
    pub end_formation: Option<String>,
    pub drilling_date: Option<String>,
}

/// Depth, azimuth and inclination taken from one parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub depth: f64,
    pub azimuth: f64,
    pub inclination: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillHoleEntity {
    pub hole_id: String,
    #[serde(default)]
    pub location_desc: Option<String>,
    /// Direction type resolved for `location_desc` during coordinate inference.
    #[serde(default)]
    pub location_direction_type: Option<String>,
    #[serde(default)]
    pub design_params: Option<DesignParams>,
    #[serde(default)]
    pub actual_params: Option<ActualParams>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl DrillHoleEntity {
    pub fn new(hole_id: impl Into<String>) -> Self {
        Self {
            hole_id: hole_id.into(),
            location_desc: None,
            location_direction_type: None,
            design_params: None,
            actual_params: None,
            confidence: default_confidence(),
        }
    }

    /// Trimmed, non-empty location description.
    pub fn location_key(&self) -> Option<&str> {
        self.location_desc
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Trajectory for end-point projection. Actual parameters win over design
    /// parameters whenever they are present, even if incomplete.
    pub fn trajectory(&self) -> Option<Trajectory> {
        if let Some(actual) = &self.actual_params {
            return Some(Trajectory {
                depth: actual.depth?,
                azimuth: actual.azimuth?,
                inclination: actual.inclination?,
            });
        }

        let design = self.design_params.as_ref()?;
        Some(Trajectory {
            depth: design.depth?,
            azimuth: design.azimuth?,
            inclination: design.inclination?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub confidence: f64,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleCoordinates {
    pub start: Coordinate,
    #[serde(default)]
    pub end: Option<Coordinate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationTimingStats {
    pub location_processing_times: Vec<f64>,
    pub unique_location_descriptions_count: usize,
    pub total_location_processing_time: f64,
    pub avg_location_processing_time: f64,
}

impl LocationTimingStats {
    pub fn from_durations(durations: Vec<f64>, unique_location_descriptions_count: usize) -> Self {
        let total = durations.iter().sum::<f64>();
        let avg = if durations.is_empty() {
            0.0
        } else {
            total / durations.len() as f64
        };
        Self {
            location_processing_times: durations,
            unique_location_descriptions_count,
            total_location_processing_time: total,
            avg_location_processing_time: avg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
}

/// Everything one document pass produced, as handed to metrics scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub run_id: String,
    pub generated_at: String,
    pub model_name: String,
    pub document_name: String,
    #[serde(default)]
    pub repetition_round: Option<u32>,
    pub entities: Vec<DrillHoleEntity>,
    pub coordinates: BTreeMap<String, HoleCoordinates>,
    pub processing_time: f64,
    #[serde(default)]
    pub entity_extraction_time: f64,
    #[serde(default)]
    pub document_token_length: Option<usize>,
    #[serde(default)]
    pub location_timing: LocationTimingStats,
    #[serde(default)]
    pub survey_sha256: Option<String>,
    #[serde(default)]
    pub errors: Vec<RunError>,
}

impl ProcessResult {
    pub fn entities_with_location(&self) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.location_desc.as_deref().is_some_and(|value| !value.is_empty()))
            .count()
    }

    pub fn success_rate(&self) -> f64 {
        if self.entities.is_empty() {
            return 0.0;
        }
        let with_coordinates = self
            .entities
            .iter()
            .filter(|entity| self.coordinates.contains_key(&entity.hole_id))
            .count();
        with_coordinates as f64 / self.entities.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_prefers_actual_params_even_when_incomplete() {
        let mut entity = DrillHoleEntity::new("ZK1");
        entity.design_params = Some(DesignParams {
            depth: Some(100.0),
            azimuth: Some(90.0),
            inclination: Some(-10.0),
            ..DesignParams::default()
        });
        assert_eq!(
            entity.trajectory(),
            Some(Trajectory {
                depth: 100.0,
                azimuth: 90.0,
                inclination: -10.0
            })
        );

        entity.actual_params = Some(ActualParams {
            depth: Some(95.0),
            ..ActualParams::default()
        });
        assert_eq!(entity.trajectory(), None);
    }

    #[test]
    fn location_key_ignores_blank_descriptions() {
        let mut entity = DrillHoleEntity::new("ZK1");
        entity.location_desc = Some("   ".to_string());
        assert_eq!(entity.location_key(), None);

        entity.location_desc = Some("  XQ15 forward 20m ".to_string());
        assert_eq!(entity.location_key(), Some("XQ15 forward 20m"));
    }

    #[test]
    fn timing_stats_average_over_recorded_durations() {
        let stats = LocationTimingStats::from_durations(vec![1.0, 2.0, 3.0], 3);
        assert_eq!(stats.total_location_processing_time, 6.0);
        assert_eq!(stats.avg_location_processing_time, 2.0);

        let empty = LocationTimingStats::from_durations(Vec::new(), 0);
        assert_eq!(empty.avg_location_processing_time, 0.0);
    }
}
