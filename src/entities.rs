//! Converts a raw entity-extraction reply into drill-hole entities.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ActualParams, DesignParams, DrillHoleEntity};
use crate::recovery::recover_json;
use crate::util::{lenient_f64, lenient_id};

pub fn entities_from_payload(text: &str) -> Result<Vec<DrillHoleEntity>, CoreError> {
    let objects = match recover_json(text)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(CoreError::MalformedPayload {
                preview: format!("expected entity array or object, found {other}"),
            });
        }
    };

    let mut entities = Vec::with_capacity(objects.len());
    for item in objects {
        let map = match item {
            Value::Object(map) => map,
            other => {
                warn!(item = %other, "skipping non-object entity entry");
                continue;
            }
        };
        match entity_from_map(&map) {
            Some(entity) => {
                warn_on_implausible_parameters(&entity);
                entities.push(entity);
            }
            None => {
                let entry = Value::Object(map);
                warn!(entry = %entry, "skipping entity without hole_id");
            }
        }
    }

    debug!(count = entities.len(), "recovered drill-hole entities");
    Ok(entities)
}

fn entity_from_map(map: &Map<String, Value>) -> Option<DrillHoleEntity> {
    let hole_id = map.get("hole_id").and_then(lenient_id)?;

    let location_desc = map
        .get("location_desc")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    let confidence = map
        .get("confidence")
        .and_then(lenient_f64)
        .unwrap_or(1.0)
        .clamp(0.0, 1.0);

    let design_params = map
        .get("design_params")
        .and_then(Value::as_object)
        .map(|params| DesignParams {
            depth: number_field(params, &["design_depth", "depth"]),
            azimuth: number_field(params, &["design_azimuth", "azimuth"]),
            inclination: number_field(params, &["design_inclination", "inclination"]),
            diameter: number_field(params, &["design_diameter", "diameter"]),
            purpose: text_field(params, &["design_purpose", "purpose"]),
        });

    let actual_params = map
        .get("actual_params")
        .and_then(Value::as_object)
        .map(|params| ActualParams {
            depth: number_field(params, &["actual_depth", "depth"]),
            azimuth: number_field(params, &["actual_azimuth", "azimuth"]),
            inclination: number_field(params, &["actual_inclination", "inclination"]),
            diameter: number_field(params, &["actual_diameter", "diameter"]),
            start_formation: text_field(params, &["start_formation"]),
            end_formation: text_field(params, &["end_formation"]),
            drilling_date: text_field(params, &["drilling_date"]),
        });

    Some(DrillHoleEntity {
        hole_id,
        location_desc,
        location_direction_type: None,
        design_params,
        actual_params,
        confidence,
    })
}

fn number_field(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key).and_then(lenient_f64))
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })
}

fn warn_on_implausible_parameters(entity: &DrillHoleEntity) {
    let sets = [
        (
            "design",
            entity.design_params.as_ref().map(|p| (p.depth, p.azimuth, p.inclination)),
        ),
        (
            "actual",
            entity.actual_params.as_ref().map(|p| (p.depth, p.azimuth, p.inclination)),
        ),
    ];

    for (kind, values) in sets {
        let Some((depth, azimuth, inclination)) = values else {
            continue;
        };
        if depth.is_some_and(|value| !(0.0..=10_000.0).contains(&value)) {
            warn!(hole_id = %entity.hole_id, kind, depth = ?depth, "implausible hole depth");
        }
        if azimuth.is_some_and(|value| !(0.0..360.0).contains(&value)) {
            warn!(hole_id = %entity.hole_id, kind, azimuth = ?azimuth, "implausible hole azimuth");
        }
        if inclination.is_some_and(|value| !(-90.0..=90.0).contains(&value)) {
            warn!(
                hole_id = %entity.hole_id,
                kind,
                inclination = ?inclination,
                "implausible hole inclination"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entities_after_reasoning_text() {
        let reply = r#"I found two holes in the report.
[
  {"hole_id": "ZK1", "location_desc": "XQ15 forward 50m", "confidence": 0.9,
   "design_params": {"design_depth": "120m", "design_azimuth": 45, "design_inclination": "-15°"}},
  {"hole_id": 2, "actual_params": {"actual_depth": 80.5, "start_formation": "coal seam 3"}}
]"#;
        let entities = entities_from_payload(reply).expect("entities should parse");
        assert_eq!(entities.len(), 2);

        let first = &entities[0];
        assert_eq!(first.hole_id, "ZK1");
        assert_eq!(first.location_desc.as_deref(), Some("XQ15 forward 50m"));
        let design = first.design_params.as_ref().expect("design params");
        assert_eq!(design.depth, Some(120.0));
        assert_eq!(design.inclination, Some(-15.0));

        let second = &entities[1];
        assert_eq!(second.hole_id, "2");
        assert_eq!(second.confidence, 1.0);
        let actual = second.actual_params.as_ref().expect("actual params");
        assert_eq!(actual.depth, Some(80.5));
        assert_eq!(actual.start_formation.as_deref(), Some("coal seam 3"));
    }

    #[test]
    fn single_object_payload_yields_one_entity() {
        let entities =
            entities_from_payload(r#"{"hole_id": "ZK9"}"#).expect("object should parse");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].hole_id, "ZK9");
    }

    #[test]
    fn entries_without_hole_id_are_skipped() {
        let entities = entities_from_payload(r#"[{"location_desc": "nowhere"}, {"hole_id": "ZK1"}]"#)
            .expect("payload parses");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].hole_id, "ZK1");
    }

    #[test]
    fn scalar_payload_is_malformed() {
        let error = entities_from_payload("42").expect_err("scalar is not an entity payload");
        assert!(matches!(error, CoreError::MalformedPayload { .. }));
    }
}
