use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::geometry::{method_tag, project_end_point, start_position};
use crate::directive::{DirectiveModel, DirectiveResolver};
use crate::model::{Coordinate, DrillHoleEntity, HoleCoordinates, LocationTimingStats};
use crate::survey::SurveyIndex;

#[derive(Debug, Clone, Default)]
pub struct InferenceOutcome {
    pub coordinates: BTreeMap<String, HoleCoordinates>,
    pub timing: LocationTimingStats,
}

pub struct CoordinateEngine<'a, M> {
    survey: &'a SurveyIndex,
    resolver: DirectiveResolver<M>,
}

impl<'a, M: DirectiveModel> CoordinateEngine<'a, M> {
    pub fn new(survey: &'a SurveyIndex, resolver: DirectiveResolver<M>) -> Self {
        Self { survey, resolver }
    }

    pub fn resolver(&self) -> &DirectiveResolver<M> {
        &self.resolver
    }

    /// Places every entity that carries a location description.
    ///
    /// Entities sharing a description share one directive and one start
    /// position. A group that cannot be placed is logged and skipped; the
    /// remaining groups are still returned. Placed entities are annotated with
    /// the resolved direction type.
    pub fn infer(&mut self, entities: &mut [DrillHoleEntity]) -> InferenceOutcome {
        if self.survey.is_empty() {
            warn!("survey index is empty; skipping coordinate inference");
            return InferenceOutcome::default();
        }

        let groups = group_by_location(entities);
        info!(
            entities = entities.len(),
            unique_locations = groups.len(),
            "inferring drill-hole coordinates"
        );

        let mut durations = Vec::with_capacity(groups.len());
        let mut coordinates = BTreeMap::new();

        for (description, members) in &groups {
            let started = Instant::now();
            let directive = self.resolver.resolve(description);
            durations.push(started.elapsed().as_secs_f64());

            let Some(directive) = directive else {
                warn!(description = %description, holes = members.len(), "no directive; skipping location group");
                continue;
            };

            let position = match start_position(&directive, self.survey) {
                Ok(position) => position,
                Err(err) => {
                    warn!(
                        description = %description,
                        holes = members.len(),
                        error = %err,
                        "cannot place location group"
                    );
                    continue;
                }
            };
            let start = Coordinate {
                x: position.x,
                y: position.y,
                z: position.z,
                confidence: directive.confidence,
                method: method_tag(&directive),
            };
            debug!(description = %description, method = %start.method, "placed location group");

            for &member in members {
                let entity = &mut entities[member];
                entity.location_direction_type = Some(directive.direction_type().as_str().to_string());

                let end = entity
                    .trajectory()
                    .map(|trajectory| project_end_point(&start, trajectory));

                match coordinates.entry(entity.hole_id.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(HoleCoordinates {
                            start: start.clone(),
                            end,
                        });
                    }
                    Entry::Occupied(_) => {
                        warn!(hole_id = %entity.hole_id, "duplicate hole id; keeping first coordinates");
                    }
                }
            }
        }

        info!(placed = coordinates.len(), "coordinate inference finished");
        InferenceOutcome {
            coordinates,
            timing: LocationTimingStats::from_durations(durations, groups.len()),
        }
    }
}

/// Entity indices grouped by trimmed description, in order of first
/// appearance.
fn group_by_location(entities: &[DrillHoleEntity]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (index, entity) in entities.iter().enumerate() {
        let Some(key) = entity.location_key() else {
            continue;
        };
        match positions.get(key) {
            Some(&group) => groups[group].1.push(index),
            None => {
                positions.insert(key, groups.len());
                groups.push((key.to_string(), vec![index]));
            }
        }
    }

    groups
}
