use crate::directive::{LocationDirective, Placement, Side, Vertical};
use crate::error::CoreError;
use crate::model::{Coordinate, Trajectory};
use crate::survey::{SurveyIndex, SurveyPoint};

const END_CONFIDENCE_FACTOR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&SurveyPoint> for Position {
    fn from(point: &SurveyPoint) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
        }
    }
}

/// Unit vector in the XY plane.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Heading {
    dx: f64,
    dy: f64,
}

impl Heading {
    fn between(from: Position, toward: Position) -> Option<Self> {
        let dx = toward.x - from.x;
        let dy = toward.y - from.y;
        let length = dx.hypot(dy);
        (length > 0.0).then(|| Self {
            dx: dx / length,
            dy: dy / length,
        })
    }
}

/// Start position of every hole in a location group.
///
/// Lateral and unrecognised placements resolve to the reference point itself.
/// Offsets only apply where the placement defines a heading.
pub fn start_position(
    directive: &LocationDirective,
    index: &SurveyIndex,
) -> Result<Position, CoreError> {
    let reference = lookup(index, &directive.reference)?;
    let origin = Position::from(reference);

    let (position, heading) = match &directive.placement {
        Placement::Forward { toward, distance } => {
            advance(origin, reference, lookup(index, toward)?, *distance)?
        }
        Placement::Backward { toward, distance } => {
            advance(origin, reference, lookup(index, toward)?, -*distance)?
        }
        Placement::Between { toward, distance } => {
            interpolate(origin, Position::from(lookup(index, toward)?), *distance)
        }
        Placement::Lateral | Placement::Unknown => (origin, None),
    };

    Ok(match heading {
        Some(heading) => apply_offsets(position, heading, directive),
        None => position,
    })
}

fn lookup<'a>(index: &'a SurveyIndex, id: &str) -> Result<&'a SurveyPoint, CoreError> {
    index
        .lookup(id)
        .ok_or_else(|| CoreError::UnresolvedPoint { id: id.to_string() })
}

fn advance(
    origin: Position,
    reference: &SurveyPoint,
    toward: &SurveyPoint,
    distance: f64,
) -> Result<(Position, Option<Heading>), CoreError> {
    let heading = Heading::between(origin, Position::from(toward)).ok_or_else(|| {
        CoreError::DegenerateHeading {
            from: reference.id.clone(),
            toward: toward.id.clone(),
        }
    })?;

    let position = Position {
        x: origin.x + heading.dx * distance,
        y: origin.y + heading.dy * distance,
        z: origin.z,
    };
    Ok((position, Some(heading)))
}

/// Linear interpolation on all three axes. An explicit distance is a share of
/// the XY separation; without one (or with coincident XY positions) the
/// midpoint is used.
fn interpolate(
    origin: Position,
    toward: Position,
    distance: Option<f64>,
) -> (Position, Option<Heading>) {
    let separation = (toward.x - origin.x).hypot(toward.y - origin.y);
    let ratio = match distance {
        Some(distance) if separation > 0.0 => distance / separation,
        _ => 0.5,
    };

    let position = Position {
        x: origin.x + (toward.x - origin.x) * ratio,
        y: origin.y + (toward.y - origin.y) * ratio,
        z: origin.z + (toward.z - origin.z) * ratio,
    };
    (position, Heading::between(origin, toward))
}

fn apply_offsets(mut position: Position, heading: Heading, directive: &LocationDirective) -> Position {
    if let Some(offset) = directive.lateral_offset {
        // Perpendicular is (-dy, dx); a left offset negates the distance.
        let distance = match offset.side {
            Side::Left => -offset.distance,
            Side::Right => offset.distance,
        };
        position.x += -heading.dy * distance;
        position.y += heading.dx * distance;
    }

    if let Some(offset) = directive.vertical_offset {
        match offset.direction {
            Vertical::Up => position.z += offset.distance,
            Vertical::Down => position.z -= offset.distance,
        }
    }

    position
}

/// Confidence tier and placement kind. A reply without a confidence is
/// tagged low even though its coordinate carries the default confidence.
pub fn method_tag(directive: &LocationDirective) -> String {
    let confidence = if directive.confidence_stated {
        directive.confidence
    } else {
        0.0
    };
    let tier = if confidence > 0.9 {
        "high"
    } else if confidence > 0.7 {
        "medium"
    } else {
        "low"
    };
    format!("{tier}_confidence_{}", directive.direction_type().as_str())
}

/// Straight-line projection of the hole bottom. Azimuth is clockwise from
/// north (+Y); inclination is signed, positive upwards.
pub fn project_end_point(start: &Coordinate, trajectory: Trajectory) -> Coordinate {
    let azimuth = trajectory.azimuth.to_radians();
    let inclination = trajectory.inclination.to_radians();

    let delta_x = trajectory.depth * inclination.cos() * azimuth.sin();
    let delta_y = trajectory.depth * inclination.cos() * azimuth.cos();
    let delta_z = trajectory.depth * inclination.sin();

    Coordinate {
        x: start.x + delta_x,
        y: start.y + delta_y,
        z: start.z + delta_z,
        confidence: start.confidence * END_CONFIDENCE_FACTOR,
        method: format!("{}_calculated", start.method),
    }
}
