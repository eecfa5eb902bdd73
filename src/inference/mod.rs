//! Places drill holes in survey space from their location descriptions and
//! projects their end points from depth, azimuth and inclination.

mod engine;
mod geometry;

pub use engine::CoordinateEngine;
