//! Decides whether one drawn stroke is the stroke the character expects next.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    character::ReferenceCharacter,
    geometry::{self, Point},
};

/// Points both paths are resampled to before comparing.
const SAMPLE_POINTS: usize = 32;
/// Coarser sampling for the direction check, so hand jitter does not dominate.
const DIRECTION_SAMPLES: usize = 8;
/// Deviation always tolerated, in logical units, before scaling by leniency.
const BASE_TOLERANCE: f64 = 40.0;
/// Extra tolerance per logical unit of reference stroke length.
const LENGTH_TOLERANCE: f64 = 0.2;
const MIN_DIRECTION_SIMILARITY: f64 = 0.5;

/// Named tolerance settings offered to the user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Leniency {
    Strict,
    #[default]
    Normal,
    Loose,
}

impl Leniency {
    pub fn factor(self) -> f64 {
        match self {
            Leniency::Strict => 0.8,
            Leniency::Normal => 1.0,
            Leniency::Loose => 1.5,
        }
    }
}

/// A stroke captured between pointer-down and pointer-up, in logical space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStroke {
    pub points: Vec<Point>,
}

impl UserStroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn push(&mut self, p: Point) {
        if self.points.last() != Some(&p) {
            self.points.push(p);
        }
    }

    /// Fewer than two distinct points: an accidental tap, not an attempt.
    pub fn is_tap(&self) -> bool {
        self.points.len() < 2 || geometry::path_length(&self.points) == 0.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Rejection {
    Tap,
    /// Every stroke has already been matched; not the user's mistake.
    AlreadyComplete,
    Mismatch { deviation: f64, similarity: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeMatchResult {
    pub accepted: bool,
    pub matched_stroke_index: usize,
    pub rejection: Option<Rejection>,
}

impl StrokeMatchResult {
    fn accept(index: usize) -> Self {
        Self {
            accepted: true,
            matched_stroke_index: index,
            rejection: None,
        }
    }

    fn reject(index: usize, why: Rejection) -> Self {
        Self {
            accepted: false,
            matched_stroke_index: index,
            rejection: Some(why),
        }
    }

    /// Only real mismatches count against the user.
    pub fn is_mistake(&self) -> bool {
        matches!(self.rejection, Some(Rejection::Mismatch { .. }))
    }
}

/// Largest average deviation accepted for a reference stroke of `length`.
pub fn deviation_limit(length: f64, leniency: f64) -> f64 {
    leniency * (BASE_TOLERANCE + LENGTH_TOLERANCE * length)
}

/// Compares `stroke` against the reference stroke at `expected` and nothing else,
/// so strokes can only ever be matched in order.
pub fn match_stroke(
    stroke: &UserStroke,
    reference: &ReferenceCharacter,
    expected: usize,
    leniency: f64,
) -> StrokeMatchResult {
    let Some(target) = reference.strokes.get(expected) else {
        return StrokeMatchResult::reject(expected, Rejection::AlreadyComplete);
    };
    if stroke.is_tap() {
        return StrokeMatchResult::reject(expected, Rejection::Tap);
    }

    let user = geometry::resample(&stroke.points, SAMPLE_POINTS);
    let wanted = geometry::resample(target, SAMPLE_POINTS);
    let deviation = geometry::average_deviation(&user, &wanted);
    let similarity = geometry::direction_similarity(
        &geometry::resample(&stroke.points, DIRECTION_SAMPLES),
        &geometry::resample(target, DIRECTION_SAMPLES),
    );
    let limit = deviation_limit(geometry::path_length(target), leniency);

    log::debug!(
        "stroke {expected} of {:?}: deviation {deviation:.1}/{limit:.1}, direction {similarity:.2}",
        reference.character
    );
    if deviation <= limit && similarity >= MIN_DIRECTION_SIMILARITY {
        StrokeMatchResult::accept(expected)
    } else {
        StrokeMatchResult::reject(
            expected,
            Rejection::Mismatch {
                deviation,
                similarity,
            },
        )
    }
}
