//! Exercise rule modules and the session state they advance.
//!
//! Each supported exercise measures one joint angle per frame, gates rep
//! counting behind a start posture, debounces form defects, and counts reps
//! by walking a two-stage cycle. The shared state machine lives in
//! [`rules::evaluate`]; the per-exercise modules only measure.

mod exercise;
pub mod rules;
mod settings;
mod state;

pub use exercise::{Exercise, ParseExerciseError};
pub use rules::{Cue, ExerciseRule, Observation, RuleBook, RuleContext};
pub use settings::{CurlSettings, ExerciseSettings, LiftSettings, SquatSettings};
pub use state::{DefectCounters, DefectKind, SessionState, Stage};
