//! Host bridge contracts.
//!
//! Messages crossing the boundary between the analyzer and the embedding
//! host. Both directions are one-way and fire-and-forget: the host sends
//! [`HostCommand`]s, the analyzer publishes [`HostMessage`]s through an
//! [`EventBus`].

mod bus;

pub use bus::{EmittedEvent, EventBus, EventBusRef, InMemoryEventBus, NullEventBus};

use repcoach_exercise::{Exercise, ParseExerciseError, Stage};
use serde::{Deserialize, Serialize};

/// Command sent by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Switch the active exercise and reset the session.
    SetExercise { exercise: Exercise },
}

/// Wire shape of inbound commands before the exercise name is validated.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum RawCommand {
    SetExercise { name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownExercise(#[from] ParseExerciseError),
}

impl HostCommand {
    /// Parse a JSON command such as `{"type":"SET_EXERCISE","name":"squat"}`.
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        match serde_json::from_str::<RawCommand>(raw)? {
            RawCommand::SetExercise { name } => Ok(Self::SetExercise {
                exercise: name.parse()?,
            }),
        }
    }
}

/// Spoken cue for the host's text-to-speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakEvent {
    pub text: String,
}

/// Per-frame telemetry. Never rate limited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsEvent {
    /// Completed reps in the current session.
    pub counter: u32,
    pub stage: Option<Stage>,
    /// Feedback computed this frame, spoken or not.
    pub feedback: String,
    pub exercise: Exercise,
    /// Joint angle in whole degrees (0..=180).
    pub angle: u8,
}

impl StatsEvent {
    /// Floor a measured angle into the wire range.
    pub fn wire_angle(angle: f32) -> u8 {
        if angle.is_finite() {
            angle.clamp(0.0, 180.0).floor() as u8
        } else {
            0
        }
    }
}

/// Message sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    Speak(SpeakEvent),
    Stats(StatsEvent),
}

impl HostMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Speak(_) => event_names::SPEAK,
            Self::Stats(_) => event_names::STATS,
        }
    }

    /// Publish on `bus` under this message's topic.
    pub fn publish(&self, bus: &dyn EventBus) {
        match serde_json::to_value(self) {
            Ok(payload) => bus.emit(self.topic(), payload),
            Err(e) => tracing::warn!(error = %e, topic = self.topic(), "Dropping host message"),
        }
    }
}

/// Event topics. Equal to the `type` tag of the payload.
pub mod event_names {
    /// Spoken cue.
    pub const SPEAK: &str = "SPEAK";
    /// Per-frame telemetry.
    pub const STATS: &str = "STATS";
}
