//! One analyzer session: rule dispatch, feedback and host commands.

use repcoach_events::{EventBusRef, HostCommand};
use repcoach_exercise::{Exercise, Observation, RuleBook, SessionState};
use repcoach_pose::PoseLandmarks;
use uuid::Uuid;

use crate::clock::ClockRef;
use crate::config::AnalyzerConfig;
use crate::dispatcher::FeedbackDispatcher;

/// Turns landmark snapshots into host messages.
///
/// Owns the session state; every mutation happens through
/// [`Analyzer::process_landmarks`] or an exercise switch, one at a time.
pub struct Analyzer {
    state: SessionState,
    rules: RuleBook,
    dispatcher: FeedbackDispatcher,
    /// Log correlation id, regenerated on every exercise switch.
    session_id: Uuid,
}

impl Analyzer {
    pub fn new(config: &AnalyzerConfig, bus: EventBusRef, clock: ClockRef) -> Self {
        let session_id = Uuid::new_v4();
        tracing::info!(
            %session_id,
            exercise = %config.initial_exercise,
            side = %config.side,
            "Analyzer session started"
        );
        Self {
            state: SessionState::new(config.initial_exercise, config.side),
            rules: RuleBook::with_settings(&config.rules),
            dispatcher: FeedbackDispatcher::new(config.cooldown_ms, bus, clock),
            session_id,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Run the active rule module over one frame and publish the results.
    ///
    /// Cues go through the cooldown in the order the rule produced them;
    /// telemetry is published exactly once.
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(session_id = %self.session_id, exercise = %self.state.active_exercise)
    )]
    pub fn process_landmarks(&mut self, landmarks: &PoseLandmarks) -> Observation {
        let observation = self.rules.evaluate(landmarks, &mut self.state);
        for cue in &observation.cues {
            self.dispatcher
                .speak(&mut self.state, &cue.text, cue.priority);
        }
        self.dispatcher.publish_stats(&self.state, &observation);
        observation
    }

    /// Select `exercise` and start a fresh session. The cooldown carries over.
    pub fn switch_exercise(&mut self, exercise: Exercise) {
        if !self.rules.supports(exercise) {
            tracing::warn!(%exercise, "Ignoring switch to exercise without rules");
            return;
        }
        let previous = self.state.active_exercise;
        self.state.switch_exercise(exercise);
        self.session_id = Uuid::new_v4();
        tracing::info!(
            session_id = %self.session_id,
            from = %previous,
            to = %exercise,
            "Exercise switched"
        );
        self.dispatcher
            .speak(&mut self.state, &format!("Switched to {exercise}"), true);
    }

    pub fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::SetExercise { exercise } => self.switch_exercise(exercise),
        }
    }

    /// Apply a raw JSON command. Malformed or unknown commands are ignored.
    pub fn handle_raw_command(&mut self, raw: &str) -> bool {
        match HostCommand::parse(raw) {
            Ok(command) => {
                self.handle_command(command);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring host command");
                false
            }
        }
    }
}
