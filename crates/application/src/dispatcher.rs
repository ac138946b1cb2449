//! Feedback dispatch: cooldown-gated speech, unthrottled telemetry.

use repcoach_events::{EventBusRef, HostMessage, SpeakEvent, StatsEvent};
use repcoach_exercise::{Observation, SessionState};

use crate::clock::ClockRef;

/// Decides which cues reach the host's speech channel.
///
/// At most one non-priority cue per cooldown window. Cues that lose are
/// dropped, never queued.
pub struct FeedbackDispatcher {
    cooldown_ms: i64,
    bus: EventBusRef,
    clock: ClockRef,
}

impl FeedbackDispatcher {
    pub fn new(cooldown_ms: u64, bus: EventBusRef, clock: ClockRef) -> Self {
        Self {
            cooldown_ms: i64::try_from(cooldown_ms).unwrap_or(i64::MAX),
            bus,
            clock,
        }
    }

    /// Offer a cue for speech. Returns whether it was forwarded.
    pub fn speak(&self, state: &mut SessionState, text: &str, priority: bool) -> bool {
        let now = self.clock.now_ms();
        let cooled_down = state
            .last_feedback_at_ms
            .map_or(true, |last| now.saturating_sub(last) > self.cooldown_ms);

        if !priority && !cooled_down {
            tracing::trace!(text, "Cue dropped during cooldown");
            return false;
        }

        state.last_feedback_at_ms = Some(now);
        tracing::debug!(text, priority, "Speaking");
        HostMessage::Speak(SpeakEvent {
            text: text.to_string(),
        })
        .publish(self.bus.as_ref());
        true
    }

    /// Forward this frame's telemetry.
    pub fn publish_stats(&self, state: &SessionState, observation: &Observation) {
        HostMessage::Stats(StatsEvent {
            counter: state.rep_count,
            stage: state.stage,
            feedback: observation.feedback.clone(),
            exercise: state.active_exercise,
            angle: StatsEvent::wire_angle(observation.angle),
        })
        .publish(self.bus.as_ref());
    }
}
