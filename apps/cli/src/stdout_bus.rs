//! Host bridge over stdout: one JSON message per line.

use std::io::Write;

use repcoach_events::EventBus;

pub struct StdoutEventBus;

impl EventBus for StdoutEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        let mut out = std::io::stdout().lock();
        let written = serde_json::to_writer(&mut out, &payload)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out));
        if let Err(e) = written {
            tracing::warn!(topic, error = %e, "Failed to write host message");
        }
    }
}
