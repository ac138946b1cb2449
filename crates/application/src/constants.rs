/// Minimum gap between non-priority spoken cues.
pub const FEEDBACK_COOLDOWN_MS: u64 = 2500;

/// Default frame loop tick period (~30 fps).
pub const FRAME_INTERVAL_MS: u64 = 33;

/// Config file name under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Application directory name under the platform config directory.
pub const APP_DIR_NAME: &str = "repcoach";
