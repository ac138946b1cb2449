//! Pose detector contract.
//!
//! The landmark model itself lives outside this workspace; hosts wrap
//! whatever inference runtime they use behind [`PoseDetector`].

use crate::PoseLandmarks;

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

pub type Result<T> = std::result::Result<T, PoseError>;

/// Produces landmarks for the most prominent person in a frame.
pub trait PoseDetector: Send {
    /// Frame representation the detector consumes.
    type Frame;

    fn name(&self) -> &str;

    /// `Ok(None)` when nobody is in view.
    fn detect(&mut self, frame: &Self::Frame, ts_ms: i64) -> Result<Option<PoseLandmarks>>;
}
