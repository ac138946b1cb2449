//! Low-latency frame bus between a camera (or replay) and the frame loop.
//!
//! The producer never blocks: when the consumer falls behind, the newest
//! frame is dropped at the sender and the consumer can skip to the most
//! recent frame with [`FrameBusReceiver::drain_to_latest`].

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default bus capacity in frames (~0.5 s at 30 fps).
pub const DEFAULT_CAPACITY_FRAMES: usize = 16;

/// Minimum channel capacity.
const MIN_CAPACITY_FRAMES: usize = 2;

/// A captured frame with timestamp and sequence number for ordering.
#[derive(Debug)]
pub struct Frame<T> {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Capture timestamp in milliseconds.
    pub ts_ms: i64,
    /// Frame payload (shared ownership, never copied by the bus).
    pub data: Arc<T>,
}

impl<T> Clone for Frame<T> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            ts_ms: self.ts_ms,
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> Frame<T> {
    pub fn new(seq: u64, ts_ms: i64, data: impl Into<Arc<T>>) -> Self {
        Self {
            seq,
            ts_ms,
            data: data.into(),
        }
    }
}

/// Configuration for the frame bus.
#[derive(Debug, Clone)]
pub struct FrameBusConfig {
    /// Channel capacity in frames.
    pub capacity_frames: usize,
}

impl Default for FrameBusConfig {
    fn default() -> Self {
        Self {
            capacity_frames: DEFAULT_CAPACITY_FRAMES,
        }
    }
}

impl FrameBusConfig {
    fn channel_capacity(&self) -> usize {
        self.capacity_frames.max(MIN_CAPACITY_FRAMES)
    }
}

/// Sender half of the frame bus.
pub struct FrameBusSender<T> {
    tx: mpsc::Sender<Frame<T>>,
    seq_counter: Arc<AtomicU64>,
    dropped_frames: Arc<AtomicU64>,
}

impl<T> Clone for FrameBusSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            seq_counter: Arc::clone(&self.seq_counter),
            dropped_frames: Arc::clone(&self.dropped_frames),
        }
    }
}

impl<T> FrameBusSender<T> {
    /// Send a frame, dropping it if the bus is full.
    ///
    /// Returns true if sent successfully, false if dropped.
    pub fn send(&self, ts_ms: i64, data: impl Into<Arc<T>>) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::new(seq, ts_ms, data);

        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                // Rate-limit logging: only log every 30th drop
                if dropped % 30 == 1 {
                    tracing::warn!(dropped, seq, "Frame bus full, dropping frames");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Frame bus closed");
                false
            }
        }
    }

    /// Send a frame, waiting until space is available.
    pub async fn send_async(&self, ts_ms: i64, data: impl Into<Arc<T>>) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::new(seq, ts_ms, data);

        match self.tx.send(frame).await {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("Frame bus closed");
                false
            }
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::Relaxed)
    }
}

/// Result of a non-blocking receive.
#[derive(Debug)]
pub enum TryRecv<T> {
    Frame(Frame<T>),
    Empty,
    /// Every sender is gone and the channel is drained.
    Closed,
}

/// Receiver half of the frame bus.
pub struct FrameBusReceiver<T> {
    rx: mpsc::Receiver<Frame<T>>,
    last_seq: Option<u64>,
    gaps_detected: u64,
}

impl<T> FrameBusReceiver<T> {
    /// Receive the next frame, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Frame<T>> {
        let frame = self.rx.recv().await?;
        self.track_seq(frame.seq);
        Some(frame)
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> TryRecv<T> {
        match self.rx.try_recv() {
            Ok(frame) => {
                self.track_seq(frame.seq);
                TryRecv::Frame(frame)
            }
            Err(mpsc::error::TryRecvError::Empty) => TryRecv::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => TryRecv::Closed,
        }
    }

    /// Drain all available frames, keeping only the most recent.
    ///
    /// `Closed` only once the bus is closed and nothing was pending.
    pub fn drain_to_latest(&mut self) -> TryRecv<T> {
        let mut latest = None;
        let mut drained = 0usize;

        loop {
            match self.try_recv() {
                TryRecv::Frame(frame) => {
                    drained += 1;
                    latest = Some(frame);
                }
                TryRecv::Empty => break,
                TryRecv::Closed if latest.is_none() => return TryRecv::Closed,
                TryRecv::Closed => break,
            }
        }

        if drained > 1 {
            tracing::trace!("Skipped {} stale frames", drained - 1);
        }

        match latest {
            Some(frame) => TryRecv::Frame(frame),
            None => TryRecv::Empty,
        }
    }

    /// Number of missing sequence numbers observed (frames dropped upstream).
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    fn track_seq(&mut self, seq: u64) {
        if let Some(last) = self.last_seq {
            if seq > last + 1 {
                let gap = seq - last - 1;
                self.gaps_detected += gap;
                tracing::trace!(gap, last, seq, "Frame bus gap detected");
            }
        }
        self.last_seq = Some(seq);
    }
}

/// Frame bus connecting one producer family to one consumer.
pub struct FrameBus<T> {
    sender: FrameBusSender<T>,
    receiver: Option<FrameBusReceiver<T>>,
}

impl<T> FrameBus<T> {
    pub fn new() -> Self {
        Self::with_config(FrameBusConfig::default())
    }

    pub fn with_config(config: FrameBusConfig) -> Self {
        let capacity = config.channel_capacity();
        let (tx, rx) = mpsc::channel(capacity);

        tracing::debug!(capacity, "Created frame bus");

        Self {
            sender: FrameBusSender {
                tx,
                seq_counter: Arc::new(AtomicU64::new(0)),
                dropped_frames: Arc::new(AtomicU64::new(0)),
            },
            receiver: Some(FrameBusReceiver {
                rx,
                last_seq: None,
                gaps_detected: 0,
            }),
        }
    }

    pub fn sender(&self) -> FrameBusSender<T> {
        self.sender.clone()
    }

    /// Take the receiver (can only be called once).
    pub fn take_receiver(&mut self) -> Option<FrameBusReceiver<T>> {
        self.receiver.take()
    }

    /// Split into halves, dropping the bus's own sender so the receiver
    /// observes closure once the returned sender and its clones are gone.
    pub fn split(mut self) -> (FrameBusSender<T>, Option<FrameBusReceiver<T>>) {
        let receiver = self.receiver.take();
        (self.sender, receiver)
    }
}

impl<T> Default for FrameBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame loop metrics with atomic fields for lock-free updates.
///
/// Shared via `Arc<PipelineStatus>` between the loop and whoever reports on it.
#[derive(Debug, Default)]
pub struct PipelineStatus {
    /// Capture timestamp of the last processed frame.
    last_frame_ts_ms: AtomicI64,
    /// Last inference duration in milliseconds.
    inference_time_ms: AtomicU64,
    /// Frames handed to the rule module.
    frames_processed: AtomicU64,
    /// Ticks that found the same frame as last time.
    frames_stale: AtomicU64,
    /// Frames where inference failed or found nobody.
    frames_without_pose: AtomicU64,
    /// Frames dropped or skipped before reaching inference.
    frames_skipped: AtomicU64,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame_ts_ms(&self) -> i64 {
        self.last_frame_ts_ms.load(Ordering::Relaxed)
    }

    pub fn inference_time_ms(&self) -> u64 {
        self.inference_time_ms.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_stale(&self) -> u64 {
        self.frames_stale.load(Ordering::Relaxed)
    }

    pub fn frames_without_pose(&self) -> u64 {
        self.frames_without_pose.load(Ordering::Relaxed)
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    pub fn set_inference_time_ms(&self, value: u64) {
        self.inference_time_ms.store(value, Ordering::Relaxed);
    }

    /// Record a frame that reached the rule module.
    pub fn record_processed(&self, frame_ts_ms: i64) {
        self.last_frame_ts_ms.store(frame_ts_ms, Ordering::Relaxed);
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale(&self) {
        self.frames_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_without_pose(&self) {
        self.frames_without_pose.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, count: u64) {
        self.frames_skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Create a snapshot for serialization/display.
    pub fn snapshot(&self) -> PipelineStatusSnapshot {
        PipelineStatusSnapshot {
            last_frame_ts_ms: self.last_frame_ts_ms(),
            inference_time_ms: self.inference_time_ms(),
            frames_processed: self.frames_processed(),
            frames_stale: self.frames_stale(),
            frames_without_pose: self.frames_without_pose(),
            frames_skipped: self.frames_skipped(),
        }
    }
}

/// Snapshot of pipeline status for serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PipelineStatusSnapshot {
    pub last_frame_ts_ms: i64,
    pub inference_time_ms: u64,
    pub frames_processed: u64,
    pub frames_stale: u64,
    pub frames_without_pose: u64,
    pub frames_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_config_capacity() {
        let config = FrameBusConfig { capacity_frames: 0 };
        assert_eq!(config.channel_capacity(), MIN_CAPACITY_FRAMES);
        assert_eq!(FrameBusConfig::default().channel_capacity(), 16);
    }

    #[tokio::test]
    async fn test_send_recv() {
        let mut bus: FrameBus<u32> = FrameBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        sender.send(1000, 7u32);

        let frame = receiver.recv().await.unwrap();
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.ts_ms, 1000);
        assert_eq!(*frame.data, 7);
    }

    #[test]
    fn test_dropped_frames_counter() {
        let mut bus: FrameBus<u32> = FrameBus::with_config(FrameBusConfig { capacity_frames: 2 });
        let sender = bus.sender();
        let _receiver = bus.take_receiver().unwrap();

        for i in 0..10 {
            sender.send(i, 0u32);
        }

        assert_eq!(sender.dropped_frames(), 8);
    }

    #[tokio::test]
    async fn test_sequence_and_timestamps_preserved() {
        let mut bus: FrameBus<u32> = FrameBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        let timestamps: Vec<i64> = vec![100, 133, 166, 200];
        for ts in &timestamps {
            sender.send(*ts, 0u32);
        }

        for (expected_seq, expected_ts) in timestamps.iter().enumerate() {
            let frame = receiver.recv().await.unwrap();
            assert_eq!(frame.seq, expected_seq as u64);
            assert_eq!(frame.ts_ms, *expected_ts);
        }
        assert_eq!(receiver.gaps_detected(), 0);
    }

    #[test]
    fn test_gap_detection_after_drops() {
        let mut bus: FrameBus<u32> = FrameBus::with_config(FrameBusConfig { capacity_frames: 2 });
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        sender.send(0, 0u32); // seq 0
        sender.send(1, 0u32); // seq 1
        sender.send(2, 0u32); // seq 2, dropped
        assert!(matches!(receiver.try_recv(), TryRecv::Frame(_)));
        assert!(matches!(receiver.try_recv(), TryRecv::Frame(_)));
        sender.send(3, 0u32); // seq 3
        assert!(matches!(receiver.try_recv(), TryRecv::Frame(_)));
        assert_eq!(receiver.gaps_detected(), 1);
    }

    #[test]
    fn test_drain_to_latest_skips_old() {
        let mut bus: FrameBus<u32> = FrameBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        for i in 0..5u32 {
            sender.send(i as i64 * 33, i);
        }

        let TryRecv::Frame(frame) = receiver.drain_to_latest() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.ts_ms, 132);
        assert_eq!(*frame.data, 4);
        assert!(matches!(receiver.drain_to_latest(), TryRecv::Empty));
    }

    #[test]
    fn test_drain_reports_closed_bus() {
        let (sender, receiver) = FrameBus::<u32>::new().split();
        let mut receiver = receiver.unwrap();
        sender.send(10, 1u32);
        drop(sender);

        assert!(matches!(receiver.drain_to_latest(), TryRecv::Frame(f) if f.ts_ms == 10));
        assert!(matches!(receiver.drain_to_latest(), TryRecv::Closed));
    }

    #[test]
    fn test_pipeline_status_snapshot() {
        let status = PipelineStatus::new();
        status.record_processed(100);
        status.record_processed(133);
        status.increment_stale();
        status.add_skipped(3);
        status.set_inference_time_ms(12);

        let snap = status.snapshot();
        assert_eq!(snap.frames_processed, 2);
        assert_eq!(snap.frames_stale, 1);
        assert_eq!(snap.frames_skipped, 3);
        assert_eq!(snap.inference_time_ms, 12);
        assert_eq!(snap.last_frame_ts_ms, 133);
    }
}
