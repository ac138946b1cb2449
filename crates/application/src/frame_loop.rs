//! Frame loop driver.
//!
//! Pulls the latest frame, runs pose inference and feeds the analyzer at most
//! once per distinct frame. Scheduling is delegated to a [`Ticker`] so tests
//! can step the loop by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use repcoach_bus::{Frame, FrameBusReceiver, PipelineStatus, TryRecv};
use repcoach_exercise::Observation;
use repcoach_pose::PoseDetector;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::analyzer::Analyzer;

/// Result of polling a [`FrameSource`].
#[derive(Debug)]
pub enum SourcePoll<T> {
    /// The most recent frame. May be the same frame as on the previous poll.
    Ready(Frame<T>),
    /// Nothing captured yet.
    Pending,
    /// The producer is gone.
    Closed,
}

/// Where the loop reads "the current video frame" from.
pub trait FrameSource: Send {
    type Frame;

    fn current_frame(&mut self) -> SourcePoll<Self::Frame>;
}

/// Frame source over a [`FrameBusReceiver`] that always exposes the newest frame.
pub struct LatestFrame<T> {
    receiver: FrameBusReceiver<T>,
    latest: Option<Frame<T>>,
    status: Option<Arc<PipelineStatus>>,
}

impl<T> LatestFrame<T> {
    pub fn new(receiver: FrameBusReceiver<T>) -> Self {
        Self {
            receiver,
            latest: None,
            status: None,
        }
    }

    /// Count frames that never reached the loop in `status`.
    pub fn with_status(mut self, status: Arc<PipelineStatus>) -> Self {
        self.status = Some(status);
        self
    }
}

impl<T: Send + Sync> FrameSource for LatestFrame<T> {
    type Frame = T;

    fn current_frame(&mut self) -> SourcePoll<T> {
        match self.receiver.drain_to_latest() {
            TryRecv::Frame(frame) => {
                if let (Some(prev), Some(status)) = (&self.latest, &self.status) {
                    let skipped = frame.seq.saturating_sub(prev.seq + 1);
                    if skipped > 0 {
                        status.add_skipped(skipped);
                    }
                }
                self.latest = Some(frame);
            }
            TryRecv::Empty => {}
            TryRecv::Closed => return SourcePoll::Closed,
        }

        match &self.latest {
            Some(frame) => SourcePoll::Ready(frame.clone()),
            None => SourcePoll::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    WaitingForFrame,
    Processing,
}

/// What a single [`FrameLoop::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No frame available yet.
    Idle,
    /// The current frame was already processed.
    Stale,
    /// Inference failed or found nobody. State untouched.
    NoDetection,
    /// Landmarks went through the active rule module.
    Processed(Observation),
    /// The frame source is gone.
    Closed,
}

/// Sends raw host commands to a running loop. Cheap to clone.
#[derive(Clone)]
pub struct CommandSender(mpsc::UnboundedSender<String>);

impl CommandSender {
    /// Queue a raw JSON command. Returns false if the loop is gone.
    pub fn send(&self, raw: impl Into<String>) -> bool {
        self.0.send(raw.into()).is_ok()
    }
}

/// Single-consumer loop owning the analyzer session.
pub struct FrameLoop<S, D> {
    source: S,
    detector: D,
    analyzer: Analyzer,
    commands_tx: CommandSender,
    commands_rx: mpsc::UnboundedReceiver<String>,
    last_processed_ts: Option<i64>,
    phase: LoopPhase,
    status: Arc<PipelineStatus>,
}

impl<S, D> FrameLoop<S, D>
where
    S: FrameSource,
    D: PoseDetector<Frame = S::Frame>,
{
    pub fn new(source: S, detector: D, analyzer: Analyzer) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            detector,
            analyzer,
            commands_tx: CommandSender(tx),
            commands_rx: rx,
            last_processed_ts: None,
            phase: LoopPhase::WaitingForFrame,
            status: Arc::new(PipelineStatus::new()),
        }
    }

    /// Share metrics with another component (e.g. the frame source).
    pub fn with_status(mut self, status: Arc<PipelineStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn command_sender(&self) -> CommandSender {
        self.commands_tx.clone()
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn status(&self) -> Arc<PipelineStatus> {
        Arc::clone(&self.status)
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// One scheduling step: apply pending commands, then process the current
    /// frame if it has not been processed yet.
    pub fn tick(&mut self) -> TickOutcome {
        while let Ok(raw) = self.commands_rx.try_recv() {
            self.analyzer.handle_raw_command(&raw);
        }

        let frame = match self.source.current_frame() {
            SourcePoll::Ready(frame) => frame,
            SourcePoll::Pending => return TickOutcome::Idle,
            SourcePoll::Closed => return TickOutcome::Closed,
        };

        if self.last_processed_ts == Some(frame.ts_ms) {
            self.status.increment_stale();
            return TickOutcome::Stale;
        }
        self.last_processed_ts = Some(frame.ts_ms);

        self.phase = LoopPhase::Processing;
        let outcome = self.process(&frame);
        self.phase = LoopPhase::WaitingForFrame;
        outcome
    }

    fn process(&mut self, frame: &Frame<S::Frame>) -> TickOutcome {
        let started = Instant::now();
        let detection = self.detector.detect(&frame.data, frame.ts_ms);
        self.status
            .set_inference_time_ms(started.elapsed().as_millis() as u64);

        match detection {
            Ok(Some(landmarks)) if !landmarks.is_empty() => {
                self.status.record_processed(frame.ts_ms);
                TickOutcome::Processed(self.analyzer.process_landmarks(&landmarks))
            }
            Ok(_) => {
                tracing::trace!(seq = frame.seq, ts_ms = frame.ts_ms, "No pose in frame");
                self.status.increment_without_pose();
                TickOutcome::NoDetection
            }
            Err(e) => {
                tracing::warn!(
                    detector = self.detector.name(),
                    seq = frame.seq,
                    error = %e,
                    "Pose inference failed"
                );
                self.status.increment_without_pose();
                TickOutcome::NoDetection
            }
        }
    }

    /// Tick until cancelled or the source closes, then hand the loop back.
    pub async fn run<K: Ticker>(mut self, mut ticker: K, cancel: CancellationToken) -> Self {
        tracing::info!(
            session_id = %self.analyzer.session_id(),
            detector = self.detector.name(),
            "Frame loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Frame loop cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if self.tick() == TickOutcome::Closed {
                tracing::info!("Frame source closed, stopping loop");
                break;
            }
        }

        let status = self.status.snapshot();
        tracing::info!(
            frames_processed = status.frames_processed,
            frames_stale = status.frames_stale,
            frames_without_pose = status.frames_without_pose,
            frames_skipped = status.frames_skipped,
            reps = self.analyzer.state().rep_count,
            "Frame loop stopped"
        );
        self
    }
}

/// Scheduling primitive between two ticks.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// Fixed-rate ticker. Ticks missed while a frame was processing are skipped.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    /// Must be called from within a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Ticks as fast as the runtime allows, yielding in between.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateTicker;

#[async_trait]
impl Ticker for ImmediateTicker {
    async fn tick(&mut self) {
        tokio::task::yield_now().await;
    }
}

/// Controls a spawned frame loop.
///
/// Each start creates a fresh CancellationToken, so stop() + start() works.
pub struct FrameLoopHandle {
    running: Arc<AtomicBool>,
    cancel_token: Mutex<CancellationToken>,
}

impl FrameLoopHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        if let Ok(token) = self.cancel_token.lock() {
            token.cancel();
        }
        self.running.store(false, Ordering::Release);
    }

    /// Spawn `frame_loop` on the current runtime. The join handle returns the
    /// loop once it stops, so it can be inspected or restarted.
    pub fn start<S, D, K>(&self, frame_loop: FrameLoop<S, D>, ticker: K) -> JoinHandle<FrameLoop<S, D>>
    where
        S: FrameSource + 'static,
        D: PoseDetector<Frame = S::Frame> + 'static,
        K: Ticker + 'static,
    {
        let token = CancellationToken::new();
        let child = token.child_token();
        if let Ok(mut current) = self.cancel_token.lock() {
            *current = token;
        }
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let frame_loop = frame_loop.run(ticker, child).await;
            running.store(false, Ordering::Release);
            frame_loop
        })
    }
}

impl Default for FrameLoopHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AnalyzerConfig;
    use repcoach_bus::FrameBus;
    use repcoach_events::InMemoryEventBus;
    use repcoach_pose::{BodyPoint, Landmark, PoseError, PoseLandmarks};

    /// Frames are the landmarks themselves; `None` means nobody in view.
    struct Passthrough;

    impl PoseDetector for Passthrough {
        type Frame = Option<PoseLandmarks>;

        fn name(&self) -> &str {
            "passthrough"
        }

        fn detect(
            &mut self,
            frame: &Self::Frame,
            _ts_ms: i64,
        ) -> repcoach_pose::Result<Option<PoseLandmarks>> {
            Ok(frame.clone())
        }
    }

    struct Failing;

    impl PoseDetector for Failing {
        type Frame = Option<PoseLandmarks>;

        fn name(&self) -> &str {
            "failing"
        }

        fn detect(
            &mut self,
            _frame: &Self::Frame,
            _ts_ms: i64,
        ) -> repcoach_pose::Result<Option<PoseLandmarks>> {
            Err(PoseError::ModelNotLoaded)
        }
    }

    fn straight_arm() -> PoseLandmarks {
        let mut pose = PoseLandmarks::default();
        pose.set(BodyPoint::LeftShoulder, Landmark::new(0.6, 0.25));
        pose.set(BodyPoint::LeftElbow, Landmark::new(0.6, 0.40));
        pose.set(BodyPoint::LeftWrist, Landmark::new(0.6, 0.55));
        pose
    }

    fn analyzer(bus: Arc<InMemoryEventBus>) -> Analyzer {
        Analyzer::new(
            &AnalyzerConfig::default(),
            bus,
            Arc::new(ManualClock::new(0)),
        )
    }

    #[test]
    fn test_stale_frame_is_not_reprocessed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let source = LatestFrame::new(rx.unwrap());
        let mut frame_loop = FrameLoop::new(source, Passthrough, analyzer(bus.clone()));

        assert_eq!(frame_loop.tick(), TickOutcome::Idle);

        tx.send(100, Some(straight_arm()));
        assert!(matches!(frame_loop.tick(), TickOutcome::Processed(_)));
        assert_eq!(frame_loop.tick(), TickOutcome::Stale);
        assert_eq!(frame_loop.tick(), TickOutcome::Stale);
        assert_eq!(frame_loop.phase(), LoopPhase::WaitingForFrame);

        let status = frame_loop.status().snapshot();
        assert_eq!(status.frames_processed, 1);
        assert_eq!(status.frames_stale, 2);
        assert_eq!(bus.events_for("STATS").len(), 1);

        drop(tx);
        assert_eq!(frame_loop.tick(), TickOutcome::Closed);
    }

    #[test]
    fn test_only_newest_frame_is_processed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let status = Arc::new(PipelineStatus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let source = LatestFrame::new(rx.unwrap()).with_status(status.clone());
        let mut frame_loop =
            FrameLoop::new(source, Passthrough, analyzer(bus.clone())).with_status(status);

        tx.send(0, Some(straight_arm()));
        frame_loop.tick();
        for ts in [33, 66, 100] {
            tx.send(ts, Some(straight_arm()));
        }
        frame_loop.tick();

        let snap = frame_loop.status().snapshot();
        assert_eq!(snap.frames_processed, 2);
        assert_eq!(snap.frames_skipped, 2);
        assert_eq!(snap.last_frame_ts_ms, 100);
    }

    #[test]
    fn test_empty_detection_leaves_state_alone() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let mut frame_loop =
            FrameLoop::new(LatestFrame::new(rx.unwrap()), Passthrough, analyzer(bus.clone()));

        tx.send(0, None::<PoseLandmarks>);
        assert_eq!(frame_loop.tick(), TickOutcome::NoDetection);
        tx.send(33, Some(PoseLandmarks::default()));
        assert_eq!(frame_loop.tick(), TickOutcome::NoDetection);

        assert!(bus.is_empty());
        assert!(!frame_loop.analyzer().state().ready_position_confirmed);
        assert_eq!(frame_loop.status().frames_without_pose(), 2);
    }

    #[test]
    fn test_inference_failure_is_not_fatal() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let mut frame_loop =
            FrameLoop::new(LatestFrame::new(rx.unwrap()), Failing, analyzer(bus.clone()));

        tx.send(0, Some(straight_arm()));
        assert_eq!(frame_loop.tick(), TickOutcome::NoDetection);
        tx.send(33, Some(straight_arm()));
        assert_eq!(frame_loop.tick(), TickOutcome::NoDetection);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_commands_apply_before_frame() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let mut frame_loop =
            FrameLoop::new(LatestFrame::new(rx.unwrap()), Passthrough, analyzer(bus.clone()));

        let commands = frame_loop.command_sender();
        assert!(commands.send(r#"{"type":"SET_EXERCISE","name":"lift"}"#));
        tx.send(0, Some(straight_arm()));

        let TickOutcome::Processed(obs) = frame_loop.tick() else {
            panic!("expected a processed frame");
        };
        // Lift reads hip-shoulder-elbow; the hip is missing.
        assert_eq!(obs, Observation::neutral());
        assert_eq!(bus.spoken(), vec!["Switched to lift"]);
    }

    #[tokio::test]
    async fn test_run_stops_when_source_closes() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let frame_loop =
            FrameLoop::new(LatestFrame::new(rx.unwrap()), Passthrough, analyzer(bus.clone()));

        tx.send(0, Some(straight_arm()));
        drop(tx);

        let frame_loop = frame_loop
            .run(ImmediateTicker, CancellationToken::new())
            .await;
        assert!(frame_loop.analyzer().state().ready_position_confirmed);
        assert_eq!(bus.spoken(), vec!["Start curling"]);
    }

    #[tokio::test]
    async fn test_handle_stop_cancels_loop() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (tx, rx) = FrameBus::<Option<PoseLandmarks>>::new().split();
        let frame_loop =
            FrameLoop::new(LatestFrame::new(rx.unwrap()), Passthrough, analyzer(bus));

        let handle = FrameLoopHandle::new();
        let task = handle.start(frame_loop, ImmediateTicker);
        assert!(handle.is_running());

        handle.stop();
        let frame_loop = task.await.unwrap();
        assert!(!handle.is_running());
        assert_eq!(frame_loop.status().frames_processed(), 0);

        // Sender still alive: the loop stopped because of the token.
        drop(tx);
    }
}
