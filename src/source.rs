use anyhow::{Context, Result};
use log::{trace, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use crate::types::{Frame, Landmarks, SharedFrame, SourceKind};

/// A landmark model: given a frame, find at most one subject.
///
/// Runs on the source's worker thread, so it may block for as long as the
/// model needs.
pub trait LandmarkDetector: Send {
    fn name(&self) -> String;
    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>>;
}

impl LandmarkDetector for Box<dyn LandmarkDetector> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
        (**self).detect(frame)
    }
}

/// Stand-in used when a model file is missing: every frame comes back empty.
pub struct NullDetector {
    label: String,
}

impl NullDetector {
    pub fn new(label: &str) -> Self {
        Self { label: label.to_string() }
    }
}

impl LandmarkDetector for NullDetector {
    fn name(&self) -> String {
        format!("{} (disabled)", self.label)
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Option<Landmarks>> {
        Ok(None)
    }
}

/// Result of one submission, delivered exactly once.
#[derive(Debug, Clone)]
pub struct Detection {
    pub kind: SourceKind,
    pub seq: u64,
    pub landmarks: Option<Landmarks>,
}

/// Wraps a detector on its own worker thread and tracks whether a frame is in flight.
///
/// Only one frame is ever outstanding: `offer` refuses frames while busy, and
/// the busy flag clears in `try_recv`/`recv_timeout` before the result is
/// handed to the caller.
pub struct LandmarkSource {
    kind: SourceKind,
    name: String,
    busy: bool,
    submitted: u64,
    frame_tx: Option<SyncSender<(u64, SharedFrame)>>,
    result_rx: Receiver<(u64, Option<Landmarks>)>,
    worker_gone: bool,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl LandmarkSource {
    pub fn spawn<D: LandmarkDetector + 'static>(kind: SourceKind, mut detector: D) -> Result<Self> {
        let name = detector.name();
        // Capacity 1: the busy flag already guarantees at most one frame queued.
        let (frame_tx, frame_rx) = mpsc::sync_channel::<(u64, SharedFrame)>(1);
        let (result_tx, result_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name(format!("{}-landmarks", kind.as_str()))
            .spawn(move || {
                while let Ok((seq, frame)) = frame_rx.recv() {
                    // A panicking model still owes this frame a result.
                    let landmarks = match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&frame))) {
                        Ok(Ok(l)) => l,
                        Ok(Err(e)) => {
                            warn!("{} detector failed on frame {}: {:#}", kind.as_str(), seq, e);
                            None
                        }
                        Err(payload) => {
                            warn!("{} detector panicked on frame {}: {}", kind.as_str(), seq, panic_message(payload.as_ref()));
                            None
                        }
                    };
                    if result_tx.send((seq, landmarks)).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn landmark worker")?;

        Ok(Self {
            kind,
            name,
            busy: false,
            submitted: 0,
            frame_tx: Some(frame_tx),
            result_rx,
            worker_gone: false,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_idle(&self) -> bool {
        !self.busy
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Hand the frame to the worker if idle. Returns false (frame dropped) when busy.
    pub fn offer(&mut self, frame: &SharedFrame) -> bool {
        if self.busy {
            return false;
        }
        let Some(tx) = &self.frame_tx else {
            return false;
        };
        let seq = self.submitted + 1;
        match tx.try_send((seq, frame.clone())) {
            Ok(()) => {
                self.busy = true;
                self.submitted = seq;
                trace!("{}: submitted frame {}", self.kind.as_str(), seq);
                true
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                if !self.worker_gone {
                    warn!("{} worker has stopped", self.kind.as_str());
                    self.worker_gone = true;
                }
                false
            }
        }
    }

    /// Non-blocking poll for the in-flight result.
    pub fn try_recv(&mut self) -> Option<Detection> {
        match self.result_rx.try_recv() {
            Ok((seq, landmarks)) => Some(self.deliver(seq, landmarks)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.busy = false;
                None
            }
        }
    }

    /// Wait up to `timeout` for the in-flight result. Returns None when idle.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Detection> {
        if !self.busy {
            return None;
        }
        match self.result_rx.recv_timeout(timeout) {
            Ok((seq, landmarks)) => Some(self.deliver(seq, landmarks)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.busy = false;
                None
            }
        }
    }

    fn deliver(&mut self, seq: u64, landmarks: Option<Landmarks>) -> Detection {
        // Idle before the handler sees the result.
        self.busy = false;
        Detection {
            kind: self.kind,
            seq,
            landmarks,
        }
    }
}

impl Drop for LandmarkSource {
    fn drop(&mut self) {
        // Closing the frame channel ends the worker once any in-flight detection returns.
        self.frame_tx.take();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Point3D;
    use std::sync::Arc;

    /// Detector that waits for a release signal per frame, then returns the scripted result.
    pub struct GatedDetector {
        pub gate: Receiver<Option<Landmarks>>,
    }

    impl LandmarkDetector for GatedDetector {
        fn name(&self) -> String {
            "gated".to_string()
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Option<Landmarks>> {
            Ok(self.gate.recv().unwrap_or(None))
        }
    }

    pub fn gated(kind: SourceKind) -> (LandmarkSource, mpsc::Sender<Option<Landmarks>>) {
        let (tx, rx) = mpsc::channel();
        (LandmarkSource::spawn(kind, GatedDetector { gate: rx }).unwrap(), tx)
    }

    pub fn frame() -> SharedFrame {
        Arc::new(Frame::new(4, 4))
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_busy_source_refuses_frames() {
        let (mut source, release) = gated(SourceKind::Hand);
        assert!(source.is_idle());
        assert!(source.offer(&frame()));
        assert!(!source.is_idle());
        assert!(!source.offer(&frame()), "second frame must be dropped while busy");
        assert_eq!(source.submitted(), 1);

        release.send(None).unwrap();
        let det = source.recv_timeout(WAIT).expect("result delivered");
        assert_eq!(det.seq, 1);
        assert!(det.landmarks.is_none());
        assert!(source.is_idle());
        assert!(source.offer(&frame()));
        release.send(None).unwrap();
        assert_eq!(source.recv_timeout(WAIT).unwrap().seq, 2);
    }

    #[test]
    fn test_result_delivered_exactly_once() {
        let (mut source, release) = gated(SourceKind::Face);
        source.offer(&frame());
        release.send(Some(Landmarks::new(vec![Point3D::new(0.1, 0.2, 0.0)]))).unwrap();

        let det = source.recv_timeout(WAIT).unwrap();
        assert_eq!(det.kind, SourceKind::Face);
        assert_eq!(det.landmarks.unwrap().len(), 1);
        assert!(source.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(source.try_recv().is_none());
    }

    struct FailingDetector;

    impl LandmarkDetector for FailingDetector {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Option<Landmarks>> {
            anyhow::bail!("model exploded")
        }
    }

    #[test]
    fn test_detector_error_is_absent_result() {
        let mut source = LandmarkSource::spawn(SourceKind::Hand, FailingDetector).unwrap();
        source.offer(&frame());
        let det = source.recv_timeout(WAIT).expect("errors still deliver");
        assert!(det.landmarks.is_none());
        assert!(source.is_idle());
    }

    struct PanickingDetector {
        calls: u32,
    }

    impl LandmarkDetector for PanickingDetector {
        fn name(&self) -> String {
            "panicking".to_string()
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Option<Landmarks>> {
            self.calls += 1;
            if self.calls == 1 {
                panic!("output index out of range");
            }
            Ok(Some(Landmarks::new(vec![Point3D::default()])))
        }
    }

    #[test]
    fn test_detector_panic_is_absent_result() {
        let mut source = LandmarkSource::spawn(SourceKind::Hand, PanickingDetector { calls: 0 }).unwrap();
        assert!(source.offer(&frame()));
        let det = source.recv_timeout(WAIT).expect("a panic still delivers");
        assert_eq!(det.seq, 1);
        assert!(det.landmarks.is_none());
        assert!(source.is_idle());

        // The worker survives and keeps serving frames.
        for seq in 2..5 {
            assert!(source.offer(&frame()), "frame {} accepted", seq);
            let det = source.recv_timeout(WAIT).expect("later frames deliver");
            assert_eq!(det.seq, seq);
            assert!(det.landmarks.is_some());
        }
    }

    #[test]
    fn test_null_detector() {
        let mut source = LandmarkSource::spawn(SourceKind::Face, NullDetector::new("Face Mesh")).unwrap();
        assert_eq!(source.name(), "Face Mesh (disabled)");
        source.offer(&frame());
        assert!(source.recv_timeout(WAIT).unwrap().landmarks.is_none());
    }
}
