use log::trace;
use std::time::Duration;

use crate::source::{Detection, LandmarkSource};
use crate::types::SharedFrame;

/// What happened to one camera frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOffer {
    pub face_submitted: bool,
    pub hand_submitted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames: u64,
    pub face_dropped: u64,
    pub hand_dropped: u64,
}

/// Offers each camera frame to both landmark sources without queueing.
///
/// A busy source simply misses the frame; neither source waits on the other.
pub struct FrameScheduler {
    face: LandmarkSource,
    hand: LandmarkSource,
    stats: SchedulerStats,
}

impl FrameScheduler {
    pub fn new(face: LandmarkSource, hand: LandmarkSource) -> Self {
        Self {
            face,
            hand,
            stats: SchedulerStats::default(),
        }
    }

    /// Called once per camera frame, at whatever rate the camera delivers.
    pub fn on_frame(&mut self, frame: &SharedFrame) -> FrameOffer {
        self.stats.frames += 1;

        let face_submitted = self.face.offer(frame);
        if !face_submitted {
            self.stats.face_dropped += 1;
        }
        let hand_submitted = self.hand.offer(frame);
        if !hand_submitted {
            self.stats.hand_dropped += 1;
        }

        trace!(
            "frame {}: face {} hand {}",
            self.stats.frames,
            if face_submitted { "submitted" } else { "dropped" },
            if hand_submitted { "submitted" } else { "dropped" }
        );

        FrameOffer {
            face_submitted,
            hand_submitted,
        }
    }

    /// Collect whatever results have arrived, without blocking.
    pub fn poll(&mut self) -> Vec<Detection> {
        [self.face.try_recv(), self.hand.try_recv()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Block until every in-flight submission has delivered (or `timeout` passes per source).
    pub fn settle(&mut self, timeout: Duration) -> Vec<Detection> {
        [self.face.recv_timeout(timeout), self.hand.recv_timeout(timeout)]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn face(&self) -> &LandmarkSource {
        &self.face
    }

    pub fn hand(&self) -> &LandmarkSource {
        &self.hand
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
