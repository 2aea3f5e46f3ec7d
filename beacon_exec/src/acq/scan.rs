//! # Scan state machine
//!
//! An obstacle scan accumulates a fixed number of frames taken at the requested pan angle. Frames
//! taken while the head is still slewing towards the target are skipped without using up the
//! budget.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanState {
    /// Frames still to accumulate, zero when idle
    remaining_frames: u32,

    /// Pan angle the scan is taken at.
    ///
    /// Units: degrees
    target_angle: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What the acquisition loop should do with the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// No scan in progress
    Idle,

    /// Scan armed but the head is not at the target yet, skip the frame
    Waiting,

    /// Accumulate the frame. If `complete` is set this was the last frame of the scan, the
    /// obstacles must be extracted and the scan has been disarmed.
    Accumulate { complete: bool },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ScanState {
    /// Start a scan of `frame_budget` frames at `target_angle`, replacing any scan in progress.
    pub fn arm(&mut self, target_angle: f64, frame_budget: u32) {
        info!(
            "Scan armed at {:.1} degrees for {} frames",
            target_angle, frame_budget
        );

        self.target_angle = target_angle;
        self.remaining_frames = frame_budget;
    }

    pub fn disarm(&mut self) {
        if self.is_armed() {
            debug!("Scan disarmed with {} frames left", self.remaining_frames);
        }
        self.remaining_frames = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.remaining_frames > 0
    }

    pub fn remaining_frames(&self) -> u32 {
        self.remaining_frames
    }

    pub fn target_angle(&self) -> f64 {
        self.target_angle
    }

    /// Advance the scan by one frame taken at the pan angle `angle_deg`.
    ///
    /// The budget is only consumed when the angle is within `tolerance_deg` of the target.
    pub fn advance(&mut self, angle_deg: f64, tolerance_deg: f64) -> ScanStep {
        if !self.is_armed() {
            return ScanStep::Idle;
        }

        let error = util::maths::get_ang_dist_deg(self.target_angle, angle_deg);
        if error.abs() > tolerance_deg {
            return ScanStep::Waiting;
        }

        self.remaining_frames -= 1;

        ScanStep::Accumulate {
            complete: self.remaining_frames == 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_idle() {
        let mut scan = ScanState::default();
        assert!(!scan.is_armed());
        assert_eq!(scan.advance(0.0, 4.0), ScanStep::Idle);

        scan.arm(10.0, 0);
        assert_eq!(scan.advance(10.0, 4.0), ScanStep::Idle);
    }

    #[test]
    fn test_budget_exhausted_once() {
        let mut scan = ScanState::default();
        scan.arm(30.0, 18);

        let mut completions = 0;
        for i in 0..18 {
            match scan.advance(30.0, 4.0) {
                ScanStep::Accumulate { complete: true } => {
                    completions += 1;
                    assert_eq!(i, 17);
                }
                ScanStep::Accumulate { complete: false } => (),
                s => panic!("Unexpected step {:?}", s),
            }
        }

        assert_eq!(completions, 1);
        assert!(!scan.is_armed());
        assert_eq!(scan.advance(30.0, 4.0), ScanStep::Idle);
    }

    #[test]
    fn test_waits_for_seek() {
        let mut scan = ScanState::default();
        scan.arm(30.0, 3);

        for _ in 0..100 {
            assert_eq!(scan.advance(-40.0, 4.0), ScanStep::Waiting);
        }
        assert_eq!(scan.advance(25.9, 4.0), ScanStep::Waiting);
        assert_eq!(scan.remaining_frames(), 3);

        // Edges of the tolerance band count
        assert_eq!(scan.advance(26.0, 4.0), ScanStep::Accumulate { complete: false });
        assert_eq!(scan.advance(34.0, 4.0), ScanStep::Accumulate { complete: false });
        assert_eq!(scan.advance(40.0, 4.0), ScanStep::Waiting);
        assert_eq!(scan.advance(31.0, 4.0), ScanStep::Accumulate { complete: true });
    }

    #[test]
    fn test_wraps_angle() {
        let mut scan = ScanState::default();
        scan.arm(179.0, 1);
        assert_eq!(scan.advance(-179.0, 4.0), ScanStep::Accumulate { complete: true });
    }

    #[test]
    fn test_rearm_and_disarm() {
        let mut scan = ScanState::default();
        scan.arm(0.0, 5);
        scan.advance(0.0, 4.0);
        scan.arm(45.0, 5);
        assert_eq!(scan.remaining_frames(), 5);
        assert_eq!(scan.target_angle(), 45.0);

        scan.disarm();
        assert!(!scan.is_armed());
    }
}
