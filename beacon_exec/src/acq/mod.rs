//! # Acquisition loop
//!
//! The single threaded loop at the heart of the beacon. Each cycle:
//!
//! 1. Reads at most one remote command and executes it. Any fault while doing so is logged and
//!    answered with an empty reply.
//! 2. Polls the pan stepper.
//! 3. Builds this cycle's camera transform from the pan angle.
//! 4. Waits for the next pair of frames from the camera.
//! 5. Fuses any markers in the colour frame into a robot pose.
//! 6. Advances the obstacle scan, accumulating the depth frame and replying to the scan request
//!    once the scan completes.
//! 7. Publishes the fused pose.
//!
//! The loop owns every piece of mutable state, nothing is shared between threads.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod cmd_processor;
pub mod io;
pub mod scan;
pub mod synthetic;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use cmd_processor::{CmdError, Reply};
pub use io::{
    ColorFrame, DebugSink, DepthFrame, FrameSet, FrameSource, FrameSourceError, LogSink,
    MarkerDetector, NullSink, PowerCtrl, StopFlag, SystemShutdown,
};
pub use scan::{ScanState, ScanStep};
pub use synthetic::{Rock, SyntheticScene, SyntheticSource};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::beacon::encode_obstacles;
use log::{debug, error, info, trace, warn};

use crate::{
    beacon_server::CommandChannel,
    geom::{CameraTransform, DepthProjector, ProjectorCache, ProjectorError},
    loc::{MarkerCatalog, MarkerFusion, RobotMarkersAll},
    obstacle::{GridMapError, ObstacleGrid},
    params::BeaconExecParams,
    pose_server::PosePublisher,
    stepper::StepperCtrl,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Pixels per grid cell in the debug view.
const DEBUG_VIEW_SCALE: u32 = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The collaborators the loop talks to.
pub struct LoopIo {
    pub commands: Box<dyn CommandChannel>,

    pub poses: Box<dyn PosePublisher>,

    pub frames: Box<dyn FrameSource>,

    /// `None` disables marker fusion
    pub detector: Option<Box<dyn MarkerDetector>>,

    pub power: Box<dyn PowerCtrl>,

    pub debug: Box<dyn DebugSink>,

    pub stop: StopFlag,
}

pub struct AcqLoop {
    params: BeaconExecParams,

    catalog: MarkerCatalog,

    stepper: StepperCtrl,

    grid: ObstacleGrid,

    scan: ScanState,

    projectors: ProjectorCache,

    /// Centimeters per depth unit
    depth_to_cm: f64,

    io: LoopIo,

    num_cycles: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A turn off command was executed
    Shutdown,

    /// The stop flag was raised
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum AcqError {
    #[error("Capture size mismatch on the {stream} stream: expected {expected:?}, got {found:?}")]
    FatalResolutionMismatch {
        stream: &'static str,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Could not create the obstacle grid: {0}")]
    GridError(GridMapError),

    #[error("Could not build the depth projector: {0}")]
    ProjectorError(ProjectorError),

    #[error("Frame source error: {0}")]
    FrameSourceError(FrameSourceError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AcqLoop {
    pub fn new(
        params: BeaconExecParams,
        catalog: MarkerCatalog,
        stepper: StepperCtrl,
        io: LoopIo,
    ) -> Result<Self, AcqError> {
        let grid = ObstacleGrid::new(&params.grid).map_err(AcqError::GridError)?;
        let depth_to_cm = io.frames.depth_scale() * 100.0;

        info!(
            "Acquisition loop ready: {} known markers, {:.4} cm per depth unit",
            catalog.known().count(),
            depth_to_cm
        );

        Ok(Self {
            params,
            catalog,
            stepper,
            grid,
            scan: ScanState::default(),
            projectors: ProjectorCache::new(),
            depth_to_cm,
            io,
            num_cycles: 0,
        })
    }

    /// Run cycles until the loop is told to stop or hits a fatal error.
    pub fn run(&mut self) -> Result<LoopExit, AcqError> {
        loop {
            if let Some(exit) = self.cycle()? {
                info!("Acquisition loop exiting after {} cycles: {:?}", self.num_cycles, exit);
                return Ok(exit);
            }
        }
    }

    /// Run a single cycle, returning `Some` if the loop should exit.
    pub fn cycle(&mut self) -> Result<Option<LoopExit>, AcqError> {
        if self.io.stop.is_stopped() {
            return Ok(Some(LoopExit::Stopped));
        }

        self.num_cycles += 1;

        // ---- COMMANDS ----

        if let Some(exit) = self.handle_command() {
            return Ok(Some(exit));
        }

        // ---- STEPPER ----

        if let Err(e) = self.stepper.serial_poll() {
            warn!("Could not poll the stepper: {}", e);
        }

        let camera_tf = CameraTransform::from_params(&self.params.camera, self.stepper.get_angle_deg());

        // ---- FRAMES ----

        let frames = match self.io.frames.wait_for_frames() {
            Ok(f) => f,
            Err(FrameSourceError::Timeout) => {
                warn!("Timed out waiting for frames");
                return Ok(None);
            }
            Err(e) => return Err(AcqError::FrameSourceError(e)),
        };

        self.check_resolution(&frames)?;

        // ---- MARKERS ----

        let markers = match (frames.color.as_ref(), self.io.detector.as_mut()) {
            (Some(color), Some(detector)) if self.params.camera.markers_enabled => {
                let mut fusion = MarkerFusion::new(
                    &self.catalog,
                    &camera_tf,
                    self.stepper.angle_correction_deg(),
                );
                detector.detect(color, &mut |s| fusion.found_marker(&s));
                Some(fusion.finish(&mut self.stepper))
            }
            _ => None,
        };

        // ---- OBSTACLE SCAN ----

        let step = self
            .scan
            .advance(self.stepper.get_angle_deg(), self.params.scan.angle_tolerance_deg);

        match step {
            ScanStep::Idle => (),
            ScanStep::Waiting => trace!(
                "Scan waiting for the stepper ({:.1} of {:.1} degrees)",
                self.stepper.get_angle_deg(),
                self.scan.target_angle()
            ),
            ScanStep::Accumulate { complete } => {
                self.accumulate(&frames.depth, &camera_tf)?;

                let view = self
                    .grid
                    .debug_view(DEBUG_VIEW_SCALE, self.params.obstacles.floor_height_cm);
                self.io.debug.image("2D World", &view);

                if complete {
                    self.finish_scan();
                }
            }
        }

        // ---- PUBLISH ----

        if let Some(ref m) = markers {
            self.publish(m);
        }

        Ok(None)
    }

    pub fn stepper(&self) -> &StepperCtrl {
        &self.stepper
    }

    pub fn grid(&self) -> &ObstacleGrid {
        &self.grid
    }

    pub fn scan(&self) -> &ScanState {
        &self.scan
    }

    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    /// Read and execute at most one command. Returns `Some` if the loop must exit.
    fn handle_command(&mut self) -> Option<LoopExit> {
        let cmd = match self.io.commands.request() {
            Ok(Some(c)) => c,
            Ok(None) => return None,
            Err(e) => {
                warn!("Ignoring network fault: {}", e);
                self.recover_from_fault();
                return None;
            }
        };

        debug!("Command {:?}", cmd);

        let result = cmd_processor::exec(
            &cmd,
            &mut self.stepper,
            &mut self.grid,
            &mut self.scan,
            &self.params.scan,
        );

        match result {
            Ok(Reply::Now) => self.respond(&[]),
            Ok(Reply::Deferred) => (),
            Ok(Reply::Shutdown) => {
                self.respond(&[]);

                match self.io.power.shutdown() {
                    Ok(()) => return Some(LoopExit::Shutdown),
                    Err(e) => error!("Could not shut down: {}", e),
                }
            }
            Err(e) => {
                warn!("Command {:?} failed: {}", cmd.letter as char, e);
                self.recover_from_fault();
            }
        }

        None
    }

    /// Leave the protocol in a clean state after a failed request: no scan armed and no reply
    /// owed.
    fn recover_from_fault(&mut self) {
        self.scan.disarm();

        if self.io.commands.reply_owed() {
            self.respond(&[]);
        }
    }

    fn respond(&mut self, payload: &[u8]) {
        if let Err(e) = self.io.commands.respond(payload) {
            warn!("Could not reply to the command: {}", e);
        }
    }

    fn publish(&mut self, markers: &RobotMarkersAll) {
        if let Err(e) = self.io.poses.publish(markers) {
            warn!("Could not publish the pose: {}", e);
        }
    }

    fn check_resolution(&self, frames: &FrameSet) -> Result<(), AcqError> {
        let cam = &self.params.camera;

        let expected = (cam.depth_width, cam.depth_height);
        let found = (frames.depth.width, frames.depth.height);
        if expected != found {
            return Err(AcqError::FatalResolutionMismatch {
                stream: "depth",
                expected,
                found,
            });
        }

        if let Some(ref color) = frames.color {
            let expected = (cam.color_width, cam.color_height);
            let found = color.dimensions();
            if expected != found {
                return Err(AcqError::FatalResolutionMismatch {
                    stream: "color",
                    expected,
                    found,
                });
            }
        }

        Ok(())
    }

    fn accumulate(&mut self, depth: &DepthFrame, camera_tf: &CameraTransform) -> Result<(), AcqError> {
        let intrinsics = self.io.frames.depth_intrinsics();
        let projector = self
            .projectors
            .get(&intrinsics)
            .map_err(AcqError::ProjectorError)?;

        let added = accumulate_depth(
            &mut self.grid,
            projector,
            camera_tf,
            depth,
            self.depth_to_cm,
            self.params.camera.invalid_left_columns,
        );

        trace!(
            "Accumulated {} points, {} frames left",
            added,
            self.scan.remaining_frames()
        );

        Ok(())
    }

    fn finish_scan(&mut self) {
        let obstacles = self.grid.extract(&self.params.obstacles);
        let scale = self.params.obstacles.severity_scale_cm as f32;

        info!(
            "Scan at {:.1} degrees complete: {} points, {} obstacles",
            self.scan.target_angle(),
            self.grid.num_added(),
            obstacles.len()
        );
        for o in &obstacles {
            self.io.debug.text(&format!(
                "Obstacle at ({:.0}, {:.0}) cm, height {:.0} cm, {:?}",
                o.x,
                o.y,
                o.height,
                o.class(scale)
            ));
        }

        self.respond(&encode_obstacles(&obstacles));
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Project every valid depth sample into the world and add it to the grid.
///
/// Columns left of `skip_columns` and zero samples are ignored. Returns the number of points the
/// grid accepted.
pub fn accumulate_depth(
    grid: &mut ObstacleGrid,
    projector: &DepthProjector,
    camera_tf: &CameraTransform,
    depth: &DepthFrame,
    depth_to_cm: f64,
    skip_columns: u32,
) -> usize {
    let mut added = 0;

    if depth.width == 0 {
        return 0;
    }

    for (y, row) in depth.data.chunks(depth.width as usize).enumerate() {
        for (x, &raw) in row.iter().enumerate().skip(skip_columns as usize) {
            if raw == 0 {
                continue;
            }

            let cam = match projector.lookup(raw as f64 * depth_to_cm, x as u32, y as u32) {
                Some(c) => c,
                None => continue,
            };

            if grid.add(&camera_tf.world_from_camera(&cam)) {
                added += 1;
            }
        }
    }

    added
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        beacon_server::BeaconServerError,
        loc::{MarkerCatalogEntry, MarkerSighting, Shift},
        params::{CameraParams, ScanParams},
        pose_server::PosePubError,
        stepper::test::{test_params, MockLink},
    };
    use comms_if::eqpt::beacon::{decode_obstacles, BeaconCmd, WireError};
    use image::RgbImage;
    use nalgebra::Matrix3x4;
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::Rc,
    };

    // ---- FAKES ----

    #[derive(Clone, Default)]
    struct FakeChannel {
        /// `None` entries decode as garbage
        requests: Rc<RefCell<VecDeque<Option<BeaconCmd>>>>,
        replies: Rc<RefCell<Vec<Vec<u8>>>>,
        owed: Rc<Cell<bool>>,
    }

    impl FakeChannel {
        fn push(&self, letter: char, angle: f32) {
            self.requests
                .borrow_mut()
                .push_back(Some(BeaconCmd::new(letter, angle)));
        }
    }

    impl CommandChannel for FakeChannel {
        fn request(&mut self) -> Result<Option<BeaconCmd>, BeaconServerError> {
            if self.owed.get() {
                return Ok(None);
            }

            match self.requests.borrow_mut().pop_front() {
                None => Ok(None),
                Some(r) => {
                    self.owed.set(true);
                    r.map(Some).ok_or(BeaconServerError::DecodeError(WireError::BadLength {
                        expected: 8,
                        found: 3,
                    }))
                }
            }
        }

        fn respond(&mut self, payload: &[u8]) -> Result<(), BeaconServerError> {
            if !self.owed.get() {
                return Err(BeaconServerError::NoRequestPending);
            }
            self.replies.borrow_mut().push(payload.to_vec());
            self.owed.set(false);
            Ok(())
        }

        fn reply_owed(&self) -> bool {
            self.owed.get()
        }
    }

    #[derive(Clone, Default)]
    struct FakePublisher {
        published: Rc<RefCell<Vec<RobotMarkersAll>>>,
    }

    impl PosePublisher for FakePublisher {
        fn publish(&mut self, markers: &RobotMarkersAll) -> Result<(), PosePubError> {
            self.published.borrow_mut().push(markers.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakePower {
        calls: Rc<Cell<u32>>,
        fail: bool,
    }

    impl PowerCtrl for FakePower {
        fn shutdown(&mut self) -> std::io::Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(std::io::ErrorKind::PermissionDenied.into())
            } else {
                Ok(())
            }
        }
    }

    /// Reports the same markers in every frame.
    struct FakeDetector(Vec<MarkerSighting>);

    impl MarkerDetector for FakeDetector {
        fn detect(&mut self, _image: &ColorFrame, found: &mut dyn FnMut(MarkerSighting)) {
            for s in &self.0 {
                found(*s);
            }
        }
    }

    #[derive(Clone, Default)]
    struct CountingSink {
        images: Rc<Cell<u32>>,
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl DebugSink for CountingSink {
        fn text(&mut self, line: &str) {
            self.lines.borrow_mut().push(line.into());
        }

        fn image(&mut self, _name: &str, _image: &RgbImage) {
            self.images.set(self.images.get() + 1);
        }
    }

    // ---- FIXTURE ----

    struct Harness {
        acq: AcqLoop,
        commands: FakeChannel,
        poses: FakePublisher,
        power: FakePower,
        sink: CountingSink,
        stop: StopFlag,
    }

    fn camera() -> CameraParams {
        CameraParams {
            tilt_deg: 0.0,
            origin_cm: [0.0, 0.0, 70.0],
            depth_width: 64,
            depth_height: 48,
            color_width: 8,
            color_height: 6,
            invalid_left_columns: 0,
            markers_enabled: true,
        }
    }

    fn catalog() -> MarkerCatalog {
        MarkerCatalog::from_entries(vec![
            MarkerCatalogEntry {
                true_size: 10.0,
                side: 1,
                ..MarkerCatalogEntry::unknown(1)
            },
            MarkerCatalogEntry {
                true_size: 10.0,
                side: -1,
                shift: Shift::default(),
                ..MarkerCatalogEntry::unknown(2)
            },
        ])
        .unwrap()
    }

    fn rock_scene() -> SyntheticScene {
        SyntheticScene {
            floor_cm: 0.0,
            rocks: vec![Rock {
                x_cm: [100.0, 200.0],
                y_cm: [-50.0, 50.0],
                top_cm: 30.0,
            }],
        }
    }

    struct Setup {
        source_camera: CameraParams,
        stepper: StepperCtrl,
        sightings: Vec<MarkerSighting>,
        power: FakePower,
    }

    impl Default for Setup {
        fn default() -> Self {
            let mut stepper = StepperCtrl::new(test_params(), None);
            stepper.absolute_seek(0.0).unwrap();

            Self {
                source_camera: camera(),
                stepper,
                sightings: vec![],
                power: FakePower::default(),
            }
        }
    }

    fn harness(setup: Setup) -> Harness {
        let mut params = BeaconExecParams::default();
        params.camera = camera();

        let commands = FakeChannel::default();
        let poses = FakePublisher::default();
        let sink = CountingSink::default();
        let stop = StopFlag::new();

        let io = LoopIo {
            commands: Box::new(commands.clone()),
            poses: Box::new(poses.clone()),
            frames: Box::new(SyntheticSource::from_params(&setup.source_camera, rock_scene())),
            detector: Some(Box::new(FakeDetector(setup.sightings))),
            power: Box::new(setup.power.clone()),
            debug: Box::new(sink.clone()),
            stop: stop.clone(),
        };

        Harness {
            acq: AcqLoop::new(params, catalog(), setup.stepper, io).unwrap(),
            commands,
            poses,
            power: setup.power,
            sink,
            stop,
        }
    }

    // ---- TESTS ----

    #[test]
    fn test_scan_end_to_end() {
        let mut h = harness(Setup::default());
        h.commands.push('t', 0.0);

        for _ in 0..17 {
            assert_eq!(h.acq.cycle().unwrap(), None);
        }
        assert!(h.commands.replies.borrow().is_empty());
        assert_eq!(h.acq.scan().remaining_frames(), 1);

        assert_eq!(h.acq.cycle().unwrap(), None);
        assert!(!h.acq.scan().is_armed());
        assert_eq!(h.sink.images.get(), 18);
        assert_eq!(h.poses.published.borrow().len(), 18);

        let reply = {
            let replies = h.commands.replies.borrow();
            assert_eq!(replies.len(), 1);
            replies[0].clone()
        };

        let obstacles = decode_obstacles(&reply).unwrap();
        assert!(!obstacles.is_empty());
        assert_eq!(h.sink.lines.borrow().len(), obstacles.len());
        for o in &obstacles {
            assert!((o.height - 30.0).abs() < 0.5, "{:?}", o);
            assert!(o.x > 95.0 && o.x < 205.0, "{:?}", o);
            assert!(o.y > -55.0 && o.y < 55.0, "{:?}", o);
        }

        // No further replies once the scan is over
        h.acq.cycle().unwrap();
        assert_eq!(h.commands.replies.borrow().len(), 1);
    }

    #[test]
    fn test_scan_waits_for_seek() {
        let link = MockLink::default();
        let stepper = StepperCtrl::new(test_params(), Some(Box::new(link.clone())));
        let mut h = harness(Setup {
            stepper,
            ..Default::default()
        });

        let budget = ScanParams::default().frame_budget;

        // The board never reports, so the head stays at its zero angle
        h.commands.push('T', 0.0);
        for _ in 0..30 {
            h.acq.cycle().unwrap();
        }
        assert_eq!(h.acq.scan().remaining_frames(), budget);
        assert_eq!(h.acq.grid().num_added(), 0);
        assert!(h.commands.replies.borrow().is_empty());

        // Board reports the head arrived: 73 degrees above zero
        link.incoming.borrow_mut().push_back(81);
        h.acq.cycle().unwrap();
        assert_eq!(h.acq.scan().remaining_frames(), budget - 1);
        assert!(h.acq.grid().num_added() > 0);
    }

    #[test]
    fn test_unknown_command() {
        let mut h = harness(Setup::default());
        let before = h.acq.stepper().state();

        h.commands.push('Z', 45.0);
        h.acq.cycle().unwrap();

        assert_eq!(*h.commands.replies.borrow(), vec![Vec::<u8>::new()]);
        assert_eq!(h.acq.stepper().state(), before);
        assert_eq!(h.acq.grid().num_added(), 0);
        assert!(!h.acq.scan().is_armed());
    }

    #[test]
    fn test_point_command() {
        let mut h = harness(Setup::default());
        h.commands.push('p', 25.0);
        h.acq.cycle().unwrap();

        assert_eq!(h.commands.replies.borrow().len(), 1);
        assert!((h.acq.stepper().get_angle_deg() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_turn_off() {
        let mut h = harness(Setup::default());
        h.commands.push('O', 0.0);

        assert_eq!(h.acq.cycle().unwrap(), Some(LoopExit::Shutdown));
        assert_eq!(h.power.calls.get(), 1);
        assert_eq!(*h.commands.replies.borrow(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_turn_off_failure_keeps_running() {
        let mut h = harness(Setup {
            power: FakePower {
                fail: true,
                ..Default::default()
            },
            ..Default::default()
        });
        h.commands.push('o', 0.0);

        assert_eq!(h.acq.cycle().unwrap(), None);
        assert_eq!(h.power.calls.get(), 1);
        assert_eq!(h.commands.replies.borrow().len(), 1);
    }

    #[test]
    fn test_decode_fault() {
        let mut h = harness(Setup::default());
        h.commands.requests.borrow_mut().push_back(None);
        h.commands.push('P', 10.0);

        assert_eq!(h.acq.cycle().unwrap(), None);
        assert_eq!(*h.commands.replies.borrow(), vec![Vec::<u8>::new()]);
        assert!(!h.commands.reply_owed());

        // The next request is served normally
        h.acq.cycle().unwrap();
        assert_eq!(h.commands.replies.borrow().len(), 2);
        assert!((h.acq.stepper().get_angle_deg() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_command_fault() {
        let stepper = StepperCtrl::new(test_params(), Some(Box::new(MockLink::default())));
        let mut h = harness(Setup {
            stepper,
            ..Default::default()
        });

        // Homing times out as the board never reports
        h.commands.push('H', 0.0);
        assert_eq!(h.acq.cycle().unwrap(), None);
        assert_eq!(*h.commands.replies.borrow(), vec![Vec::<u8>::new()]);
        assert!(!h.acq.scan().is_armed());
    }

    #[test]
    fn test_nan_scan_rejected() {
        let mut h = harness(Setup::default());
        h.commands.push('T', f32::NAN);

        assert_eq!(h.acq.cycle().unwrap(), None);
        assert_eq!(*h.commands.replies.borrow(), vec![Vec::<u8>::new()]);
        assert!(!h.acq.scan().is_armed());
        assert_eq!(h.acq.grid().num_added(), 0);
        assert!(h.acq.stepper().get_angle_deg().abs() < 1e-9);
        assert!(h.poses.published.borrow().iter().all(|p| p.beacon.is_finite()));
    }

    #[test]
    fn test_resolution_mismatch() {
        let mut h = harness(Setup {
            source_camera: CameraParams {
                depth_width: 32,
                ..camera()
            },
            ..Default::default()
        });

        match h.acq.cycle() {
            Err(AcqError::FatalResolutionMismatch {
                stream: "depth",
                expected: (64, 48),
                found: (32, 48),
            }) => (),
            r => panic!("Expected a resolution mismatch, got {:?}", r),
        }
        assert!(h.acq.run().is_err());
    }

    #[test]
    fn test_stop_flag() {
        let mut h = harness(Setup::default());
        h.acq.cycle().unwrap();
        h.stop.stop();

        assert_eq!(h.acq.run().unwrap(), LoopExit::Stopped);
        assert_eq!(h.acq.num_cycles(), 1);
    }

    /// Reference marker 100 cm away on a camera bearing of 10 degrees, level with the camera.
    fn reference_sighting() -> MarkerSighting {
        let b = 10f64.to_radians();
        let (x, z) = (-100.0 * b.sin(), 100.0 * b.cos());
        #[rustfmt::skip]
        let pose = Matrix3x4::new(
            1.0, 0.0, 0.0, x / 10.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, z / 10.0,
        );
        MarkerSighting { id: 2, pose }
    }

    #[test]
    fn test_reference_marker_correction() {
        let mut h = harness(Setup {
            sightings: vec![reference_sighting()],
            ..Default::default()
        });

        h.acq.cycle().unwrap();

        assert!((h.acq.stepper().angle_correction_deg() - 10.0).abs() < 1e-6);
        {
            let published = h.poses.published.borrow();
            assert_eq!(published.len(), 1);
            assert!((published[0].beacon - 10.0).abs() < 1e-6);
            assert!(!published[0].pose.is_valid());
        }

        // Seeing the same marker again from the same head position changes nothing
        for _ in 0..5 {
            h.acq.cycle().unwrap();
            assert!((h.acq.stepper().angle_correction_deg() - 10.0).abs() < 1e-6);
            assert!((h.acq.stepper().get_angle_deg() - 10.0).abs() < 1e-6);
        }
        assert!(h
            .poses
            .published
            .borrow()
            .iter()
            .all(|p| (p.beacon - 10.0).abs() < 1e-6));
    }

    #[test]
    fn test_scan_with_reference_in_view() {
        let mut h = harness(Setup {
            sightings: vec![reference_sighting()],
            ..Default::default()
        });

        // Learn the correction, then scan where the head already points
        h.acq.cycle().unwrap();
        h.commands.push('T', 10.0);

        let budget = ScanParams::default().frame_budget;
        for _ in 0..budget {
            h.acq.cycle().unwrap();
        }

        assert!(!h.acq.scan().is_armed());
        assert_eq!(h.commands.replies.borrow().len(), 1);
        assert!((h.acq.stepper().angle_correction_deg() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_accumulate_skips_columns() {
        let cam = camera();
        let src = SyntheticSource::from_params(&cam, SyntheticScene::default());
        let depth = src.render();
        let projector = DepthProjector::new(src.depth_intrinsics()).unwrap();
        let tf = CameraTransform::from_params(&cam, 0.0);

        let mut all = ObstacleGrid::new(&Default::default()).unwrap();
        let mut right_half = ObstacleGrid::new(&Default::default()).unwrap();

        let n_all = accumulate_depth(&mut all, &projector, &tf, &depth, 0.1, 0);
        let n_right = accumulate_depth(&mut right_half, &projector, &tf, &depth, 0.1, 32);

        assert!(n_all > 0);
        assert!(n_right > 0 && n_right < n_all);
        assert_eq!(n_all, all.num_added());
    }
}
