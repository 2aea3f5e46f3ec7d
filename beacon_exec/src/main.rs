//! # Beacon Executable
//!
//! Runs the beacon's acquisition loop: localising the robot from its markers, pointing the sensor
//! head and scanning the terrain for obstacles on request.
//!
//! # Architecture
//!
//! - Initialise the session, logging and parameters
//! - Open the command and pose servers
//! - Connect to the pan stepper, falling back to software tracking if it is missing
//! - Run the acquisition loop until a turn off command or Ctrl-C

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};
use std::time::Duration;

// Internal
use beacon_lib::{
    acq::{AcqLoop, LogSink, LoopExit, LoopIo, StopFlag, SyntheticScene, SyntheticSource, SystemShutdown},
    beacon_server::BeaconServer,
    loc::MarkerCatalog,
    params::BeaconExecParams,
    pose_server::PoseServer,
    stepper::StepperCtrl,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Frame period of the synthetic camera, about 30 FPS.
const SYNTHETIC_FRAME_PERIOD: Duration = Duration::from_millis(33);

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("beacon_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    info!("Beacon Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: BeaconExecParams =
        util::params::load("beacon_exec.toml").wrap_err("Could not load beacon_exec params")?;

    let catalog = MarkerCatalog::load("marker_catalog.toml")
        .wrap_err("Could not load the marker catalog")?;

    let scene: SyntheticScene = match util::params::load("synthetic_scene.toml") {
        Ok(s) => s,
        Err(e) => {
            warn!("No synthetic scene loaded ({}), using a bare floor", e);
            SyntheticScene::default()
        }
    };

    info!("Parameters loaded");

    // ---- NETWORK ----

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let beacon_server = BeaconServer::new(&zmq_ctx, &params.net)
        .wrap_err("Failed to initialise the BeaconServer")?;
    info!("BeaconServer listening on {}", params.net.command_endpoint);

    let pose_server = PoseServer::new(&zmq_ctx, &params.net)
        .wrap_err("Failed to initialise the PoseServer")?;
    info!("PoseServer publishing on {}", params.net.pose_endpoint);

    // ---- STEPPER ----

    let mut stepper = StepperCtrl::connect(params.stepper.clone());
    if let Err(e) = stepper.absolute_seek(params.stepper.initial_seek_deg) {
        warn!("Initial seek failed: {}", e);
    }
    info!("Stepper initialised: {:?}", stepper.state());

    // ---- STOP SIGNAL ----

    let stop = StopFlag::new();
    let stop_handle = stop.clone();
    ctrlc::set_handler(move || stop_handle.stop())
        .wrap_err("Failed to install the Ctrl-C handler")?;

    // ---- ACQUISITION LOOP ----

    warn!("No depth camera or marker detector backend available, using a synthetic camera");

    let io = LoopIo {
        commands: Box::new(beacon_server),
        poses: Box::new(pose_server),
        frames: Box::new(
            SyntheticSource::from_params(&params.camera, scene)
                .with_frame_period(SYNTHETIC_FRAME_PERIOD),
        ),
        detector: None,
        power: Box::new(SystemShutdown),
        debug: Box::new(LogSink),
        stop,
    };

    let mut acq = AcqLoop::new(params, catalog, stepper, io)
        .wrap_err("Failed to initialise the acquisition loop")?;

    info!("Initialisation complete, entering main loop");

    match acq.run().wrap_err("Acquisition loop failed")? {
        LoopExit::Shutdown => info!("Host is shutting down"),
        LoopExit::Stopped => info!("Stopped by the operator"),
    }

    Ok(())
}
