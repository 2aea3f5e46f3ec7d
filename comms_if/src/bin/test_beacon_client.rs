//! Simple beacon client test
//!
//! Sends a single command to a running beacon and prints the decoded reply, for example:
//!
//! ```text
//! test_beacon_client T 30
//! ```

use comms_if::{
    eqpt::beacon::{decode_obstacles, BeaconCmd},
    net::{zmq, MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_beacon_client", about = "Send one command to the beacon")]
struct Opt {
    /// Command letter (P, O, H, T)
    letter: char,

    /// Angle in degrees
    #[structopt(allow_hyphen_values = true)]
    angle: f32,

    /// Beacon command endpoint
    #[structopt(short, long, default_value = "tcp://localhost:5100")]
    endpoint: String,

    /// How long to wait for the reply, scans can take a few seconds
    #[structopt(short, long, default_value = "20000")]
    timeout_ms: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: opt.timeout_ms,
        send_timeout: 1000,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    // Create the socket
    let socket = match MonitoredSocket::new(&ctx, zmq::REQ, socket_options, &opt.endpoint) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the beacon");
            return Err(e.into());
        }
    };

    let cmd = BeaconCmd::new(opt.letter, opt.angle);
    println!("Sending {:?} ({:?})", cmd, cmd.kind());
    socket.send(&cmd.to_bytes()[..], 0)?;

    let reply = socket.recv_bytes(0)?;

    if reply.is_empty() {
        println!("Acknowledged");
    } else {
        let obstacles = decode_obstacles(&reply)?;
        println!("{} obstacles:", obstacles.len());
        for o in obstacles {
            println!("    x {:7.1} cm, y {:7.1} cm, height {:6.1} cm", o.x, o.y, o.height);
        }
    }

    Ok(())
}
