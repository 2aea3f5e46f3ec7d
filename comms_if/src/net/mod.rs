//! # Network Module
//!
//! ZMQ sockets with a background monitor that tracks whether a peer is connected.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

pub use zmq;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout on the monitor's PAIR socket. Bounds how long dropping a `MonitoredSocket`
/// waits for the monitor thread to exit.
const MONITOR_POLL_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Source of unique inproc endpoint names for monitors.
static MONITOR_ID: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A zmq socket plus a thread watching its monitor events.
///
/// Dereferences to the underlying [`zmq::Socket`] for sending and receiving.
pub struct MonitoredSocket {
    socket: Socket,
    link: Arc<LinkFlags>,
    monitor_thread: Option<thread::JoinHandle<()>>,
}

/// Options applied to a socket before it connects or binds.
///
/// Timeouts and intervals are in milliseconds and mirror the `zmq_setsockopt` options of the
/// same name.
pub struct SocketOptions {
    /// Bind to the endpoint (servers) rather than connect to it (clients). Default `false`.
    pub bind: bool,

    /// Block in [`MonitoredSocket::new`] until the first connection is made. Default `true`.
    pub block_on_first_connect: bool,

    /// `ZMQ_REQ_CORRELATE`, only applied to REQ sockets
    pub req_correlate: bool,

    /// `ZMQ_REQ_RELAXED`, only applied to REQ sockets
    pub req_relaxed: bool,

    pub linger: i32,
    pub reconnect_ivl: i32,
    pub connect_timeout: i32,
    pub recv_timeout: i32,
    pub send_timeout: i32,
}

/// State shared between a socket and its monitor thread.
#[derive(Default)]
struct LinkFlags {
    connected: AtomicBool,
    stop: AtomicBool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket of `socket_type`, apply `options` and connect or bind it to `endpoint`
    /// (e.g. `"tcp://*:5000"`).
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx
            .socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        let monitor = open_monitor(ctx, &socket)?;

        options.apply(&socket)?;

        let attached = if options.bind {
            socket.bind(endpoint)
        } else {
            socket.connect(endpoint)
        };
        attached.map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        let link = Arc::new(LinkFlags::default());

        if options.block_on_first_connect {
            wait_for_connection(&monitor)?;
            link.connected.store(true, Ordering::Relaxed);
        }

        monitor
            .set_rcvtimeo(MONITOR_POLL_MS)
            .map_err(|e| MonitoredSocketError::SocketOptionError("monitor rcvtimeo".into(), e))?;

        let thread_link = link.clone();
        let monitor_thread = thread::spawn(move || watch(monitor, &thread_link));

        Ok(Self {
            socket,
            link,
            monitor_thread: Some(monitor_thread),
        })
    }

    /// `true` while at least one peer is connected.
    pub fn connected(&self) -> bool {
        self.link.connected.load(Ordering::Relaxed)
    }

    /// Non-blocking receive, `Ok(None)` when nothing is queued.
    pub fn try_recv_bytes(&self) -> Result<Option<Vec<u8>>, zmq::Error> {
        match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.link.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.monitor_thread.take() {
            handle.join().ok();
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Socket {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Socket {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Apply the options to `socket`.
    pub fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        let check = |name: &str, res: zmq::Result<()>| {
            res.map_err(|e| MonitoredSocketError::SocketOptionError(name.into(), e))
        };

        check("connect_timeout", socket.set_connect_timeout(self.connect_timeout))?;
        check("linger", socket.set_linger(self.linger))?;
        check("reconnect_ivl", socket.set_reconnect_ivl(self.reconnect_ivl))?;
        check("rcvtimeo", socket.set_rcvtimeo(self.recv_timeout))?;
        check("sndtimeo", socket.set_sndtimeo(self.send_timeout))?;

        if let Ok(SocketType::REQ) = socket.get_socket_type() {
            check("req_correlate", socket.set_req_correlate(self.req_correlate))?;
            check("req_relaxed", socket.set_req_relaxed(self.req_relaxed))?;
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    /// libzmq's own defaults, except that construction blocks until connected.
    fn default() -> Self {
        Self {
            bind: false,
            block_on_first_connect: true,
            req_correlate: false,
            req_relaxed: false,
            linger: 30_000,
            reconnect_ivl: 100,
            connect_timeout: 0,
            recv_timeout: -1,
            send_timeout: 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Enable monitoring on `socket` and connect a PAIR socket to receive its events.
fn open_monitor(ctx: &Context, socket: &Socket) -> Result<Socket, MonitoredSocketError> {
    let endpoint = format!(
        "inproc://monitor_{}",
        MONITOR_ID.fetch_add(1, Ordering::Relaxed)
    );

    socket
        .monitor(&endpoint, SocketEvent::ALL as i32)
        .map_err(MonitoredSocketError::MonitoringEnableError)?;

    let monitor = ctx
        .socket(zmq::PAIR)
        .map_err(MonitoredSocketError::CreateSocketError)?;
    monitor
        .connect(&endpoint)
        .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

    Ok(monitor)
}

/// Block until the monitor reports a connection. Any event other than a delayed connect is a
/// failure.
fn wait_for_connection(monitor: &Socket) -> Result<(), MonitoredSocketError> {
    loop {
        match next_event(monitor).map_err(MonitoredSocketError::EventReadError)? {
            SocketEvent::CONNECTED => return Ok(()),
            SocketEvent::CONNECT_DELAYED => (),
            _ => return Err(MonitoredSocketError::CouldNotConnect(None)),
        }
    }
}

/// Read one monitor event. The event ID is the first two bytes of the first frame, the trailing
/// address frame is discarded.
fn next_event(monitor: &Socket) -> zmq::Result<SocketEvent> {
    let frame = monitor.recv_msg(0)?;
    let id = match *frame {
        [lo, hi, ..] => u16::from_ne_bytes([lo, hi]),
        _ => return Err(zmq::Error::EINVAL),
    };

    if monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(id))
}

/// Monitor thread body, runs until the owning socket is dropped.
fn watch(monitor: Socket, link: &LinkFlags) {
    while !link.stop.load(Ordering::Relaxed) {
        match next_event(&monitor) {
            Ok(SocketEvent::CONNECTED) | Ok(SocketEvent::ACCEPTED) => {
                link.connected.store(true, Ordering::Relaxed)
            }
            Ok(SocketEvent::DISCONNECTED) => link.connected.store(false, Ordering::Relaxed),
            Ok(_) | Err(zmq::Error::EAGAIN) => (),
            Err(e) => {
                log::warn!("Socket monitor stopped: {}", e);
                return;
            }
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
    fn test_try_recv_empty() {
        let ctx = Context::new();
        let options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 0,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(&ctx, zmq::REP, options, "inproc://net_test_empty")
            .expect("Could not create socket");

        assert!(!socket.connected());
        assert_eq!(socket.try_recv_bytes().expect("recv failed"), None);
    }

    #[test]
    fn test_req_rep_exchange() {
        let ctx = Context::new();
        let endpoint = "inproc://net_test_exchange";

        let server = MonitoredSocket::new(
            &ctx,
            zmq::REP,
            SocketOptions {
                bind: true,
                block_on_first_connect: false,
                linger: 0,
                ..Default::default()
            },
            endpoint,
        )
        .expect("Could not create server");

        let client = MonitoredSocket::new(
            &ctx,
            zmq::REQ,
            SocketOptions {
                block_on_first_connect: false,
                linger: 0,
                recv_timeout: 1000,
                ..Default::default()
            },
            endpoint,
        )
        .expect("Could not create client");

        client.send(&b"ping"[..], 0).expect("send failed");

        let mut request = None;
        for _ in 0..100 {
            request = server.try_recv_bytes().expect("recv failed");
            if request.is_some() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(request.as_deref(), Some(&b"ping"[..]));

        server.send(&b"pong"[..], 0).expect("send failed");
        assert_eq!(client.recv_bytes(0).expect("recv failed"), b"pong".to_vec());
    }
}
