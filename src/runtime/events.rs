//! Listener event stream payloads.

use crate::upload::UploadError;

/// Lifecycle of the live listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// No socket: before binding or after the loop ended.
    Idle,
    /// Socket bound and group joined, loop not yet started.
    Bound,
    /// Waiting for or handling datagrams.
    Receiving,
}

/// Events emitted from the receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// The socket is bound and the receive loop is starting.
    Bound {
        /// Local UDP port.
        port: u16,
    },
    /// A record was accepted by the server and cached.
    Uploaded {
        /// Worked callsign.
        call: String,
    },
    /// A record was not accepted; it stays eligible for a later broadcast.
    UploadFailed {
        /// Worked callsign.
        call: String,
        /// Delivery error.
        reason: UploadError,
    },
    /// The loop ended and the socket was closed.
    Stopped {
        /// Socket error that ended the loop, `None` on requested shutdown.
        error: Option<String>,
    },
}

/// Running totals for one listener session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Datagrams read from the socket.
    pub datagrams: u64,
    /// Datagrams without a usable record.
    pub ignored: u64,
    /// Records already delivered.
    pub duplicates: u64,
    /// Records accepted by the server.
    pub uploaded: u64,
    /// Records the server did not accept.
    pub failed: u64,
}
