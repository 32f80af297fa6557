//! Live multicast listener and its event stream.

/// Event and state types emitted by the listener.
pub mod events;
/// Socket setup, receive loop and control handle.
pub mod listener;
