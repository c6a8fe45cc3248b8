//! Client library for the UAMP and MVISP mobility-simulation protocols.
//!
//! A [`Session`] is either client-driven (UAMP: [`Session::connect`]) or
//! server-driven (MVISP: [`Session::mvisp_connect`]). Once connected, agents'
//! location updates are pulled transparently by the session as needed;
//! callers only ever see decoded [`Command`]s through [`Session::current_command`]
//! and friends.

pub mod agent;
pub mod batcher;
pub mod config;
pub mod error;
pub mod handshake;
pub mod io_buffer;
pub mod session;
pub mod state_names;
pub mod transport;
pub mod wire;

pub use agent::Command;
pub use config::SessionOptions;
pub use error::{Error, Result};
pub use session::Session;
pub use wire::{Role, KNOWN_FEATURES, MAX_TIME, SUPPORTS_3D, SUPPORTS_ADD_REMOVE};
