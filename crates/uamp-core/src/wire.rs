//! UAMP/MVISP wire format — constants shared by every component that reads
//! or writes bytes on a session's socket.
//!
//! All multi-byte integers are big-endian. Times are milliseconds, positions
//! are millimetres; both travel as `u32` and are divided by 1000.0 when
//! surfaced through the public [`crate::agent::Command`] API.

/// Size of an agent's circular update queue.
pub const UPDATE_QUEUE_SIZE: usize = 6;

/// Maximum number of buffered outbound state changes before an automatic
/// flush.
pub const STATE_CHANGE_BUFFER_SIZE: usize = 128;

/// Backing capacity of the framed I/O buffer, in bytes.
pub const IO_BUFFER_SIZE: usize = 2048;

/// Minimum legal length, in bytes, of an MVISP state name.
pub const MIN_STATE_NAME_LEN: usize = 1;

/// Maximum legal length, in bytes, of an MVISP state name.
pub const MAX_STATE_NAME_LEN: usize = 1024;

/// Largest simulation time representable in seconds after the ×1000
/// fixed-point conversion to `u32` milliseconds.
pub const MAX_TIME: f64 = (u32::MAX as f64) / 1000.0;

/// The only handshake version this client and server generation understand.
pub const SUPPORTED_VERSION: u8 = 0x80;

/// Server sends 3D (`x`, `y`, `z`) updates instead of 2D.
pub const SUPPORTS_3D: u32 = 0x8000_0000;

/// Server sends a `present` byte with every update (add/remove semantics).
pub const SUPPORTS_ADD_REMOVE: u32 = 0x4000_0000;

/// All feature bits a client is permitted to advertise.
pub const KNOWN_FEATURES: u32 = SUPPORTS_3D | SUPPORTS_ADD_REMOVE;

/// 4-byte ASCII role tag sent by a UAMP client/server.
pub const ROLE_TAG_UAMP: [u8; 4] = *b"UAMP";

/// 4-byte ASCII role tag sent by an MVISP client/server.
pub const ROLE_TAG_MVISP: [u8; 4] = *b"MVIS";

/// Which protocol a session is speaking. Selects the role tag sent during
/// the handshake and which of [`crate::session::Session::connect`] /
/// [`crate::session::Session::mvisp_connect`] is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Uamp,
    Mvisp,
}

impl Role {
    pub fn tag(self) -> [u8; 4] {
        match self {
            Role::Uamp => ROLE_TAG_UAMP,
            Role::Mvisp => ROLE_TAG_MVISP,
        }
    }
}

/// Client-to-server opcodes sent once a session is past the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// u32 `0`. Terminates the session.
    Terminate = 0x00,
    /// u32 count, count × u32 agent-id.
    LocationRequest = 0x01,
    /// u32 count, count × (u32 agent, u32 time, u32 new-state).
    StateChanges = 0x02,
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}
