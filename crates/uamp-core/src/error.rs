//! The closed error taxonomy for UAMP/MVISP sessions.
//!
//! Every fallible session operation returns one of these kinds; there is no
//! general-purpose catch-all. Messages mirror the original library's
//! `returnToString` table so a port reviewer can diff one against the other.

/// Everything that can go wrong driving a [`crate::session::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    // ── argument validation ──────────────────────────────────────────────
    #[error("Invalid port number specified")]
    InvalidPort,
    #[error("Invalid number of agents")]
    InvalidNumAgents,
    #[error("Invalid time limit for simulation")]
    InvalidTimeLimit,
    #[error("Invalid number of states")]
    InvalidNumberStates,
    #[error("Zero-length state name")]
    ZeroStateLength,
    #[error("State name length longer than supported")]
    StateLengthLong,
    #[error("Duplicate state name")]
    DuplicateState,
    #[error("Invalid time given for state change")]
    InvalidChangeTime,
    #[error("Invalid state into which to transition")]
    InvalidChangeState,
    #[error("Invalid features given to connect function")]
    InvalidFeatures,
    #[error("Current command times form no intersection")]
    NoIntersection,
    #[error("No more movement data to request")]
    NoMoreData,

    // ── transport ────────────────────────────────────────────────────────
    #[error("Could not get information for given hostname")]
    HostnameInformation,
    #[error("Could not create socket")]
    CreateSocket,
    #[error("Could not connect socket")]
    ConnectSocket,
    #[error("Could not read from socket")]
    SocketRead,
    #[error("Could not write to socket")]
    SocketWrite,
    #[error("Socket dried up")]
    SocketDry,

    // ── handshake negotiation ────────────────────────────────────────────
    #[error("UAMP client attempting to contact MVISP server")]
    UampClientMvispServer,
    #[error("MVISP client attempting to contact UAMP server")]
    MvispClientUampServer,
    #[error("Unknown handshake data from server")]
    ServerUnknownHandshake,
    #[error("Client and server do not support a common UAMP/MVISP version")]
    NoSharedVersion,
    #[error("Server sends 3D data, which client does not support")]
    TwoDClientThreeDServer,
    #[error("Server sends add/remove data, which client does not support")]
    AddRemoveUnsupported,
    #[error("Server rejected handshake for unknown reason")]
    ServerRejectedHandshake,
    #[error("Server and client do not agree on protocol version to run")]
    ServerClientVersionDisagree,

    // ── specification negotiation ────────────────────────────────────────
    #[error("Simulation specification denied")]
    SimulationDenied,
    #[error("Simulation specification response malformed")]
    SimulationResponseBad,
    #[error("MVISP server specified zero agents")]
    MvispNoAgents,

    // ── protocol-level verification ──────────────────────────────────────
    #[error("First location update did not have zero time")]
    FirstUpdateTime,
    #[error("Server sent non-matching final updates")]
    NonEqualFinalUpdates,
    #[error("Server sent update with timestamp past simulation duration")]
    TimestampTooLarge,
    #[error("Server sent update with timestamp that did not increase")]
    TimestampNotIncremented,
    #[error("Server sent malformed present flag")]
    InvalidPresentFlag,
}

impl Error {
    /// The human-readable description, exactly as the original library's
    /// `uampError`/`mvispError` accessors surface it.
    pub fn describe(self) -> &'static str {
        // `Display` already carries this text; kept as a named accessor
        // because the wire-level spec calls it out as a distinct surface.
        match self {
            Error::InvalidPort => "Invalid port number specified",
            Error::InvalidNumAgents => "Invalid number of agents",
            Error::InvalidTimeLimit => "Invalid time limit for simulation",
            Error::InvalidNumberStates => "Invalid number of states",
            Error::ZeroStateLength => "Zero-length state name",
            Error::StateLengthLong => "State name length longer than supported",
            Error::DuplicateState => "Duplicate state name",
            Error::InvalidChangeTime => "Invalid time given for state change",
            Error::InvalidChangeState => "Invalid state into which to transition",
            Error::InvalidFeatures => "Invalid features given to connect function",
            Error::NoIntersection => "Current command times form no intersection",
            Error::NoMoreData => "No more movement data to request",
            Error::HostnameInformation => "Could not get information for given hostname",
            Error::CreateSocket => "Could not create socket",
            Error::ConnectSocket => "Could not connect socket",
            Error::SocketRead => "Could not read from socket",
            Error::SocketWrite => "Could not write to socket",
            Error::SocketDry => "Socket dried up",
            Error::UampClientMvispServer => "UAMP client attempting to contact MVISP server",
            Error::MvispClientUampServer => "MVISP client attempting to contact UAMP server",
            Error::ServerUnknownHandshake => "Unknown handshake data from server",
            Error::NoSharedVersion => {
                "Client and server do not support a common UAMP/MVISP version"
            }
            Error::TwoDClientThreeDServer => "Server sends 3D data, which client does not support",
            Error::AddRemoveUnsupported => {
                "Server sends add/remove data, which client does not support"
            }
            Error::ServerRejectedHandshake => "Server rejected handshake for unknown reason",
            Error::ServerClientVersionDisagree => {
                "Server and client do not agree on protocol version to run"
            }
            Error::SimulationDenied => "Simulation specification denied",
            Error::SimulationResponseBad => "Simulation specification response malformed",
            Error::MvispNoAgents => "MVISP server specified zero agents",
            Error::FirstUpdateTime => "First location update did not have zero time",
            Error::NonEqualFinalUpdates => "Server sent non-matching final updates",
            Error::TimestampTooLarge => {
                "Server sent update with timestamp past simulation duration"
            }
            Error::TimestampNotIncremented => {
                "Server sent update with timestamp that did not increase"
            }
            Error::InvalidPresentFlag => "Server sent malformed present flag",
        }
    }
}

/// Every fallible operation in this crate returns this.
pub type Result<T> = std::result::Result<T, Error>;
