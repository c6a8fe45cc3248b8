//! The 9-byte role/version/feature handshake shared by UAMP and MVISP.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io_buffer::FrameBuffer;
use crate::transport::Transport;
use crate::wire::{Role, KNOWN_FEATURES, ROLE_TAG_MVISP, ROLE_TAG_UAMP, SUPPORTED_VERSION};

/// Runs the handshake for `role`, advertising `supported_features`.
///
/// On success returns the server's advertised feature bitmask. On any
/// negotiation failure the client best-effort writes a single reject byte
/// (`0x00`) before returning the error — the original library's behavior of
/// ignoring a write failure on that byte is preserved, since the session is
/// being torn down regardless.
pub fn perform_handshake(
    buf: &mut FrameBuffer,
    transport: &mut Transport,
    role: Role,
    supported_features: u32,
) -> Result<u32> {
    if supported_features & !KNOWN_FEATURES != 0 {
        return Err(Error::InvalidFeatures);
    }

    buf.begin_write(9);
    buf.write_bytes(transport, &role.tag())?;
    buf.write_u8(transport, SUPPORTED_VERSION)?;
    buf.write_u32(transport, supported_features)?;

    buf.begin_read(9);
    let mut id = [0u8; 4];
    buf.read_bytes(transport, &mut id)?;
    let server_version = buf.read_u8(transport)?;
    let server_features = buf.read_u32(transport)?;

    if let Err(err) = check_role_tag(role, id)
        .and_then(|_| check_shared_version(server_version))
        .and_then(|_| check_feature_downgrade(supported_features, server_features))
    {
        transport.write_best_effort(0x00);
        return Err(err);
    }

    transport.write_all(&[SUPPORTED_VERSION])?;
    let mut ack = [0u8; 1];
    transport.read_all(&mut ack)?;
    if ack[0] == 0x00 {
        return Err(Error::ServerRejectedHandshake);
    }
    if ack[0] != SUPPORTED_VERSION {
        return Err(Error::ServerClientVersionDisagree);
    }

    debug!(?role, server_features, "handshake complete");
    Ok(server_features)
}

fn check_role_tag(role: Role, id: [u8; 4]) -> Result<()> {
    match role {
        Role::Uamp if id == ROLE_TAG_MVISP => {
            warn!("UAMP client contacted an MVISP server");
            Err(Error::UampClientMvispServer)
        }
        Role::Uamp if id != ROLE_TAG_UAMP => Err(Error::ServerUnknownHandshake),
        Role::Mvisp if id == ROLE_TAG_UAMP => {
            warn!("MVISP client contacted a UAMP server");
            Err(Error::MvispClientUampServer)
        }
        Role::Mvisp if id != ROLE_TAG_MVISP => Err(Error::ServerUnknownHandshake),
        _ => Ok(()),
    }
}

fn check_shared_version(server_versions: u8) -> Result<()> {
    if server_versions & SUPPORTED_VERSION == 0 {
        Err(Error::NoSharedVersion)
    } else {
        Ok(())
    }
}

fn check_feature_downgrade(supported_features: u32, server_features: u32) -> Result<()> {
    use crate::wire::{SUPPORTS_3D, SUPPORTS_ADD_REMOVE};

    if server_features & SUPPORTS_3D != 0 && supported_features & SUPPORTS_3D == 0 {
        Err(Error::TwoDClientThreeDServer)
    } else if server_features & SUPPORTS_ADD_REMOVE != 0
        && supported_features & SUPPORTS_ADD_REMOVE == 0
    {
        Err(Error::AddRemoveUnsupported)
    } else {
        Ok(())
    }
}
