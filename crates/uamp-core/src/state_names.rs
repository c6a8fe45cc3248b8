//! MVISP state-name validation and wire emission.
//!
//! A session offering state-change annotations declares its state names
//! once, at `mvisp_connect` time. This module checks the declared names are
//! well-formed and distinct, then writes them as a single framed block.

use crate::error::{Error, Result};
use crate::io_buffer::FrameBuffer;
use crate::transport::Transport;
use crate::wire::{MAX_STATE_NAME_LEN, MIN_STATE_NAME_LEN};

/// Validates `names`: at least one name, each within the legal length
/// bounds, no two byte-equal. Returns nothing on success — callers already
/// have each name's length via `names[i].len()`.
pub fn validate_states(names: &[&[u8]]) -> Result<()> {
    if names.is_empty() || names.len() > u32::MAX as usize {
        return Err(Error::InvalidNumberStates);
    }

    for (i, name) in names.iter().enumerate() {
        if name.len() < MIN_STATE_NAME_LEN {
            return Err(Error::ZeroStateLength);
        }
        if name.len() > MAX_STATE_NAME_LEN {
            return Err(Error::StateLengthLong);
        }
        for prior in &names[..i] {
            if prior == name {
                return Err(Error::DuplicateState);
            }
        }
    }
    Ok(())
}

/// Writes the validated state-name block: u32 count, u32×count lengths,
/// then the raw name bytes in order.
pub fn write_states(
    buf: &mut FrameBuffer,
    transport: &mut Transport,
    names: &[&[u8]],
) -> Result<()> {
    let total: u64 = 4 + 4 * names.len() as u64 + names.iter().map(|n| n.len() as u64).sum::<u64>();
    buf.begin_write(total);
    buf.write_u32(transport, names.len() as u32)?;
    for name in names {
        buf.write_u32(transport, name.len() as u32)?;
    }
    for name in names {
        buf.write_bytes(transport, name)?;
    }
    Ok(())
}
