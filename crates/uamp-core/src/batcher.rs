//! Outbound state-change batching for MVISP sessions.

use tracing::debug;

use crate::error::Result;
use crate::io_buffer::FrameBuffer;
use crate::transport::Transport;
use crate::wire::{Opcode, STATE_CHANGE_BUFFER_SIZE};

#[derive(Debug, Clone, Copy)]
struct StateChange {
    agent_id: u32,
    time_ms: u32,
    new_state: u32,
}

/// Accumulates `(agent, time, new_state)` triples and flushes them in one
/// framed batch, either on demand or automatically once
/// [`STATE_CHANGE_BUFFER_SIZE`] entries have queued up.
#[derive(Default)]
pub struct StateChangeBatcher {
    pending: Vec<StateChange>,
}

impl StateChangeBatcher {
    pub fn new() -> Self {
        StateChangeBatcher {
            pending: Vec::with_capacity(STATE_CHANGE_BUFFER_SIZE),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queues a change, flushing immediately if the buffer is now full.
    pub fn add(
        &mut self,
        buf: &mut FrameBuffer,
        transport: &mut Transport,
        agent_id: u32,
        time_ms: u32,
        new_state: u32,
    ) -> Result<()> {
        self.pending.push(StateChange {
            agent_id,
            time_ms,
            new_state,
        });
        if self.pending.len() == STATE_CHANGE_BUFFER_SIZE {
            self.flush(buf, transport)?;
        }
        Ok(())
    }

    /// Writes every queued change as one `StateChanges` frame and empties
    /// the buffer. A no-op when nothing is queued.
    pub fn flush(&mut self, buf: &mut FrameBuffer, transport: &mut Transport) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let total: u64 = 5 + 12 * self.pending.len() as u64;
        buf.begin_write(total);
        buf.write_u8(transport, Opcode::StateChanges.into())?;
        buf.write_u32(transport, self.pending.len() as u32)?;
        for change in &self.pending {
            buf.write_u32(transport, change.agent_id)?;
            buf.write_u32(transport, change.time_ms)?;
            buf.write_u32(transport, change.new_state)?;
        }
        debug!(count = self.pending.len(), "flushed state changes");
        self.pending.clear();
        Ok(())
    }
}
