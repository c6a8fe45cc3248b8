//! Per-agent update ring and the public [`Command`] surface derived from it.

use crate::error::{Error, Result};
use crate::wire::UPDATE_QUEUE_SIZE;

/// One decoded server update: a point in time and space for one agent.
///
/// `z` is forced to 0 and `present` to 1 when the session did not negotiate
/// 3D / add-remove support respectively — callers never see "unsupported"
/// values bleed through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Update {
    pub time: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub present: u8,
}

/// A command surfaced to the caller: a from/to pair of points, in seconds
/// and metres, plus whether the agent was present at the "from" point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub agent_id: u32,
    pub from_x: f64,
    pub from_y: f64,
    pub from_z: f64,
    pub from_time: f64,
    pub to_x: f64,
    pub to_y: f64,
    pub to_z: f64,
    pub to_time: f64,
    pub present: bool,
}

/// A single agent's bounded update queue: a ring of [`UPDATE_QUEUE_SIZE`]
/// slots, a consumer cursor (`current_index`) and a producer cursor
/// (`recv_index`).
#[derive(Debug, Clone)]
pub struct Agent {
    updates: [Update; UPDATE_QUEUE_SIZE],
    current_index: usize,
    recv_index: usize,
    alive_in_queue: u32,
    received_final: bool,
}

impl Default for Agent {
    fn default() -> Self {
        Agent {
            updates: [Update::default(); UPDATE_QUEUE_SIZE],
            current_index: 0,
            recv_index: 0,
            alive_in_queue: 0,
            received_final: false,
        }
    }
}

impl Agent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_update(&self) -> Update {
        self.updates[self.current_index]
    }

    /// The "previous" update: the current slot itself if the agent has
    /// never advanced (current time is still 0), otherwise the ring slot
    /// immediately behind `current_index`.
    pub fn previous_update(&self) -> Update {
        if self.updates[self.current_index].time == 0 {
            self.updates[self.current_index]
        } else if self.current_index == 0 {
            self.updates[UPDATE_QUEUE_SIZE - 1]
        } else {
            self.updates[self.current_index - 1]
        }
    }

    pub fn received_final(&self) -> bool {
        self.received_final
    }

    pub fn alive_in_queue(&self) -> u32 {
        self.alive_in_queue
    }

    /// How many more updates this agent needs requested, given its queue
    /// capacity and whether the final update has already arrived.
    pub fn num_to_request(&self) -> u32 {
        if self.received_final {
            0
        } else {
            UPDATE_QUEUE_SIZE as u32 - self.alive_in_queue
        }
    }

    /// Consumer-side advance: retires the current update (unless it's the
    /// unstarted sentinel at time 0) and moves to the next ring slot.
    /// Returns `true` when the queue has only its new current update left
    /// and must be refilled.
    pub fn advance(&mut self) -> bool {
        if self.updates[self.current_index].time != 0 {
            self.alive_in_queue -= 1;
        }
        self.current_index = (self.current_index + 1) % UPDATE_QUEUE_SIZE;
        self.alive_in_queue == 1
    }

    /// Decodes and verifies one server reply into the next producer slot.
    ///
    /// Verification order matches the wire spec exactly: first-ever reply
    /// must have `time == 0`; once `received_final` is set, every further
    /// reply must be byte-identical to the one before it; otherwise time
    /// must strictly increase and stay within `time_limit`; `present` must
    /// be 0 or 1 regardless.
    pub fn receive_reply(&mut self, update: Update, time_limit: u32) -> Result<()> {
        if self.alive_in_queue == 0 {
            if update.time != 0 {
                return Err(Error::FirstUpdateTime);
            }
        } else {
            let prev_index = if self.recv_index == 0 {
                UPDATE_QUEUE_SIZE - 1
            } else {
                self.recv_index - 1
            };
            let previous = self.updates[prev_index];

            if self.received_final {
                if update != previous {
                    return Err(Error::NonEqualFinalUpdates);
                }
            } else {
                if update.time <= previous.time {
                    return Err(Error::TimestampNotIncremented);
                }
                if update.time > time_limit {
                    return Err(Error::TimestampTooLarge);
                }
                if update.time == time_limit {
                    self.received_final = true;
                }
            }
        }

        if update.present != 0 && update.present != 1 {
            return Err(Error::InvalidPresentFlag);
        }

        self.updates[self.recv_index] = update;
        self.alive_in_queue += 1;
        self.recv_index = (self.recv_index + 1) % UPDATE_QUEUE_SIZE;
        Ok(())
    }
}
