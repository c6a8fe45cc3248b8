//! The session/handshake controller: connect, specification negotiation,
//! teardown, and the public command/advance/intersect/state-change surface.

use tracing::{debug, info};

use crate::agent::{Agent, Command, Update};
use crate::batcher::StateChangeBatcher;
use crate::config::SessionOptions;
use crate::error::{Error, Result};
use crate::handshake::perform_handshake;
use crate::io_buffer::FrameBuffer;
use crate::state_names::{validate_states, write_states};
use crate::transport::Transport;
use crate::wire::{Opcode, Role, MAX_TIME, SUPPORTS_3D, SUPPORTS_ADD_REMOVE};

/// A connected, handshook UAMP or MVISP session.
///
/// Single-threaded and cooperative-blocking: every public method may block
/// inside a socket read or write, and there is no re-entrancy or
/// thread-safety across two callers sharing one `Session`. A socket error
/// poisons the session; the only legal follow-up call afterward is
/// [`Session::terminate`].
pub struct Session {
    transport: Transport,
    buf: FrameBuffer,
    role: Role,
    server_features: u32,
    num_agents: u32,
    time_limit: u32,
    num_states: u32,
    agents: Vec<Agent>,
    largest_last_time: u32,
    smallest_current_time: u32,
    batcher: StateChangeBatcher,
    terminated: bool,
}

impl Session {
    /// UAMP connect: the client drives, requesting a simulation of
    /// `num_agents` agents running for `time_limit_secs` seconds, seeded
    /// with `seed`.
    pub fn connect(
        host: &str,
        port: u16,
        num_agents: u32,
        time_limit_secs: f64,
        seed: i64,
        supported_features: u32,
    ) -> Result<Session> {
        Self::connect_with_options(
            host,
            port,
            num_agents,
            time_limit_secs,
            seed,
            supported_features,
            SessionOptions::default(),
        )
    }

    pub fn connect_with_options(
        host: &str,
        port: u16,
        num_agents: u32,
        time_limit_secs: f64,
        seed: i64,
        supported_features: u32,
        options: SessionOptions,
    ) -> Result<Session> {
        if num_agents == 0 {
            return Err(Error::InvalidNumAgents);
        }
        if !(0.0..=MAX_TIME).contains(&time_limit_secs) {
            return Err(Error::InvalidTimeLimit);
        }

        let mut transport = Transport::connect(host, port)?;
        transport.apply_options(&options)?;
        let mut buf = FrameBuffer::new();
        let server_features =
            perform_handshake(&mut buf, &mut transport, Role::Uamp, supported_features)?;

        let time_limit = (time_limit_secs * 1000.0).round() as u32;

        buf.begin_write(12);
        buf.write_u32(&mut transport, num_agents)?;
        buf.write_u32(&mut transport, time_limit)?;
        buf.write_u32(&mut transport, seed as u32)?;

        let mut response = [0u8; 1];
        transport.read_all(&mut response)?;
        match response[0] {
            0x01 => return Err(Error::SimulationDenied),
            0x00 => {}
            _ => return Err(Error::SimulationResponseBad),
        }

        info!(num_agents, time_limit, "UAMP simulation accepted");

        let mut session = Session {
            transport,
            buf,
            role: Role::Uamp,
            server_features,
            num_agents,
            time_limit,
            num_states: 0,
            agents: (0..num_agents).map(|_| Agent::new()).collect(),
            largest_last_time: 0,
            smallest_current_time: 0,
            batcher: StateChangeBatcher::new(),
            terminated: false,
        };
        session.fill_update_queues()?;
        Ok(session)
    }

    /// MVISP connect: the server drives, offering a `(num_agents,
    /// time_limit)` specification to `accept`. Returning `false` denies the
    /// specification and the connection is torn down with
    /// [`Error::SimulationDenied`].
    pub fn mvisp_connect<F>(
        host: &str,
        port: u16,
        state_names: &[&[u8]],
        accept: F,
        supported_features: u32,
    ) -> Result<Session>
    where
        F: FnOnce(u32, f64) -> bool,
    {
        Self::mvisp_connect_with_options(
            host,
            port,
            state_names,
            accept,
            supported_features,
            SessionOptions::default(),
        )
    }

    pub fn mvisp_connect_with_options<F>(
        host: &str,
        port: u16,
        state_names: &[&[u8]],
        accept: F,
        supported_features: u32,
        options: SessionOptions,
    ) -> Result<Session>
    where
        F: FnOnce(u32, f64) -> bool,
    {
        validate_states(state_names)?;

        let mut transport = Transport::connect(host, port)?;
        transport.apply_options(&options)?;
        let mut buf = FrameBuffer::new();
        let server_features =
            perform_handshake(&mut buf, &mut transport, Role::Mvisp, supported_features)?;

        buf.begin_read(8);
        let num_agents = buf.read_u32(&mut transport)?;
        let time_limit = buf.read_u32(&mut transport)?;
        if num_agents == 0 {
            return Err(Error::MvispNoAgents);
        }

        let time_limit_secs = time_limit as f64 / 1000.0;
        // Agent ids travel as a signed field on the public Command surface;
        // a count beyond that capacity is rejected before the predicate
        // even runs, matching the original's `naInput > INT_MAX` short
        // circuit ahead of its accept callback.
        if num_agents > i32::MAX as u32 || !accept(num_agents, time_limit_secs) {
            buf.begin_write(4);
            buf.write_u32(&mut transport, 0)?;
            return Err(Error::SimulationDenied);
        }

        info!(num_agents, time_limit, "MVISP specification accepted");

        let mut session = Session {
            transport,
            buf,
            role: Role::Mvisp,
            server_features,
            num_agents,
            time_limit,
            num_states: state_names.len() as u32,
            agents: (0..num_agents).map(|_| Agent::new()).collect(),
            largest_last_time: 0,
            smallest_current_time: 0,
            batcher: StateChangeBatcher::new(),
            terminated: false,
        };
        write_states(&mut session.buf, &mut session.transport, state_names)?;
        session.fill_update_queues()?;
        Ok(session)
    }

    /// Flushes any buffered state changes and sends the termination frame.
    /// Idempotent: a second call is a no-op, and it is always safe to call
    /// after a failed connect leaves a session half-built.
    pub fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        let result = (|| -> Result<()> {
            if !self.batcher.is_empty() {
                self.batcher.flush(&mut self.buf, &mut self.transport)?;
            }
            self.buf.begin_write(5);
            self.buf
                .write_u8(&mut self.transport, Opcode::Terminate.into())?;
            self.buf.write_u32(&mut self.transport, 0)?;
            Ok(())
        })();

        self.transport.close();
        debug!("session terminated");
        result
    }

    pub fn current_command(&self, agent_id: u32) -> Command {
        debug_assert!(agent_id < self.num_agents, "invalid agent id");
        let agent = &self.agents[agent_id as usize];
        let last = agent.previous_update();
        let current = agent.current_update();
        to_current_command(agent_id, last, current)
    }

    /// An interpolated command clipped to
    /// `[largest_last_time, smallest_current_time]` across all agents —
    /// legal only once that window is non-empty.
    pub fn intersect_command(&self, agent_id: u32) -> Result<Command> {
        debug_assert!(agent_id < self.num_agents, "invalid agent id");
        if self.largest_last_time > self.smallest_current_time {
            return Err(Error::NoIntersection);
        }

        let agent = &self.agents[agent_id as usize];
        let last = agent.previous_update();
        let current = agent.current_update();

        if current.time == 0 {
            let x = current.x as f64 / 1000.0;
            let y = current.y as f64 / 1000.0;
            let z = current.z as f64 / 1000.0;
            return Ok(Command {
                agent_id,
                from_x: x,
                from_y: y,
                from_z: z,
                from_time: 0.0,
                to_x: x,
                to_y: y,
                to_z: z,
                to_time: 0.0,
                present: current.present != 0,
            });
        }

        let delta_x = current.x as f64 - last.x as f64;
        let delta_y = current.y as f64 - last.y as f64;
        let delta_z = current.z as f64 - last.z as f64;
        let delta_t = current.time as f64 - last.time as f64;

        let from_frac = (self.largest_last_time as f64 - last.time as f64) / delta_t;
        let to_frac = (self.smallest_current_time as f64 - last.time as f64) / delta_t;

        Ok(Command {
            agent_id,
            from_x: (last.x as f64 + from_frac * delta_x) / 1000.0,
            from_y: (last.y as f64 + from_frac * delta_y) / 1000.0,
            from_z: (last.z as f64 + from_frac * delta_z) / 1000.0,
            from_time: self.largest_last_time as f64 / 1000.0,
            to_x: (last.x as f64 + to_frac * delta_x) / 1000.0,
            to_y: (last.y as f64 + to_frac * delta_y) / 1000.0,
            to_z: (last.z as f64 + to_frac * delta_z) / 1000.0,
            to_time: self.smallest_current_time as f64 / 1000.0,
            present: last.present != 0,
        })
    }

    pub fn is_more(&self, agent_id: u32) -> bool {
        debug_assert!(agent_id < self.num_agents, "invalid agent id");
        self.agents[agent_id as usize].current_update().time < self.time_limit
    }

    /// Advances one agent to its next update, requesting more data from the
    /// server if that empties the queue down to its last alive slot.
    pub fn advance(&mut self, agent_id: u32) -> Result<()> {
        debug_assert!(agent_id < self.num_agents, "invalid agent id");

        let snapshot = self.agents[agent_id as usize].current_update();
        if snapshot.time == self.time_limit {
            return Err(Error::NoMoreData);
        }

        let needs_refill = self.agents[agent_id as usize].advance();
        if needs_refill {
            self.fill_update_queues()?;
        }

        if snapshot.time > self.largest_last_time {
            self.largest_last_time = snapshot.time;
        }
        if snapshot.time == self.smallest_current_time {
            self.smallest_current_time = self
                .agents
                .iter()
                .map(|a| a.current_update().time)
                .min()
                .unwrap_or(u32::MAX);
        }
        Ok(())
    }

    pub fn is_any_more(&self) -> bool {
        self.smallest_current_time < self.time_limit
    }

    /// Advances every agent currently at `smallest_current_time`, the
    /// synchronized-view idiom paired with [`Session::intersect_command`].
    pub fn advance_oldest(&mut self) -> Result<()> {
        let oldest = self.smallest_current_time;
        if oldest == self.time_limit {
            return Err(Error::NoMoreData);
        }
        for i in 0..self.num_agents {
            if self.agents[i as usize].current_update().time == oldest {
                self.advance(i)?;
            }
        }
        Ok(())
    }

    /// Queues a state-change annotation. A no-op on UAMP sessions
    /// (`num_states == 0`).
    pub fn change_state(&mut self, agent_id: u32, at_time_secs: f64, new_state: u32) -> Result<()> {
        if self.num_states == 0 {
            return Ok(());
        }
        if !(0.0..=MAX_TIME).contains(&at_time_secs) {
            return Err(Error::InvalidChangeTime);
        }
        let send_time = (at_time_secs * 1000.0).round() as u32;

        debug_assert!(agent_id < self.num_agents, "invalid agent id");
        if send_time > self.time_limit {
            return Err(Error::InvalidChangeTime);
        }
        if new_state >= self.num_states {
            return Err(Error::InvalidChangeState);
        }

        self.batcher
            .add(&mut self.buf, &mut self.transport, agent_id, send_time, new_state)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn num_agents(&self) -> u32 {
        self.num_agents
    }

    pub fn time_limit_secs(&self) -> f64 {
        self.time_limit as f64 / 1000.0
    }

    // ── prefetch ──────────────────────────────────────────────────────────

    /// Batches a `LOCATION_REQUEST` covering every agent's current need,
    /// splitting into multiple round-trips if the u32 request count would
    /// overflow.
    fn fill_update_queues(&mut self) -> Result<()> {
        let mut start_agent: u32 = 0;
        let mut total_requests: u32 = 0;

        for on_agent in 0..self.num_agents {
            let requests_for_agent = self.agents[on_agent as usize].num_to_request();
            let sum = total_requests.wrapping_add(requests_for_agent);
            if sum < total_requests || sum < requests_for_agent {
                self.request_updates(start_agent, total_requests)?;
                start_agent = on_agent;
                total_requests = requests_for_agent;
            } else {
                total_requests = sum;
            }
        }

        if total_requests != 0 {
            self.request_updates(start_agent, total_requests)?;
        }
        Ok(())
    }

    fn request_updates(&mut self, start_agent: u32, total_requests: u32) -> Result<()> {
        let total_write: u64 = 5 + 4 * total_requests as u64;
        let mut total_read: u64 = if self.server_features & SUPPORTS_3D != 0 {
            16 * total_requests as u64
        } else {
            12 * total_requests as u64
        };
        if self.server_features & SUPPORTS_ADD_REMOVE != 0 {
            total_read += total_requests as u64;
        }

        self.buf.begin_write(total_write);
        self.buf
            .write_u8(&mut self.transport, Opcode::LocationRequest.into())?;
        self.buf.write_u32(&mut self.transport, total_requests)?;

        let mut on_agent = start_agent;
        let mut on_request: u32 = 0;
        while on_request < total_requests {
            let requests_for_agent = self.agents[on_agent as usize].num_to_request();
            for _ in 0..requests_for_agent {
                self.buf.write_u32(&mut self.transport, on_agent)?;
            }
            on_request += requests_for_agent;
            on_agent += 1;
        }

        self.buf.begin_read(total_read);
        let mut on_agent = start_agent;
        let mut on_request: u32 = 0;
        while on_request < total_requests {
            let requests_for_agent = self.agents[on_agent as usize].num_to_request();
            for _ in 0..requests_for_agent {
                let time = self.buf.read_u32(&mut self.transport)?;
                let x = self.buf.read_u32(&mut self.transport)?;
                let y = self.buf.read_u32(&mut self.transport)?;
                let z = if self.server_features & SUPPORTS_3D != 0 {
                    self.buf.read_u32(&mut self.transport)?
                } else {
                    0
                };
                let present = if self.server_features & SUPPORTS_ADD_REMOVE != 0 {
                    self.buf.read_u8(&mut self.transport)?
                } else {
                    1
                };
                let update = Update {
                    time,
                    x,
                    y,
                    z,
                    present,
                };
                self.agents[on_agent as usize].receive_reply(update, self.time_limit)?;
            }
            on_request += requests_for_agent;
            on_agent += 1;
        }

        Ok(())
    }
}

fn to_current_command(agent_id: u32, last: Update, current: Update) -> Command {
    Command {
        agent_id,
        from_x: last.x as f64 / 1000.0,
        from_y: last.y as f64 / 1000.0,
        from_z: last.z as f64 / 1000.0,
        from_time: last.time as f64 / 1000.0,
        to_x: current.x as f64 / 1000.0,
        to_y: current.y as f64 / 1000.0,
        to_z: current.z as f64 / 1000.0,
        to_time: current.time as f64 / 1000.0,
        present: last.present != 0,
    }
}
