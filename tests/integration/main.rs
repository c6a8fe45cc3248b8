//! End-to-end tests against a hand-written mock UAMP/MVISP server.
//!
//! Each test spawns a `TcpListener` on an ephemeral port, runs the server
//! side of the protocol on a background thread using plain blocking
//! `std::net` I/O, and drives the real client through `uamp_core::Session`
//! on the main thread.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::thread::JoinHandle;

use uamp_core::{Error, Session};

fn read_exact(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).unwrap();
    buf
}

fn read_u32(stream: &mut TcpStream) -> u32 {
    let buf = read_exact(stream, 4);
    u32::from_be_bytes(buf.try_into().unwrap())
}

fn write_u32(stream: &mut TcpStream, v: u32) {
    stream.write_all(&v.to_be_bytes()).unwrap();
}

/// Reads the 9-byte handshake request and returns `(role_tag, features)`.
fn read_handshake_request(stream: &mut TcpStream) -> ([u8; 4], u32) {
    let mut tag = [0u8; 4];
    stream.read_exact(&mut tag).unwrap();
    let mut version = [0u8; 1];
    stream.read_exact(&mut version).unwrap();
    let features = read_u32(stream);
    (tag, features)
}

/// Replies to the handshake and version-confirm exchange, accepting.
fn accept_handshake(stream: &mut TcpStream, role_tag: [u8; 4], server_features: u32) {
    stream.write_all(&role_tag).unwrap();
    stream.write_all(&[0x80]).unwrap();
    write_u32(stream, server_features);

    let mut version_confirm = [0u8; 1];
    stream.read_exact(&mut version_confirm).unwrap();
    stream.write_all(&[0x80]).unwrap();
}

fn spawn_server<F>(body: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        body(stream);
    });
    (port, handle)
}

// ── Scenario 1: UAMP happy path ─────────────────────────────────────────────

#[test]
fn uamp_happy_path_two_agents_3d_add_remove() {
    const FEATURES: u32 = 0xC000_0000;
    const TIME_LIMIT_MS: u32 = 1000;
    const NUM_AGENTS: u32 = 2;

    let (port, server) = spawn_server(move |mut stream| {
        let (tag, _client_features) = read_handshake_request(&mut stream);
        assert_eq!(&tag, b"UAMP");
        accept_handshake(&mut stream, *b"UAMP", FEATURES);

        let num_agents = read_u32(&mut stream);
        let time_limit = read_u32(&mut stream);
        let _seed = read_u32(&mut stream);
        assert_eq!(num_agents, NUM_AGENTS);
        assert_eq!(time_limit, TIME_LIMIT_MS);
        stream.write_all(&[0x00]).unwrap();

        // One LocationRequest big enough to refill both agents' full queues.
        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x01);
        let count = read_u32(&mut stream);
        let agent_ids: Vec<u32> = (0..count).map(|_| read_u32(&mut stream)).collect();

        let mut next_time = [0u32; NUM_AGENTS as usize];
        for &agent_id in &agent_ids {
            let idx = agent_id as usize;
            let time = next_time[idx].min(TIME_LIMIT_MS);
            write_u32(&mut stream, time);
            write_u32(&mut stream, agent_id * 1000); // x
            write_u32(&mut stream, 0); // y
            write_u32(&mut stream, 0); // z (3D)
            stream.write_all(&[0x01]).unwrap(); // present
            next_time[idx] = (next_time[idx] + 200).min(TIME_LIMIT_MS);
        }

        // terminate
        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x00);
        let _ = read_u32(&mut stream);
    });

    let mut session =
        Session::connect("127.0.0.1", port, NUM_AGENTS, 1.0, 42, FEATURES).unwrap();

    let cmd = session.current_command(0);
    assert_eq!(cmd.from_time, 0.0);
    assert_eq!(cmd.to_time, 0.0);
    assert!(cmd.present);

    session.advance(0).unwrap();
    assert!(session.is_more(0));

    session.terminate().unwrap();
    server.join().unwrap();
}

// ── Scenario 2: UAMP feature mismatch ───────────────────────────────────────

#[test]
fn uamp_feature_mismatch_rejects_and_closes() {
    let (port, server) = spawn_server(move |mut stream| {
        let (tag, client_features) = read_handshake_request(&mut stream);
        assert_eq!(&tag, b"UAMP");
        assert_eq!(client_features, 0);

        // Server claims 3D support the client did not advertise.
        stream.write_all(b"UAMP").unwrap();
        stream.write_all(&[0x80]).unwrap();
        write_u32(&mut stream, 0x8000_0000);

        // Client should send a single best-effort reject byte, nothing more.
        let mut reject = [0u8; 1];
        let n = stream.read(&mut reject).unwrap_or(0);
        if n == 1 {
            assert_eq!(reject[0], 0x00);
        }
    });

    let result = Session::connect("127.0.0.1", port, 1, 1.0, 0, 0);
    assert_eq!(result.err(), Some(Error::TwoDClientThreeDServer));

    server.join().unwrap();
}

// ── Scenario 3: MVISP acceptance + state change ─────────────────────────────

#[test]
fn mvisp_acceptance_and_state_change() {
    let (port, server) = spawn_server(move |mut stream| {
        let (tag, _features) = read_handshake_request(&mut stream);
        assert_eq!(&tag, b"MVIS");
        accept_handshake(&mut stream, *b"MVIS", 0);

        write_u32(&mut stream, 3); // num_agents
        write_u32(&mut stream, 2000); // time_limit ms

        // state-name block: count, lengths, bytes
        let count = read_u32(&mut stream);
        assert_eq!(count, 2);
        let len_a = read_u32(&mut stream);
        let len_b = read_u32(&mut stream);
        assert_eq!((len_a, len_b), (1, 1));
        let names = read_exact(&mut stream, (len_a + len_b) as usize);
        assert_eq!(names, b"ab");

        // LocationRequest for the initial fill of 3 agents: each needs its
        // full 6-slot queue, replies strictly increasing per agent.
        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x01);
        let req_count = read_u32(&mut stream);
        let agent_ids: Vec<u32> = (0..req_count).map(|_| read_u32(&mut stream)).collect();
        let mut next_time = [0u32; 3];
        for &agent_id in &agent_ids {
            let idx = agent_id as usize;
            write_u32(&mut stream, next_time[idx]);
            write_u32(&mut stream, agent_id * 100);
            write_u32(&mut stream, 0);
            next_time[idx] = (next_time[idx] + 200).min(1000);
        }

        // state change frame
        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x02);
        let changes = read_u32(&mut stream);
        assert_eq!(changes, 1);
        let agent = read_u32(&mut stream);
        let time = read_u32(&mut stream);
        let new_state = read_u32(&mut stream);
        assert_eq!((agent, time, new_state), (1, 500, 1));

        // terminate frame
        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x00);
        let _ = read_u32(&mut stream);
    });

    let mut session = Session::mvisp_connect(
        "127.0.0.1",
        port,
        &[b"a", b"b"],
        |num_agents, time_limit_secs| {
            assert_eq!(num_agents, 3);
            assert_eq!(time_limit_secs, 2.0);
            true
        },
        0,
    )
    .unwrap();

    session.change_state(1, 0.5, 1).unwrap();
    session.terminate().unwrap();

    server.join().unwrap();
}

// ── Scenario 4: final-update duplication ────────────────────────────────────

#[test]
fn final_update_may_repeat_identically() {
    const TIME_LIMIT_MS: u32 = 500;

    let (port, server) = spawn_server(move |mut stream| {
        let (tag, _) = read_handshake_request(&mut stream);
        assert_eq!(&tag, b"UAMP");
        accept_handshake(&mut stream, *b"UAMP", 0);

        let num_agents = read_u32(&mut stream);
        let _time_limit = read_u32(&mut stream);
        let _seed = read_u32(&mut stream);
        assert_eq!(num_agents, 1);
        stream.write_all(&[0x00]).unwrap();

        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        let count = read_u32(&mut stream);
        for _ in 0..count {
            let _agent_id = read_u32(&mut stream);
        }

        // First update at time 0, then immediately the final update,
        // repeated a second time — the queue still has slack (capacity 6,
        // only 2 of 6 requested slots used so far in this reply batch).
        let replies = [0u32, TIME_LIMIT_MS, TIME_LIMIT_MS, TIME_LIMIT_MS];
        let mut sent = 0u32;
        for &time in replies.iter().take(count as usize) {
            write_u32(&mut stream, time);
            write_u32(&mut stream, 0);
            write_u32(&mut stream, 0);
            sent += 1;
        }
        // Drain any remaining requested slots by repeating the final reply.
        while sent < count {
            write_u32(&mut stream, TIME_LIMIT_MS);
            write_u32(&mut stream, 0);
            write_u32(&mut stream, 0);
            sent += 1;
        }

        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x00);
        let _ = read_u32(&mut stream);
    });

    // The construction call above already drove `fill_update_queues`; it
    // succeeding at all is the main assertion — a byte mismatch in the
    // repeated final update would have surfaced as `NonEqualFinalUpdates`.
    let mut session = Session::connect("127.0.0.1", port, 1, 0.5, 0, 0).unwrap();
    assert!(session.is_more(0));
    session.terminate().unwrap();
    server.join().unwrap();
}

// ── Scenario 5: timestamp regression poisons the session ────────────────────

#[test]
fn timestamp_regression_is_rejected() {
    let (port, server) = spawn_server(move |mut stream| {
        let (tag, _) = read_handshake_request(&mut stream);
        assert_eq!(&tag, b"UAMP");
        accept_handshake(&mut stream, *b"UAMP", 0);

        let num_agents = read_u32(&mut stream);
        let _time_limit = read_u32(&mut stream);
        let _seed = read_u32(&mut stream);
        assert_eq!(num_agents, 1);
        stream.write_all(&[0x00]).unwrap();

        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        let count = read_u32(&mut stream);
        for _ in 0..count {
            let _agent_id = read_u32(&mut stream);
        }

        // First reply is the mandatory zero-time start. Second reply
        // repeats that same time instead of increasing — a protocol
        // violation the client must reject.
        write_u32(&mut stream, 0);
        write_u32(&mut stream, 0);
        write_u32(&mut stream, 0);
        write_u32(&mut stream, 0);
        write_u32(&mut stream, 0);
        write_u32(&mut stream, 0);

        // The client errors out before requesting further slots; this
        // connection is simply dropped once the test thread exits.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });

    let result = Session::connect("127.0.0.1", port, 1, 1.0, 0, 0);
    assert_eq!(result.err(), Some(Error::TimestampNotIncremented));

    server.join().unwrap();
}

// ── Scenario 6: advance_oldest synchronized view ────────────────────────────

#[test]
fn advance_oldest_recomputes_synchronized_window() {
    const TIME_LIMIT_MS: u32 = 2000;
    const NUM_AGENTS: u32 = 3;

    let (port, server) = spawn_server(move |mut stream| {
        let (tag, _) = read_handshake_request(&mut stream);
        assert_eq!(&tag, b"UAMP");
        accept_handshake(&mut stream, *b"UAMP", 0);

        let num_agents = read_u32(&mut stream);
        let _time_limit = read_u32(&mut stream);
        let _seed = read_u32(&mut stream);
        assert_eq!(num_agents, NUM_AGENTS);
        stream.write_all(&[0x00]).unwrap();

        // Each agent's queue fills with 6 strictly increasing replies: the
        // mandatory zero-time start, the agent's "current" target (300 or
        // 500 ms), then a ramp up to the time limit.
        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x01);
        let count = read_u32(&mut stream);
        let agent_ids: Vec<u32> = (0..count).map(|_| read_u32(&mut stream)).collect();

        let targets = [300u32, 500, 500];
        let ramps: Vec<Vec<u32>> = targets
            .iter()
            .map(|&target| {
                let step = (TIME_LIMIT_MS - target) / 4;
                vec![
                    0,
                    target,
                    target + step,
                    target + 2 * step,
                    target + 3 * step,
                    TIME_LIMIT_MS,
                ]
            })
            .collect();
        let mut sent_per_agent = [0usize; NUM_AGENTS as usize];
        for &agent_id in &agent_ids {
            let idx = agent_id as usize;
            let time = ramps[idx][sent_per_agent[idx]];
            write_u32(&mut stream, time);
            write_u32(&mut stream, 0);
            write_u32(&mut stream, 0);
            sent_per_agent[idx] += 1;
        }

        let mut opcode = [0u8; 1];
        stream.read_exact(&mut opcode).unwrap();
        assert_eq!(opcode[0], 0x00);
        let _ = read_u32(&mut stream);
    });

    let mut session =
        Session::connect("127.0.0.1", port, NUM_AGENTS, TIME_LIMIT_MS as f64 / 1000.0, 0, 0)
            .unwrap();

    // Advance each agent past the zero-time sentinel so their "current"
    // update is the real first sample (300 ms for agent 0, 500 ms for 1/2).
    for agent_id in 0..NUM_AGENTS {
        session.advance(agent_id).unwrap();
    }

    for agent_id in 0..NUM_AGENTS {
        let cmd = session.intersect_command(agent_id).unwrap();
        assert_eq!(cmd.to_time, 0.300);
    }

    session.advance_oldest().unwrap();
    assert!(session.is_any_more());

    session.terminate().unwrap();
    server.join().unwrap();
}
