//! One proxied connection: a client socket, the fixed-destination remote
//! socket it is paired with, and the state machine governing their
//! lifecycle.

use std::io::{Read, Write};
use std::time::Duration;

use mcrelay_protocol::{Parser, ParserCallbacks};
use mio::net::TcpStream;
use mio::Token;

use crate::pipe::Pipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Connecting,
    Relaying,
    Draining,
    Closed,
}

/// The remote socket's connect-complete event arrived: `Connecting` becomes
/// `Relaying`, anything else is left alone (a spurious writable event after
/// the session is already relaying, for instance).
#[must_use]
pub fn on_remote_connected(state: SessionState) -> SessionState {
    if state == SessionState::Connecting { SessionState::Relaying } else { state }
}

/// Either direction reported EOF while relaying: start draining.
#[must_use]
pub fn on_eof(state: SessionState) -> SessionState {
    if state == SessionState::Relaying { SessionState::Draining } else { state }
}

/// Both outbound queues are empty while draining: the session is done.
#[must_use]
pub fn on_queues_drained(state: SessionState, to_remote_empty: bool, to_client_empty: bool) -> SessionState {
    if state == SessionState::Draining && to_remote_empty && to_client_empty {
        SessionState::Closed
    } else {
        state
    }
}

const READ_CHUNK: usize = 16 * 1024;

pub struct Session<C1, C2> {
    pub id: usize,
    pub state: SessionState,
    pub client_token: Token,
    pub remote_token: Token,
    client: TcpStream,
    remote: TcpStream,
    client_eof: bool,
    remote_eof: bool,
    to_remote: Pipe,
    to_client: Pipe,
    client_parser: Parser<C1>,
    remote_parser: Parser<C2>,
    delay: Option<Duration>,
}

impl<C1: ParserCallbacks, C2: ParserCallbacks> Session<C1, C2> {
    pub fn new(
        id: usize,
        client: TcpStream,
        remote: TcpStream,
        client_token: Token,
        remote_token: Token,
        safe_mode: bool,
        client_observer: C1,
        remote_observer: C2,
        delay: Option<Duration>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            client_token,
            remote_token,
            client,
            remote,
            client_eof: false,
            remote_eof: false,
            to_remote: Pipe::new(),
            to_client: Pipe::new(),
            client_parser: Parser::new(safe_mode, client_observer),
            remote_parser: Parser::new(safe_mode, remote_observer),
            delay,
        }
    }

    pub fn client_socket_mut(&mut self) -> &mut TcpStream {
        &mut self.client
    }

    pub fn remote_socket_mut(&mut self) -> &mut TcpStream {
        &mut self.remote
    }

    /// Checks whether the non-blocking connect to the remote completed
    /// successfully. Called on the remote socket's first writable event
    /// while `Connecting`.
    pub fn poll_connect_complete(&mut self) -> std::io::Result<()> {
        if self.state != SessionState::Connecting {
            return Ok(());
        }
        match self.remote.take_error()? {
            Some(err) => Err(err),
            None => {
                self.state = on_remote_connected(self.state);
                Ok(())
            }
        }
    }

    /// Reads from the client socket, runs the bytes through the
    /// client-to-server observer, and enqueues them for the remote socket.
    pub fn pump_client_readable(&mut self) -> std::io::Result<()> {
        let mut buf = [0_u8; READ_CHUNK];
        loop {
            match self.client.read(&mut buf) {
                Ok(0) => {
                    self.client_eof = true;
                    self.state = on_eof(self.state);
                    break;
                }
                Ok(n) => {
                    self.observe_and_forward(&buf[..n], Direction::ClientToRemote);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Reads from the remote socket, runs the bytes through the
    /// server-to-client observer, and enqueues them for the client socket.
    pub fn pump_remote_readable(&mut self) -> std::io::Result<()> {
        let mut buf = [0_u8; READ_CHUNK];
        loop {
            match self.remote.read(&mut buf) {
                Ok(0) => {
                    self.remote_eof = true;
                    self.state = on_eof(self.state);
                    break;
                }
                Ok(n) => {
                    self.observe_and_forward(&buf[..n], Direction::RemoteToClient);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn observe_and_forward(&mut self, chunk: &[u8], direction: Direction) {
        match direction {
            Direction::ClientToRemote => {
                if self.client_parser.feed(chunk).is_err() {
                    tracing::warn!("client-to-server parser error on session {}", self.id);
                }
            }
            Direction::RemoteToClient => {
                if self.remote_parser.feed(chunk).is_err() {
                    tracing::warn!("server-to-client parser error on session {}", self.id);
                }
            }
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match direction {
            Direction::ClientToRemote => self.to_remote.push(chunk),
            Direction::RemoteToClient => self.to_client.push(chunk),
        }
    }

    /// Drains whatever is queued for the remote socket; `true` if fully
    /// drained.
    pub fn drain_to_remote(&mut self) -> std::io::Result<bool> {
        self.to_remote.drain_into(&mut self.remote)
    }

    /// Drains whatever is queued for the client socket; `true` if fully
    /// drained.
    pub fn drain_to_client(&mut self) -> std::io::Result<bool> {
        self.to_client.drain_into(&mut self.client)
    }

    /// Re-evaluates the draining-to-closed transition from current queue
    /// state. Call after every drain attempt.
    pub fn refresh_closed_state(&mut self) {
        self.state = on_queues_drained(self.state, self.to_remote.is_empty(), self.to_client.is_empty());
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ClientToRemote,
    RemoteToClient,
}
