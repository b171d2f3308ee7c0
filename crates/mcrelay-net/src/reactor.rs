//! The single-threaded cooperative event loop: accepts client connections,
//! opens the paired remote connection, and pumps bytes between them until
//! both sides are drained.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use mcrelay_protocol::ParserCallbacks;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use crate::error::Result;
use crate::session::Session;

const LISTENER_TOKEN: Token = Token(usize::MAX);

fn client_token(id: usize) -> Token {
    Token(id * 2)
}

fn remote_token(id: usize) -> Token {
    Token(id * 2 + 1)
}

fn session_id_of(token: Token) -> usize {
    token.0 / 2
}

fn is_client_side(token: Token) -> bool {
    token.0 % 2 == 0
}

/// Builds the pair of per-direction observers for a freshly-accepted
/// session. Called once per connection so each session gets its own
/// observer state (a logger that tracks per-connection position history,
/// for instance).
pub trait ObserverFactory<C1, C2> {
    fn make(&mut self) -> (C1, C2);
}

impl<C1, C2, F: FnMut() -> (C1, C2)> ObserverFactory<C1, C2> for F {
    fn make(&mut self) -> (C1, C2) {
        (self)()
    }
}

pub struct Reactor<C1, C2, F> {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    destination: SocketAddr,
    safe_mode: bool,
    delay: Option<Duration>,
    observer_factory: F,
    sessions: HashMap<usize, Session<C1, C2>>,
    next_id: usize,
}

impl<C1, C2, F> Reactor<C1, C2, F>
where
    C1: ParserCallbacks,
    C2: ParserCallbacks,
    F: ObserverFactory<C1, C2>,
{
    pub fn bind(
        bind_addr: SocketAddr,
        destination: SocketAddr,
        safe_mode: bool,
        delay: Option<Duration>,
        observer_factory: F,
    ) -> Result<Self> {
        let mut listener = TcpListener::bind(bind_addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            destination,
            safe_mode,
            delay,
            observer_factory,
            sessions: HashMap::new(),
            next_id: 0,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Blocks on one `poll` call and handles whatever events it reports.
    /// Callers loop this for the process lifetime.
    pub fn turn(&mut self) -> Result<()> {
        self.poll.poll(&mut self.events, None)?;
        self.handle_events()
    }

    fn handle_events(&mut self) -> Result<()> {
        let tokens: Vec<(Token, bool, bool)> =
            self.events.iter().map(|event| (event.token(), event.is_readable(), event.is_writable())).collect();

        for (token, readable, writable) in tokens {
            if token == LISTENER_TOKEN {
                self.accept_all()?;
                continue;
            }
            let id = session_id_of(token);
            let client_side = is_client_side(token);
            self.handle_session_event(id, client_side, readable, writable);
        }

        self.reap_closed();
        Ok(())
    }

    fn accept_all(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((client, addr)) => {
                    if let Err(err) = self.spawn_session(client) {
                        tracing::warn!("failed to open remote connection for {addr}: {err}");
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn spawn_session(&mut self, mut client: TcpStream) -> std::io::Result<()> {
        let mut remote = TcpStream::connect(self.destination)?;
        let id = self.next_id;
        self.next_id += 1;

        let c_token = client_token(id);
        let r_token = remote_token(id);
        self.poll.registry().register(&mut client, c_token, Interest::READABLE)?;
        self.poll.registry().register(&mut remote, r_token, Interest::READABLE | Interest::WRITABLE)?;

        let (client_observer, remote_observer) = self.observer_factory.make();
        let session =
            Session::new(id, client, remote, c_token, r_token, self.safe_mode, client_observer, remote_observer, self.delay);
        tracing::info!("session {id} opened, connecting to {}", self.destination);
        self.sessions.insert(id, session);
        Ok(())
    }

    fn handle_session_event(&mut self, id: usize, client_side: bool, readable: bool, writable: bool) {
        let Some(session) = self.sessions.get_mut(&id) else { return };

        if !client_side && writable {
            if let Err(err) = session.poll_connect_complete() {
                tracing::warn!("session {id} failed to connect to remote: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
            if let Err(err) = session.drain_to_remote() {
                tracing::warn!("session {id} write to remote failed: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
        }

        if client_side && writable {
            if let Err(err) = session.drain_to_client() {
                tracing::warn!("session {id} write to client failed: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
        }

        if client_side && readable {
            if let Err(err) = session.pump_client_readable() {
                tracing::debug!("session {id} client read ended: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
            if let Err(err) = session.drain_to_remote() {
                tracing::warn!("session {id} write to remote failed: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
        }

        if !client_side && readable {
            if let Err(err) = session.pump_remote_readable() {
                tracing::debug!("session {id} remote read ended: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
            if let Err(err) = session.drain_to_client() {
                tracing::warn!("session {id} write to client failed: {err}");
                session.state = crate::session::SessionState::Closed;
                return;
            }
        }

        session.refresh_closed_state();
    }

    fn reap_closed(&mut self) {
        let closed: Vec<usize> = self.sessions.iter().filter(|(_, s)| s.is_closed()).map(|(&id, _)| id).collect();
        for id in closed {
            if let Some(mut session) = self.sessions.remove(&id) {
                let _ = self.poll.registry().deregister(session.client_socket_mut());
                let _ = self.poll.registry().deregister(session.remote_socket_mut());
            }
            tracing::info!("session {id} closed");
        }
    }
}
