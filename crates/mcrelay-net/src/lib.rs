//! Single-threaded cooperative TCP proxy reactor.
//!
//! Accepts client connections on a bound listener, opens a remote connection
//! to a fixed destination for each one, and pumps bytes in both directions
//! through an `mio` poll loop. Every chunk read from either socket is fed to
//! that direction's [`mcrelay_protocol::Parser`] before being queued for
//! forwarding, so an observer sees traffic in the exact chunking it arrived
//! in without altering a single byte on the wire.

mod error;
mod pipe;
mod reactor;
mod session;

pub use error::{NetError, Result};
pub use reactor::{ObserverFactory, Reactor};
pub use session::{Session, SessionState};
