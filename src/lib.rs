//! Client library for TLS challenge servers gated by a SHA-1 proof-of-work.
//!
//! The server speaks a line-oriented protocol: after a `HELO` handshake it
//! issues a `POW <authdata> <difficulty>` challenge, and once the puzzle is
//! solved it asks a sequence of identity questions whose answers must be
//! tagged with `hex-sha1(authdata || challenge)`. The hot path is
//! [`solver::PowSolver`], a multi-threaded brute-force search over 64-bit
//! nonces encoded as decimal text.

pub mod bench;
pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod solver;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, Identity};
pub use error::{ClientError, ConfigError, SolveError};
pub use protocol::Session;
pub use solver::{PowSolver, PowSolverBuilder};
pub use transport::{TlsTransport, Transport};
