//! # machina-repl — the REPL/RPC side channel
//!
//! Each actor may expose a side-channel RPC endpoint at a filesystem-
//! advertised address: a Unix domain socket, whose path is written to a
//! "dir file" keyed by machine id so another process can find it without
//! a separate registry. [`Server`] binds the socket and serves
//! request/response JSON with numeric opcodes (see [`Opcode`]) over it,
//! using the same typed-arg conventions as in-process dispatch —
//! [`machina_core::MutationWire`] strips non-transportable fields before
//! a mutation crosses the socket.

#![deny(missing_docs)]

mod error;
mod server;
mod wire;

pub use error::ReplError;
pub use server::Server;
pub use wire::{Opcode, Request, Response};
