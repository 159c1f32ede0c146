//! Multi-room, line-based chat relay over TCP.
//!
//! Clients connect, send their id as the first line, then exchange plain text
//! lines that are broadcast to everyone, to the room they joined, or
//! whispered to one recipient. Each module owns one responsibility:
//!
//! - [`registry`] maps online client ids to their outbound sinks and purges
//!   clients whose sink has failed.
//! - [`rooms`] tracks room membership; rooms vanish when their last member
//!   leaves and room numbers are never reused.
//! - [`broadcaster`] fans a line out to everyone, one room, or one client.
//! - [`command`] parses inbound lines into commands.
//! - [`session`] drives one connection from handshake to disconnect.
//! - [`server`] accepts TCP connections and spawns a session per client.
//! - [`client`] is a terminal client for the same line protocol.
//! - [`message`] holds line framing helpers and every server notice.
//! - [`cli`] parses the command line for server and client modes.
//!
//! The registry and the room table are plain values shared through `Arc`, so
//! independent chat instances can run side by side in one process.

pub mod broadcaster;
pub mod cli;
pub mod client;
pub mod command;
pub mod message;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod session;
