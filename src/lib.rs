//! # kinetic - A Multi-Drive Kinetic Protocol Client
//!
//! Client-side session management for Kinetic key-value drives. Each drive
//! speaks a framed, HMAC-authenticated protocol over its own TCP connection;
//! this crate keeps one session per drive, stamps every request with the
//! session's sequence number and identity, pairs responses with requests and
//! reassembles values that arrive over many reads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            KineticClient                                │
//! │        put / get / delete / capacity / least_full_drive                 │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │ acquire(drive)
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ConnectionManager                               │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────┐             │
//! │  │ slot 0         │  │ slot 1         │  │ slot N         │             │
//! │  │ KeyGenerator   │  │ KeyGenerator   │  │ KeyGenerator   │             │
//! │  │ Session        │  │ Session        │  │ Session        │             │
//! │  │  ├ Sequencer   │  │  ├ Sequencer   │  │  ├ Sequencer   │             │
//! │  │  └ Correlator  │  │  └ Correlator  │  │  └ Correlator  │             │
//! │  └───────┬────────┘  └───────┬────────┘  └───────┬────────┘             │
//! └──────────┼───────────────────┼───────────────────┼──────────────────────┘
//!            │ TCP               │ TCP               │ TCP
//!            ▼                   ▼                   ▼
//!        drive 0             drive 1             drive N
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────┬──────────────┬──────────────┬────────────────────┬─────────────┐
//! │ 'F'  │ message_len  │ value_len    │ structured message │ raw value   │
//! │ 1 B  │ u32 BE       │ u32 BE       │ message_len bytes  │ value_len B │
//! └──────┴──────────────┴──────────────┴────────────────────┴─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use kinetic::{ByteRange, ClientConfig, Drive, KineticClient, WriteOptions};
//!
//! #[tokio::main]
//! async fn main() -> kinetic::Result<()> {
//!     let drives = vec![Drive::new("10.0.0.1", 8123), Drive::new("10.0.0.2", 8123)];
//!     let client = KineticClient::connect(ClientConfig::new(drives)).await?;
//!
//!     let (drive, key) = client.put_balanced(b"payload", WriteOptions::default()).await?;
//!     let value = client.get(drive, &key, ByteRange::Full).await?.into_bytes();
//!     assert_eq!(&value[..], b"payload");
//!
//!     client.delete_by_key(&key, WriteOptions::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: frame header, structured messages, codec and parser
//! - [`session`]: drive identity, sequence numbers and object keys
//! - [`connection`]: sessions, the connection manager and the correlator
//! - [`client`]: the operation API
//! - [`config`]: client settings
//! - [`error`]: the error type shared by every layer
//!
//! ## Design Highlights
//!
//! ### Single Flight Per Drive
//!
//! Each drive slot sits behind an async mutex. The caller holding it writes
//! its request and drives the read loop until the response arrives, so there
//! is never more than one outstanding request per socket and no background
//! reader task.
//!
//! ### Session Replacement
//!
//! When a session runs out of sequence numbers or a request times out, the
//! slot opens a new connection and swaps it in. Keys keep counting across
//! the swap because the key generator belongs to the slot.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod testing;

pub use client::{ByteRange, KineticClient, ValueStream};
pub use config::ClientConfig;
pub use connection::{ConnectionStats, SlotPhase, SocketInfo};
pub use error::{KineticError, Result};
pub use protocol::{Credentials, DriveCapacity, Synchronization, WriteOptions};
pub use session::{fragment_key, Drive, DEFAULT_DRIVE_PORT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
