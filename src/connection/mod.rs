//! Drive Connections
//!
//! Everything between an operation and the socket: the per-drive slots,
//! the session that owns each TCP stream, and the state machine that pairs
//! inbound frames with the request waiting for them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ConnectionManager                         │
//! │                                                             │
//! │   slot 0: Mutex<Slot>     slot 1: Mutex<Slot>     ...       │
//! │   ├── KeyGenerator        ├── KeyGenerator                  │
//! │   └── Session             └── Session                       │
//! └───────────┬─────────────────────────┬───────────────────────┘
//!             │ acquire(i) -> DriveGuard│
//!             ▼                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Session                              │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────┐     │
//! │  │ Write frame │───>│ Read bytes  │───>│  Correlator  │     │
//! │  └─────────────┘    └─────────────┘    └──────┬───────┘     │
//! │                            ▲                  │             │
//! │                            └── need more ─────┤             │
//! │                                               ▼             │
//! │                                  ┌──────────────────────┐   │
//! │                                  │ ChunkReassembler     │   │
//! │                                  │ (GET values only)    │   │
//! │                                  └──────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Single flight**: one outstanding request per drive, later callers queue
//! - **Self-healing**: exhausted, timed out or broken sessions are replaced
//! - **Statistics**: shared [`ConnectionStats`] counters across all drives

pub mod correlator;
pub mod handler;
pub mod manager;
pub mod reassembly;

pub use correlator::{Correlator, Event, Phase, Resolution};
pub use handler::{ConnectionStats, Session};
pub use manager::{ConnectionManager, DriveGuard, SlotPhase, SocketInfo};
pub use reassembly::ChunkReassembler;
