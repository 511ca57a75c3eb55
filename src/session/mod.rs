//! Session State
//!
//! Per-drive bookkeeping that outlives individual requests: the drive's
//! address, the identity negotiated by the handshake, the request sequence
//! and the key counter.
//!
//! ```text
//! DriveSlot (connection manager)
//! ├── KeyGenerator          survives session replacement
//! └── Session (socket)
//!     └── SessionState      connection_id, cluster_version, Sequencer
//! ```

pub mod sequencer;
pub mod state;

pub use sequencer::{fragment_key, KeyGenerator, Sequencer, MAX_SEQUENCE};
pub use state::{Drive, InvalidDriveAddress, SessionState, DEFAULT_DRIVE_PORT};
