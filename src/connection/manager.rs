//! Connection Manager
//!
//! Holds one slot per configured drive. A slot owns the drive's key
//! generator and, once connected, its [`Session`]. Slots are guarded by an
//! async mutex, so at most one request is in flight per drive; a second
//! caller waits for the first to resolve.
//!
//! ```text
//!            connect() ok
//! Disconnected ──────────> Ready ─── fatal error ───> Failed
//!      │                    ▲  │                        │
//!      │ connect() err      │  └─ exhausted/timeout ─┐  │ next acquire()
//!      └──────> Failed      │     (replace)          │  │ reconnects
//!                           └────────────────────────┘──┘
//! ```

use crate::config::ClientConfig;
use crate::connection::correlator::{Phase, Resolution};
use crate::connection::handler::{ConnectionStats, Session};
use crate::error::{KineticError, Result};
use crate::protocol::codec::{self, Request};
use crate::session::{Drive, KeyGenerator, MAX_SEQUENCE};
use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Observable state of a drive slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    /// Never connected
    Disconnected,
    Ready,
    /// Last session was torn down; the next use reconnects
    Failed,
    /// A request is in flight
    Busy,
}

/// Snapshot of one drive slot, for introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketInfo {
    pub index: usize,
    pub drive: Drive,
    pub phase: SlotPhase,
    pub connection_id: Option<u64>,
    pub cluster_version: Option<u64>,
    /// Sequence number the next request will carry
    pub sequence: Option<u64>,
    /// lexiKey the next PUT will use
    pub lexi_key: Option<String>,
    pub correlator: Option<Phase>,
    pub pending_chunk_size: Option<u64>,
}

enum Link {
    Disconnected,
    Ready(Session),
    Failed,
}

struct Slot {
    link: Link,
    keys: KeyGenerator,
}

pub struct ConnectionManager {
    drives: Vec<Drive>,
    slots: Vec<Mutex<Slot>>,
    config: Arc<ClientConfig>,
    stats: Arc<ConnectionStats>,
}

impl ConnectionManager {
    pub fn new(config: Arc<ClientConfig>, stats: Arc<ConnectionStats>) -> Self {
        let drives = config.drives.clone();
        let slots = drives
            .iter()
            .map(|_| {
                Mutex::new(Slot {
                    link: Link::Disconnected,
                    keys: KeyGenerator::new(config.key_origin),
                })
            })
            .collect();

        Self {
            drives,
            slots,
            config,
            stats,
        }
    }

    pub fn drives(&self) -> &[Drive] {
        &self.drives
    }

    pub fn len(&self) -> usize {
        self.drives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Finds the slot configured for `host:port`.
    pub fn drive_index(&self, host: &str, port: u16) -> Option<usize> {
        self.drives
            .iter()
            .position(|d| d.host == host && d.port == port)
    }

    /// Finds the slot whose drive generated `key`.
    pub fn drive_index_for_key(&self, key: &[u8]) -> Option<usize> {
        self.drives.iter().position(|d| d.owns_key(key))
    }

    fn slot(&self, index: usize) -> Result<&Mutex<Slot>> {
        self.slots
            .get(index)
            .ok_or_else(|| KineticError::UnknownDrive(format!("slot {index}")))
    }

    async fn open(&self, index: usize) -> Result<Session> {
        Session::open(
            &self.drives[index],
            self.config.connect_timeout,
            Arc::clone(&self.stats),
        )
        .await
    }

    /// Opens the session for one slot. A ready slot is left alone.
    pub async fn connect(&self, index: usize) -> Result<()> {
        let mut slot = self.slot(index)?.lock().await;
        if matches!(slot.link, Link::Ready(_)) {
            return Ok(());
        }

        match self.open(index).await {
            Ok(session) => {
                slot.link = Link::Ready(session);
                Ok(())
            }
            Err(e) => {
                warn!(drive = %self.drives[index], error = %e, "Failed to connect");
                slot.link = Link::Failed;
                Err(e)
            }
        }
    }

    /// Connects every slot concurrently. Returns the first failure after
    /// all attempts have finished.
    pub async fn connect_all(&self) -> Result<()> {
        let results = join_all((0..self.slots.len()).map(|i| self.connect(i))).await;
        let ready = results.iter().filter(|r| r.is_ok()).count();
        info!(ready, total = self.slots.len(), "Drives connected");

        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    /// Takes exclusive use of a slot, waiting for any request in flight.
    ///
    /// A failed slot is reconnected here. A slot that was never connected
    /// yields `SessionNotReady`.
    pub async fn acquire(&self, index: usize) -> Result<DriveGuard<'_>> {
        let mut slot = self.slot(index)?.lock().await;

        // A caller dropped mid-exchange leaves a request unanswered and
        // possibly half written; the stream cannot be reused.
        let stale = match &slot.link {
            Link::Ready(session) => Some(session.phase()).filter(|p| *p != Phase::Idle),
            _ => None,
        };
        if let Some(phase) = stale {
            warn!(
                drive = %self.drives[index],
                ?phase,
                "Abandoned exchange left the session mid-request"
            );
            slot.link = Link::Failed;
        }

        match slot.link {
            Link::Ready(_) => {}
            Link::Disconnected => return Err(KineticError::SessionNotReady(index)),
            Link::Failed => {
                info!(drive = %self.drives[index], "Reconnecting failed session");
                slot.link = Link::Ready(self.open(index).await?);
            }
        }

        Ok(DriveGuard {
            index,
            drive: &self.drives[index],
            slot,
            manager: self,
        })
    }

    /// Snapshot of every slot. Slots with a request in flight report
    /// [`SlotPhase::Busy`].
    pub fn sockets(&self) -> Vec<SocketInfo> {
        (0..self.slots.len()).filter_map(|i| self.socket(i)).collect()
    }

    pub fn socket(&self, index: usize) -> Option<SocketInfo> {
        let drive = self.drives.get(index)?.clone();
        let mut info = SocketInfo {
            index,
            drive,
            phase: SlotPhase::Busy,
            connection_id: None,
            cluster_version: None,
            sequence: None,
            lexi_key: None,
            correlator: None,
            pending_chunk_size: None,
        };

        let Ok(slot) = self.slots[index].try_lock() else {
            return Some(info);
        };
        info.lexi_key = Some(slot.keys.lexi_key());
        match &slot.link {
            Link::Disconnected => info.phase = SlotPhase::Disconnected,
            Link::Failed => info.phase = SlotPhase::Failed,
            Link::Ready(session) => {
                let state = session.state();
                info.phase = SlotPhase::Ready;
                info.connection_id = Some(state.connection_id);
                info.cluster_version = Some(state.cluster_version);
                info.sequence = Some(state.sequencer.current());
                info.correlator = Some(session.phase());
                info.pending_chunk_size = session.pending_chunk_size();
            }
        }
        Some(info)
    }

    /// Overrides a slot's next sequence number. A value past the wire range
    /// replaces the session right away.
    pub async fn set_sequence(&self, index: usize, sequence: u64) -> Result<()> {
        let mut guard = self.acquire(index).await?;
        guard.set_sequence(sequence).await
    }
}

/// Exclusive access to one ready drive slot.
pub struct DriveGuard<'a> {
    index: usize,
    drive: &'a Drive,
    slot: MutexGuard<'a, Slot>,
    manager: &'a ConnectionManager,
}

impl<'a> DriveGuard<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn drive(&self) -> &'a Drive {
        self.drive
    }

    fn session(&mut self) -> Result<&mut Session> {
        match &mut self.slot.link {
            Link::Ready(session) => Ok(session),
            _ => Err(KineticError::SessionNotReady(self.index)),
        }
    }

    /// Generates the key for the next PUT on this drive.
    pub fn next_key(&mut self) -> Bytes {
        let drive = self.drive;
        self.slot.keys.next_key(drive)
    }

    /// Issues the next sequence number, replacing the session first if it
    /// has run out.
    pub async fn next_sequence(&mut self) -> Result<u64> {
        if let Some(sequence) = self.session()?.state_mut().sequencer.issue() {
            return Ok(sequence);
        }

        info!(drive = %self.drive, "Sequence space exhausted, replacing session");
        self.replace().await?;
        let index = self.index;
        self.session()?
            .state_mut()
            .sequencer
            .issue()
            .ok_or(KineticError::SessionNotReady(index))
    }

    pub async fn set_sequence(&mut self, sequence: u64) -> Result<()> {
        if sequence > MAX_SEQUENCE {
            info!(drive = %self.drive, sequence, "Sequence past wire range, replacing session");
            return self.replace().await;
        }
        self.session()?.state_mut().sequencer.set(sequence);
        Ok(())
    }

    /// Opens a fresh session and swaps it in. The old socket is closed once
    /// the new one is ready. On failure the slot is marked failed.
    pub async fn replace(&mut self) -> Result<()> {
        let manager = self.manager;
        match manager.open(self.index).await {
            Ok(fresh) => {
                manager.stats.session_replaced();
                let old = std::mem::replace(&mut self.slot.link, Link::Ready(fresh));
                drop(old);
                Ok(())
            }
            Err(e) => {
                warn!(drive = %self.drive, error = %e, "Session replacement failed");
                self.slot.link = Link::Failed;
                Err(e)
            }
        }
    }

    fn tear_down(&mut self, cause: &KineticError) {
        warn!(drive = %self.drive, error = %cause, "Tearing down session");
        self.slot.link = Link::Failed;
    }

    /// Sends one request and waits for its response.
    ///
    /// Errors that leave the stream in an unknown state tear the session
    /// down. A timeout replaces it before reporting `Timeout`.
    pub async fn exchange(&mut self, request: Request<'_>) -> Result<Resolution> {
        let sequence = self.next_sequence().await?;
        let manager = self.manager;
        let drive = self.drive;
        let kind = request.kind();
        let timeout = manager.config.operation_timeout;

        let session = self.session()?;
        let stamp = session.state().stamp(sequence);
        let frame = codec::encode(&request, &stamp, &manager.config.credentials)?;
        debug!(drive = %drive, op = %kind, sequence, bytes = frame.len(), "Sending request");

        match tokio::time::timeout(timeout, session.exchange(kind, frame)).await {
            Ok(Ok(resolution)) => Ok(resolution),
            Ok(Err(e)) => {
                if e.is_fatal() {
                    self.tear_down(&e);
                }
                Err(e)
            }
            Err(_) => {
                warn!(drive = %drive, op = %kind, sequence, ?timeout, "Request timed out");
                if let Err(e) = self.replace().await {
                    debug!(drive = %drive, error = %e, "Could not replace timed out session");
                }
                Err(KineticError::Timeout(timeout))
            }
        }
    }
}
