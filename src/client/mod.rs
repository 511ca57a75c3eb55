//! Operation API
//!
//! [`KineticClient`] is the surface callers use: PUT a value and get back
//! the key the client generated for it, GET a value (optionally a byte
//! range of it), DELETE a key, and ask drives how full they are.
//!
//! Drives are addressed by slot index, in the order they were configured.
//! Keys embed the `host:port` of the drive that stored them, so the
//! `*_by_key` variants route without the caller keeping track of slots.
//!
//! ```ignore
//! use kinetic::{ByteRange, ClientConfig, Drive, KineticClient, WriteOptions};
//!
//! let config = ClientConfig::new(vec![Drive::new("10.0.0.1", 8123)]);
//! let client = KineticClient::connect(config).await?;
//!
//! let key = client.put(0, b"hello", WriteOptions::default()).await?;
//! let value = client.get(0, &key, ByteRange::Full).await?.into_bytes();
//! client.delete(0, &key, WriteOptions::default()).await?;
//! ```

mod value;

pub use value::{ByteRange, ValueStream};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionStats, Resolution, SocketInfo};
use crate::error::{KineticError, Result};
use crate::protocol::codec::{self, Request};
use crate::protocol::{DriveCapacity, LogType, OpKind, ParseError, WriteOptions};
use crate::session::Drive;
use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Multi-drive Kinetic client.
pub struct KineticClient {
    config: Arc<ClientConfig>,
    manager: ConnectionManager,
}

impl KineticClient {
    /// Builds a client without connecting. Operations fail with
    /// `SessionNotReady` until [`KineticClient::connect_all`] has run.
    pub fn new(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        let stats = Arc::new(ConnectionStats::new());
        let manager = ConnectionManager::new(Arc::clone(&config), stats);
        Self { config, manager }
    }

    /// Builds a client and connects to every configured drive.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config);
        client.connect_all().await?;
        Ok(client)
    }

    /// Connects every drive concurrently. Drives that fail are marked failed
    /// and retried on first use; the first failure is returned.
    pub async fn connect_all(&self) -> Result<()> {
        self.manager.connect_all().await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn drives(&self) -> &[Drive] {
        self.manager.drives()
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        self.manager.stats()
    }

    /// Stores `value` on drive `drive` under a freshly generated key and
    /// returns that key.
    pub async fn put(&self, drive: usize, value: &[u8], options: WriteOptions) -> Result<Bytes> {
        if value.len() > self.config.max_value_size {
            return Err(KineticError::ValueTooLarge {
                size: value.len(),
                max: self.config.max_value_size,
            });
        }
        let tag = codec::integrity_tag(&self.config.credentials.secret, value)?;

        let mut guard = self.manager.acquire(drive).await?;
        let key = guard.next_key();
        guard
            .exchange(Request::Put {
                key: &key,
                value,
                tag: &tag,
                options,
            })
            .await?;

        debug!(
            drive = %guard.drive(),
            key = %String::from_utf8_lossy(&key),
            bytes = value.len(),
            "PUT complete"
        );
        Ok(key)
    }

    /// Fetches the value stored under `key` on drive `drive`.
    ///
    /// An absent key, or a drive answering with an empty value, yields
    /// `ObjectNotFound`.
    pub async fn get(&self, drive: usize, key: &[u8], range: ByteRange) -> Result<ValueStream> {
        range.validate()?;

        let resolution = {
            let mut guard = self.manager.acquire(drive).await?;
            guard.exchange(Request::Get { key }).await?
        };

        match resolution {
            Resolution::Value { value, .. } => {
                debug!(drive, bytes = value.len(), ?range, "GET complete");
                Ok(ValueStream::new(range.apply(value)?))
            }
            Resolution::Ack(pdu) => Err(KineticError::UnexpectedResponse {
                expected: Some(OpKind::Get),
                received: pdu.message_type,
            }),
        }
    }

    /// Removes `key` from drive `drive`.
    pub async fn delete(&self, drive: usize, key: &[u8], options: WriteOptions) -> Result<()> {
        let mut guard = self.manager.acquire(drive).await?;
        guard.exchange(Request::Delete { key, options }).await?;
        debug!(drive = %guard.drive(), key = %String::from_utf8_lossy(key), "DELETE complete");
        Ok(())
    }

    /// Slot of the drive that generated `key`.
    pub fn drive_for_key(&self, key: &[u8]) -> Result<usize> {
        self.manager
            .drive_index_for_key(key)
            .ok_or_else(|| KineticError::UnknownDrive(String::from_utf8_lossy(key).into_owned()))
    }

    /// [`KineticClient::get`] on the drive named by the key's prefix.
    pub async fn get_by_key(&self, key: &[u8], range: ByteRange) -> Result<ValueStream> {
        let drive = self.drive_for_key(key)?;
        self.get(drive, key, range).await
    }

    /// [`KineticClient::delete`] on the drive named by the key's prefix.
    pub async fn delete_by_key(&self, key: &[u8], options: WriteOptions) -> Result<()> {
        let drive = self.drive_for_key(key)?;
        self.delete(drive, key, options).await
    }

    /// Asks drive `drive` for its capacity log.
    pub async fn capacity(&self, drive: usize) -> Result<DriveCapacity> {
        let mut guard = self.manager.acquire(drive).await?;
        let resolution = guard
            .exchange(Request::GetLog {
                types: &[LogType::Capacities],
            })
            .await?;

        match resolution {
            Resolution::Ack(pdu) => pdu
                .capacity
                .ok_or(KineticError::MalformedPdu(ParseError::MissingField("capacity"))),
            Resolution::Value { pdu, .. } => Err(KineticError::UnexpectedResponse {
                expected: Some(OpKind::GetLog),
                received: pdu.message_type,
            }),
        }
    }

    /// Queries every drive and returns the slot with the lowest
    /// `portion_full`. Drives that fail to answer are skipped.
    pub async fn least_full_drive(&self) -> Result<usize> {
        let answers = join_all((0..self.manager.len()).map(|i| self.capacity(i))).await;

        let mut best: Option<(usize, f32)> = None;
        let mut first_error = None;
        for (index, answer) in answers.into_iter().enumerate() {
            match answer {
                Ok(capacity) => {
                    if best.map_or(true, |(_, full)| capacity.portion_full < full) {
                        best = Some((index, capacity.portion_full));
                    }
                }
                Err(e) => {
                    warn!(drive = %self.manager.drives()[index], error = %e, "Capacity query failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match (best, first_error) {
            (Some((index, full)), _) => {
                debug!(drive = index, portion_full = full, "Least full drive");
                Ok(index)
            }
            (None, Some(e)) => Err(e),
            (None, None) => Err(KineticError::UnknownDrive("no drives configured".to_string())),
        }
    }

    /// PUTs `value` on the least full drive. Returns the slot and the key.
    pub async fn put_balanced(&self, value: &[u8], options: WriteOptions) -> Result<(usize, Bytes)> {
        let drive = self.least_full_drive().await?;
        let key = self.put(drive, value, options).await?;
        Ok((drive, key))
    }

    /// Snapshot of every drive slot.
    pub fn sockets(&self) -> Vec<SocketInfo> {
        self.manager.sockets()
    }

    pub fn socket(&self, drive: usize) -> Option<SocketInfo> {
        self.manager.socket(drive)
    }

    /// Sets the sequence number of drive `drive`'s next request. Values past
    /// the wire range replace the session.
    pub async fn set_sequence(&self, drive: usize, sequence: u64) -> Result<()> {
        self.manager.set_sequence(drive, sequence).await?;
        info!(drive, sequence, "Sequence overridden");
        Ok(())
    }
}
