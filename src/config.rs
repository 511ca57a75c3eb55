//! Client configuration.

use crate::protocol::codec::Credentials;
use crate::session::Drive;
use bytes::Bytes;
use std::time::Duration;

/// Default bound on TCP connect plus handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single request/response exchange
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest value a Kinetic drive accepts in one PUT
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Settings for a [`crate::KineticClient`].
///
/// ```
/// use kinetic::{ClientConfig, Drive};
/// use std::time::Duration;
///
/// let config = ClientConfig::new(vec![Drive::new("10.0.0.1", 8123)])
///     .with_operation_timeout(Duration::from_secs(10));
/// assert_eq!(config.drives.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Drives to talk to, in slot order
    pub drives: Vec<Drive>,
    /// Identity and secret for request HMACs and value tags
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    /// PUTs of larger values are refused before touching the network
    pub max_value_size: usize,
    /// First counter value handed out by each drive's key generator
    pub key_origin: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            drives: Vec::new(),
            credentials: Credentials::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            key_origin: 0,
        }
    }
}

impl ClientConfig {
    pub fn new(drives: Vec<Drive>) -> Self {
        Self {
            drives,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, identity: i64, secret: impl Into<Bytes>) -> Self {
        self.credentials = Credentials {
            identity,
            secret: secret.into(),
        };
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    pub fn with_key_origin(mut self, origin: u64) -> Self {
        self.key_origin = origin;
        self
    }
}
