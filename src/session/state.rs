//! Drive identity and per-session state.

use crate::protocol::codec::SessionStamp;
use crate::session::sequencer::Sequencer;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default Kinetic drive port
pub const DEFAULT_DRIVE_PORT: u16 = 8123;

/// Static identity of a physical drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Drive {
    pub host: String,
    pub port: u16,
}

impl Drive {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Prefix shared by every key generated for this drive.
    pub fn key_prefix(&self) -> String {
        format!("{}:{}:", self.host, self.port)
    }

    /// Returns true if `key` was generated for this drive.
    pub fn owns_key(&self, key: &[u8]) -> bool {
        key.starts_with(self.key_prefix().as_bytes())
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A drive address that is not `host[:port]`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid drive address `{0}`, expected host[:port]")]
pub struct InvalidDriveAddress(pub String);

impl FromStr for Drive {
    type Err = InvalidDriveAddress;

    /// Parses `host:port`, or a bare `host` on the default port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidDriveAddress(s.to_string()));
        }

        // Bracketed IPv6 literals contain colons of their own.
        let has_port = match s.rfind(']') {
            Some(bracket) => s[bracket..].contains(':'),
            None => s.contains(':'),
        };
        if !has_port {
            return Ok(Drive::new(s, DEFAULT_DRIVE_PORT));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => port
                .parse()
                .map(|port| Drive::new(host, port))
                .map_err(|_| InvalidDriveAddress(s.to_string())),
            _ => Err(InvalidDriveAddress(s.to_string())),
        }
    }
}

/// Identity of a live session, fixed by the drive's handshake.
///
/// `connection_id` and `cluster_version` never change for the lifetime of
/// the socket; a new socket gets a new `SessionState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub drive: Drive,
    pub connection_id: u64,
    pub cluster_version: u64,
    pub sequencer: Sequencer,
}

impl SessionState {
    /// Builds the state announced by a handshake. Sequencing starts at 0.
    pub fn from_handshake(drive: Drive, connection_id: u64, cluster_version: u64) -> Self {
        Self {
            drive,
            connection_id,
            cluster_version,
            sequencer: Sequencer::new(),
        }
    }

    /// Stamps a request with `sequence` and this session's identity.
    pub fn stamp(&self, sequence: u64) -> SessionStamp {
        SessionStamp {
            sequence,
            connection_id: self.connection_id,
            cluster_version: self.cluster_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let drive: Drive = "10.0.0.7:9000".parse().unwrap();
        assert_eq!(drive, Drive::new("10.0.0.7", 9000));
        assert_eq!(drive.address(), "10.0.0.7:9000");
    }

    #[test]
    fn test_parse_bare_host_uses_default_port() {
        let drive: Drive = "kinetic-07".parse().unwrap();
        assert_eq!(drive.port, DEFAULT_DRIVE_PORT);
    }

    #[test]
    fn test_parse_ipv6() {
        let drive: Drive = "[::1]:8124".parse().unwrap();
        assert_eq!(drive.host, "[::1]");
        assert_eq!(drive.port, 8124);

        let bare: Drive = "[::1]".parse().unwrap();
        assert_eq!(bare.port, DEFAULT_DRIVE_PORT);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Drive>().is_err());
        assert!("host:notaport".parse::<Drive>().is_err());
        assert!(":8123".parse::<Drive>().is_err());
    }

    #[test]
    fn test_key_ownership() {
        let drive = Drive::new("10.0.0.7", 8123);
        assert!(drive.owns_key(b"10.0.0.7:8123:0000000000001"));
        assert!(!drive.owns_key(b"10.0.0.7:81234:0000000000001"));
        assert!(!drive.owns_key(b"10.0.0.70:8123:0000000000001"));
    }

    #[test]
    fn test_stamp_uses_session_identity() {
        let state = SessionState::from_handshake(Drive::new("h", 1), 77, 3);
        let stamp = state.stamp(12);
        assert_eq!(stamp.sequence, 12);
        assert_eq!(stamp.connection_id, 77);
        assert_eq!(stamp.cluster_version, 3);
        assert_eq!(state.sequencer.current(), 0);
    }
}
