//! Kinetic Structured Messages
//!
//! The structured segment of every PDU is a protobuf `Message` envelope whose
//! `commandBytes` field holds a serialized `Command`. Only the fields this
//! client reads or writes are declared; unknown fields are skipped by prost
//! on decode.
//!
//! ```text
//! Envelope
//! ├── auth_type        (HMAC for requests, UNSOLICITED for the handshake)
//! ├── hmac_auth        { identity, hmac }
//! └── command_bytes ──> Command
//!                       ├── header  { cluster_version, connection_id, sequence, message_type, ... }
//!                       ├── body    { key_value | get_log }
//!                       └── status  { code, status_message }
//! ```
//!
//! Tag numbers and enum values follow the Kinetic protocol definition, so
//! these types interoperate with real drives and simulators.

/// Outer protobuf envelope of a PDU.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(enumeration = "AuthType", optional, tag = "4")]
    pub auth_type: Option<i32>,
    #[prost(message, optional, tag = "5")]
    pub hmac_auth: Option<HmacAuth>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub command_bytes: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HmacAuth {
    #[prost(int64, optional, tag = "1")]
    pub identity: Option<i64>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub hmac: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AuthType {
    InvalidAuthType = -1,
    HmacAuth = 1,
    PinAuth = 2,
    UnsolicitedStatus = 3,
}

/// The authenticated part of a PDU.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Command {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(message, optional, tag = "2")]
    pub body: Option<Body>,
    #[prost(message, optional, tag = "3")]
    pub status: Option<Status>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(int64, optional, tag = "1")]
    pub cluster_version: Option<i64>,
    #[prost(int64, optional, tag = "3")]
    pub connection_id: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub sequence: Option<i64>,
    /// Sequence of the request a response answers
    #[prost(int64, optional, tag = "6")]
    pub ack_sequence: Option<i64>,
    #[prost(enumeration = "MessageType", optional, tag = "7")]
    pub message_type: Option<i32>,
    /// Drive-side timeout in milliseconds
    #[prost(int64, optional, tag = "9")]
    pub timeout: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Body {
    #[prost(message, optional, tag = "1")]
    pub key_value: Option<KeyValue>,
    #[prost(message, optional, tag = "6")]
    pub get_log: Option<GetLog>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(enumeration = "StatusCode", optional, tag = "1")]
    pub code: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub status_message: Option<String>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub detailed_message: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValue {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub new_version: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub db_version: Option<Vec<u8>>,
    /// Integrity tag computed over the value
    #[prost(bytes = "vec", optional, tag = "5")]
    pub tag: Option<Vec<u8>>,
    #[prost(enumeration = "Algorithm", optional, tag = "6")]
    pub algorithm: Option<i32>,
    #[prost(bool, optional, tag = "7")]
    pub metadata_only: Option<bool>,
    #[prost(bool, optional, tag = "8")]
    pub force: Option<bool>,
    #[prost(enumeration = "Synchronization", optional, tag = "9")]
    pub synchronization: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLog {
    #[prost(enumeration = "LogType", repeated, packed = "false", tag = "1")]
    pub types: Vec<i32>,
    #[prost(message, optional, tag = "4")]
    pub capacity: Option<Capacity>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Capacity {
    #[prost(uint64, optional, tag = "4")]
    pub nominal_capacity_in_bytes: Option<u64>,
    #[prost(float, optional, tag = "5")]
    pub portion_full: Option<f32>,
}

/// Operation codes carried in the command header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    InvalidMessageType = -1,
    GetResponse = 1,
    Get = 2,
    PutResponse = 3,
    Put = 4,
    DeleteResponse = 5,
    Delete = 6,
    GetLogResponse = 23,
    GetLog = 24,
    NoopResponse = 29,
    Noop = 30,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StatusCode {
    InvalidStatusCode = -1,
    NotAttempted = 0,
    Success = 1,
    HmacFailure = 2,
    NotAuthorized = 3,
    VersionFailure = 4,
    InternalError = 5,
    HeaderRequired = 6,
    NotFound = 7,
    VersionMismatch = 8,
    ServiceBusy = 9,
    Expired = 10,
    DataError = 11,
    PermDataError = 12,
    RemoteConnectionError = 13,
    NoSpace = 14,
    NoSuchHmacAlgorithm = 15,
    InvalidRequest = 16,
    NestedOperationErrors = 17,
    DeviceLocked = 18,
    DeviceAlreadyUnlocked = 19,
    ConnectionTerminated = 20,
    InvalidBatch = 21,
}

/// Persistence guarantee requested for a write or delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Synchronization {
    InvalidSynchronization = -1,
    WriteThrough = 1,
    WriteBack = 2,
    Flush = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Algorithm {
    InvalidAlgorithm = -1,
    Sha1 = 1,
    Sha2 = 2,
    Sha3 = 3,
    Crc32c = 4,
    Crc64 = 5,
    Crc32 = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogType {
    InvalidType = -1,
    Utilizations = 0,
    Temperatures = 1,
    Capacities = 2,
    Configuration = 3,
    Statistics = 4,
    Messages = 5,
    Limits = 6,
    Device = 7,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn test_command_survives_encoding() {
        let command = Command {
            header: Some(Header {
                cluster_version: Some(0),
                connection_id: Some(1_700_000_000),
                sequence: Some(42),
                message_type: Some(MessageType::Put as i32),
                ..Default::default()
            }),
            body: Some(Body {
                key_value: Some(KeyValue {
                    key: Some(b"127.0.0.1:8123:0".to_vec()),
                    synchronization: Some(Synchronization::Flush as i32),
                    force: Some(true),
                    ..Default::default()
                }),
                get_log: None,
            }),
            status: None,
        };

        let decoded = Command::decode(command.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        assert!(MessageType::try_from(9999).is_err());
        assert_eq!(MessageType::try_from(3).unwrap(), MessageType::PutResponse);
    }

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::Success as i32, 1);
        assert_eq!(StatusCode::NotFound as i32, 7);
    }
}
