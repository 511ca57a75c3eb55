//! In-process Kinetic drive for tests.
//!
//! [`MockDrive`] listens on an ephemeral localhost port, greets each
//! connection with a handshake carrying a fresh connection ID, verifies
//! request HMACs and answers PUT, GET, DELETE and GETLOG from an in-memory
//! map. Behaviour switches let tests provoke chunked values, silence and
//! dropped connections.

use crate::protocol::codec::{self, Credentials};
use crate::protocol::messages::{Body, Capacity, Command, GetLog, Header, KeyValue, Status};
use crate::protocol::{parse_header, LogType, MessageType, StatusCode, HEADER_SIZE};
use crate::session::Drive;
use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Connection ID used by the stand-alone frame helpers.
pub(crate) const FRAME_CONNECTION_ID: u64 = 5;

fn command(
    message_type: Option<MessageType>,
    connection_id: u64,
    cluster_version: u64,
    ack_sequence: Option<u64>,
    status: StatusCode,
    message: Option<&str>,
) -> Command {
    Command {
        header: Some(Header {
            connection_id: Some(connection_id as i64),
            cluster_version: Some(cluster_version as i64),
            ack_sequence: ack_sequence.map(|s| s as i64),
            message_type: message_type.map(|t| t as i32),
            ..Default::default()
        }),
        body: None,
        status: Some(Status {
            code: Some(status as i32),
            status_message: message.map(str::to_string),
            detailed_message: None,
        }),
    }
}

/// The unsolicited status a drive pushes when a connection opens.
pub(crate) fn handshake_frame(connection_id: u64, cluster_version: u64) -> Vec<u8> {
    let command = command(None, connection_id, cluster_version, None, StatusCode::Success, None);
    codec::frame(&codec::unsolicited(&command), &[]).unwrap().to_vec()
}

/// A signed response frame with an optional value.
pub(crate) fn response_frame(
    message_type: MessageType,
    status: StatusCode,
    message: Option<&str>,
    value: &[u8],
) -> Vec<u8> {
    let command = command(
        Some(message_type),
        FRAME_CONNECTION_ID,
        0,
        Some(0),
        status,
        message,
    );
    let envelope = codec::sign(&command, &Credentials::default()).unwrap();
    codec::frame(&envelope, value).unwrap().to_vec()
}

/// Switches that change how the mock drive answers.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockBehavior {
    /// Write GET values in pieces of this many bytes
    pub value_chunk: Option<usize>,
    /// Read requests but never answer them
    pub silent: bool,
    /// Answer GETs of missing keys with SUCCESS and an empty value
    pub empty_on_missing: bool,
    /// Close the connection halfway through a GET value
    pub truncate_values: bool,
    /// Answer every request with bytes that are not a Kinetic frame
    pub garbage_responses: bool,
    /// Reported by GETLOG CAPACITIES
    pub portion_full: f32,
}

/// A request as the mock drive saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Observed {
    pub connection_id: u64,
    pub sequence: u64,
    pub message_type: MessageType,
}

#[derive(Default)]
struct Shared {
    store: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    behavior: Mutex<MockBehavior>,
    requests: Mutex<Vec<Observed>>,
    next_connection_id: AtomicU64,
    connections: AtomicU64,
}

pub(crate) struct MockDrive {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockDrive {
    pub(crate) async fn start() -> Self {
        Self::with_behavior(MockBehavior::default()).await
    }

    pub(crate) async fn with_behavior(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            behavior: Mutex::new(behavior),
            next_connection_id: AtomicU64::new(1000),
            ..Default::default()
        });

        let accept_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_shared)));
            }
        });

        Self { addr, shared }
    }

    pub(crate) fn drive(&self) -> Drive {
        Drive::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub(crate) fn set_behavior(&self, update: impl FnOnce(&mut MockBehavior)) {
        update(&mut self.shared.behavior.lock().unwrap());
    }

    pub(crate) fn requests(&self) -> Vec<Observed> {
        self.shared.requests.lock().unwrap().clone()
    }

    /// Connections accepted so far.
    pub(crate) fn connections(&self) -> u64 {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub(crate) fn contains(&self, key: &[u8]) -> bool {
        self.shared.store.lock().unwrap().contains_key(key)
    }
}

async fn serve(mut stream: TcpStream, shared: Arc<Shared>) {
    let connection_id = shared.next_connection_id.fetch_add(1, Ordering::SeqCst);
    shared.connections.fetch_add(1, Ordering::SeqCst);

    if stream.write_all(&handshake_frame(connection_id, 0)).await.is_err() {
        return;
    }

    let credentials = Credentials::default();
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let Some((message, value)) = read_request(&mut stream, &mut buffer).await else {
            return;
        };

        let (envelope, _) = codec::decode_envelope(&message).unwrap();
        assert!(codec::verify(&envelope, &credentials), "request HMAC mismatch");

        let header = crate::protocol::FrameHeader::new(message.len() as u32, value.len() as u32);
        let pdu = codec::decode(&header, &message).unwrap();
        let message_type = pdu.message_type.unwrap();
        shared.requests.lock().unwrap().push(Observed {
            connection_id: pdu.connection_id,
            sequence: pdu.sequence,
            message_type,
        });

        let behavior = shared.behavior.lock().unwrap().clone();
        if behavior.silent {
            continue;
        }
        if behavior.garbage_responses {
            if stream.write_all(b"GARBAGE-NOT-A-FRAME").await.is_err() {
                return;
            }
            continue;
        }

        let key = pdu.key.clone().map(|k| k.to_vec()).unwrap_or_default();
        let respond = |response_type: MessageType, status: StatusCode, body: Option<Body>| {
            let mut command = command(
                Some(response_type),
                connection_id,
                0,
                Some(pdu.sequence),
                status,
                None,
            );
            command.body = body;
            codec::sign(&command, &credentials).unwrap()
        };

        let frame = match message_type {
            MessageType::Put => {
                let tag = codec::integrity_tag(&credentials.secret, &value).unwrap();
                assert_eq!(pdu.tag.as_deref(), Some(&tag[..]), "PUT tag mismatch");
                shared.store.lock().unwrap().insert(key, value);
                codec::frame(&respond(MessageType::PutResponse, StatusCode::Success, None), &[])
                    .unwrap()
            }
            MessageType::Get => {
                let stored = shared.store.lock().unwrap().get(&key).cloned();
                match stored {
                    Some(stored) => {
                        let body = Body {
                            key_value: Some(KeyValue {
                                key: Some(key),
                                ..Default::default()
                            }),
                            get_log: None,
                        };
                        let envelope = respond(MessageType::GetResponse, StatusCode::Success, Some(body));
                        let frame = codec::frame(&envelope, &stored).unwrap();
                        if write_value(&mut stream, &frame, stored.len(), &behavior).await {
                            continue;
                        }
                        return;
                    }
                    None if behavior.empty_on_missing => codec::frame(
                        &respond(MessageType::GetResponse, StatusCode::Success, None),
                        &[],
                    )
                    .unwrap(),
                    None => codec::frame(
                        &respond(MessageType::GetResponse, StatusCode::NotFound, None),
                        &[],
                    )
                    .unwrap(),
                }
            }
            MessageType::Delete => {
                let status = match shared.store.lock().unwrap().remove(&key) {
                    Some(_) => StatusCode::Success,
                    None => StatusCode::NotFound,
                };
                codec::frame(&respond(MessageType::DeleteResponse, status, None), &[]).unwrap()
            }
            MessageType::GetLog => {
                let body = Body {
                    key_value: None,
                    get_log: Some(GetLog {
                        types: vec![LogType::Capacities as i32],
                        capacity: Some(Capacity {
                            nominal_capacity_in_bytes: Some(4_000_000_000_000),
                            portion_full: Some(behavior.portion_full),
                        }),
                    }),
                };
                codec::frame(
                    &respond(MessageType::GetLogResponse, StatusCode::Success, Some(body)),
                    &[],
                )
                .unwrap()
            }
            other => panic!("mock drive cannot serve {other:?}"),
        };

        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

/// Reads one request frame, returning its message and value segments.
async fn read_request(stream: &mut TcpStream, buffer: &mut BytesMut) -> Option<(Vec<u8>, Vec<u8>)> {
    loop {
        if let Some(header) = parse_header(buffer).unwrap() {
            if buffer.len() >= header.frame_len() {
                buffer.advance(HEADER_SIZE);
                let message = buffer.split_to(header.message_len as usize).to_vec();
                let value = buffer.split_to(header.value_len as usize).to_vec();
                return Some((message, value));
            }
        }
        match stream.read_buf(buffer).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Writes a GET response, honoring chunking and truncation. Returns false
/// when the connection should be dropped.
async fn write_value(
    stream: &mut TcpStream,
    frame: &[u8],
    value_len: usize,
    behavior: &MockBehavior,
) -> bool {
    let value_start = frame.len() - value_len;

    if behavior.truncate_values {
        let cut = value_start + value_len / 2;
        let _ = stream.write_all(&frame[..cut]).await;
        let _ = stream.flush().await;
        return false;
    }

    let Some(chunk) = behavior.value_chunk else {
        return stream.write_all(frame).await.is_ok();
    };

    if stream.write_all(&frame[..value_start]).await.is_err() {
        return false;
    }
    for piece in frame[value_start..].chunks(chunk.max(1)) {
        if stream.write_all(piece).await.is_err() || stream.flush().await.is_err() {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    true
}
