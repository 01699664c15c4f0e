// tests/common/mod.rs
//
// A minimal MQTT 3.1.1 broker on a local TCP port. It accepts every CONNECT,
// acknowledges every request, and echoes publishes back to the connection
// that subscribed to the exact topic.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct BrokerBehavior {
    /// Pause between CONNECT and CONNACK.
    pub connack_delay: Duration,
    /// A publish on this topic closes the connection without a reply.
    pub drop_topic: Option<String>,
}

pub struct FakeBroker {
    pub uri: String,
    connections: Arc<AtomicUsize>,
}

impl FakeBroker {
    // ---

    pub async fn start(behavior: BrokerBehavior) -> Self {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake broker");
        let addr = listener.local_addr().expect("fake broker address");
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _peer)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, behavior.clone()));
            }
        });

        Self {
            uri: format!("tcp://{addr}"),
            connections,
        }
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(mut stream: TcpStream, behavior: BrokerBehavior) {
    // ---
    let mut subscriptions = HashSet::new();

    while let Some((header, body)) = read_packet(&mut stream).await {
        let replies = match header >> 4 {
            // CONNECT
            1 => {
                tokio::time::sleep(behavior.connack_delay).await;
                vec![encode(0x20, &[0, 0])]
            }
            // PUBLISH
            3 => {
                let qos = (header >> 1) & 0x03;
                let (topic, rest) = read_str(&body);
                if behavior.drop_topic.as_deref() == Some(topic.as_str()) {
                    return;
                }
                let (pkid, payload) = if qos > 0 {
                    (Some([rest[0], rest[1]]), &rest[2..])
                } else {
                    (None, rest)
                };

                let mut out = Vec::new();
                match (qos, pkid) {
                    (1, Some(id)) => out.push(encode(0x40, &id)),
                    (2, Some(id)) => out.push(encode(0x50, &id)),
                    _ => {}
                }
                if subscriptions.contains(&topic) {
                    let mut echo = Vec::new();
                    echo.extend_from_slice(&(topic.len() as u16).to_be_bytes());
                    echo.extend_from_slice(topic.as_bytes());
                    echo.extend_from_slice(payload);
                    out.push(encode(0x30, &echo));
                }
                out
            }
            // PUBREL
            6 => vec![encode(0x70, &body[..2])],
            // SUBSCRIBE
            8 => {
                let mut ack = body[..2].to_vec();
                let mut rest = &body[2..];
                while !rest.is_empty() {
                    let (filter, tail) = read_str(rest);
                    ack.push(tail[0] & 0x03);
                    subscriptions.insert(filter);
                    rest = &tail[1..];
                }
                vec![encode(0x90, &ack)]
            }
            // UNSUBSCRIBE
            10 => {
                let mut rest = &body[2..];
                while !rest.is_empty() {
                    let (filter, tail) = read_str(rest);
                    subscriptions.remove(&filter);
                    rest = tail;
                }
                vec![encode(0xB0, &body[..2])]
            }
            // PINGREQ
            12 => vec![encode(0xD0, &[])],
            // DISCONNECT
            14 => return,
            // PUBACK, PUBREC, PUBCOMP from the client
            _ => Vec::new(),
        };

        for reply in replies {
            if stream.write_all(&reply).await.is_err() {
                return;
            }
        }
    }
}

async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    // ---
    let header = stream.read_u8().await.ok()?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn encode(header: u8, body: &[u8]) -> Vec<u8> {
    // ---
    let mut out = vec![header];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(body);
    out
}

fn read_str(buf: &[u8]) -> (String, &[u8]) {
    // ---
    let len = usize::from(u16::from_be_bytes([buf[0], buf[1]]));
    let text = String::from_utf8_lossy(&buf[2..2 + len]).into_owned();
    (text, &buf[2 + len..])
}
