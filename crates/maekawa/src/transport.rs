//! A TCP-backed [`Transport`]: one inbound listener plus one dialed
//! connection per peer. Framing is [`maekawa_wire::MessageCodec`] over
//! [`tokio_util::codec::Framed`], the same pairing the wire crate's codec was
//! designed against.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use maekawa_core::transport::{Transport, TransportError};
use maekawa_wire::{Message, MessageCodec, PeerId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

fn peer_addr(base_port: u16, id: PeerId) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], base_port + id.0 as u16))
}

/// A full mesh of outbound connections, one per peer. `send` hands the
/// message to that peer's writer task and returns immediately; it never
/// blocks on the network.
pub struct TcpTransport {
    outbound: HashMap<PeerId, mpsc::UnboundedSender<Message>>,
}

impl Transport for TcpTransport {
    fn send(&self, msg: Message) -> Result<(), TransportError> {
        let tx = self
            .outbound
            .get(&msg.dest)
            .ok_or(TransportError::UnknownDestination(msg.dest))?;
        tx.send(msg).map_err(|_| TransportError::LinkClosed)
    }
}

/// Binds `id`'s listening socket, dials every other peer (retrying until that
/// peer's listener is up), and returns a transport together with the channel
/// every inbound message lands on. The caller owns turning that channel into
/// calls against a [`maekawa_core::Peer`], since the peer can't be
/// constructed until its transport exists.
#[instrument(fields(peer = id.0))]
pub async fn bootstrap(
    id: PeerId,
    n: u32,
    base_port: u16,
) -> anyhow::Result<(TcpTransport, mpsc::UnboundedReceiver<Message>)> {
    let listener = TcpListener::bind(peer_addr(base_port, id))
        .await
        .with_context(|| format!("peer {id} failed to bind its listening port"))?;
    info!(peer = id.0, addr = %listener.local_addr().unwrap(), "listening");

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(accept_loop(id, listener, inbound_tx));

    let mut outbound = HashMap::new();
    for j in 0..n {
        let dest = PeerId(j);
        if dest == id {
            continue;
        }
        let stream = dial_with_retry(peer_addr(base_port, dest)).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(id, dest, stream, rx));
        outbound.insert(dest, tx);
    }

    Ok((TcpTransport { outbound }, inbound_rx))
}

async fn accept_loop(id: PeerId, listener: TcpListener, inbound_tx: mpsc::UnboundedSender<Message>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(peer = id.0, %addr, "accepted inbound connection");
                tokio::spawn(read_loop(stream, inbound_tx.clone()));
            }
            Err(err) => {
                warn!(peer = id.0, %err, "accept failed, listener task exiting");
                return;
            }
        }
    }
}

async fn dial_with_retry(addr: SocketAddr) -> anyhow::Result<TcpStream> {
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
}

async fn read_loop(stream: TcpStream, inbound_tx: mpsc::UnboundedSender<Message>) {
    let mut framed = Framed::new(stream, MessageCodec);
    while let Some(frame) = framed.next().await {
        match frame {
            Ok(msg) => {
                if inbound_tx.send(msg).is_err() {
                    return;
                }
            }
            Err(err) => {
                warn!(%err, "connection error, closing reader");
                return;
            }
        }
    }
}

async fn write_loop(
    me: PeerId,
    dest: PeerId,
    stream: TcpStream,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    let mut framed = Framed::new(stream, MessageCodec);
    while let Some(msg) = rx.recv().await {
        if let Err(err) = framed.send(msg).await {
            warn!(peer = me.0, dest = dest.0, %err, "write failed, closing writer");
            return;
        }
    }
}
