use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use maekawa::cli::Opts;
use maekawa::{logging, transport};
use maekawa_core::barrier::Barrier;
use maekawa_core::{Peer, Quorum};
use maekawa_wire::PeerId;
use tracing::{info, instrument};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init(opts.log_level)?;

    if opts.peers == 0 {
        anyhow::bail!("--peers must be at least 1");
    }

    info!(
        peers = opts.peers,
        base_port = opts.base_port,
        iterations = opts.iterations,
        "starting maekawa demo"
    );

    let mut bootstraps = Vec::new();
    for i in 0..opts.peers {
        bootstraps.push(tokio::spawn(transport::bootstrap(
            PeerId(i),
            opts.peers,
            opts.base_port,
        )));
    }

    let termination = Barrier::new(opts.peers);
    let mut workers = Vec::new();
    for (i, bootstrap) in bootstraps.into_iter().enumerate() {
        let (tcp_transport, inbound_rx) = bootstrap
            .await
            .context("bootstrap task panicked")?
            .with_context(|| format!("peer {i} failed to bootstrap"))?;

        let id = PeerId(i as u32);
        let quorum = Quorum::build(opts.peers, id).context("invalid quorum parameters")?;
        let peer = Peer::new(id, quorum, tcp_transport);

        tokio::spawn(dispatch_inbound(peer.clone(), inbound_rx));
        workers.push(tokio::spawn(run_peer(
            peer,
            opts.iterations,
            termination.clone(),
        )));
    }

    for worker in workers {
        worker.await.context("peer task panicked")?;
    }

    info!("all peers finished their iterations");
    Ok(())
}

async fn dispatch_inbound(
    peer: Arc<Peer<transport::TcpTransport>>,
    mut inbound_rx: tokio::sync::mpsc::UnboundedReceiver<maekawa_wire::Message>,
) {
    while let Some(msg) = inbound_rx.recv().await {
        peer.handle_message(msg).await;
    }
}

#[instrument(skip(peer, termination), fields(peer = peer.id().0))]
async fn run_peer(
    peer: Arc<Peer<transport::TcpTransport>>,
    iterations: u32,
    termination: Arc<Barrier>,
) {
    for iteration in 0..iterations {
        let id = peer.id().0;
        peer.run_iteration(|| async move {
            info!(peer = id, iteration, "in critical section");
            tokio::time::sleep(Duration::from_millis(5)).await;
        })
        .await;
    }
    termination.arrive_and_wait().await;
}
