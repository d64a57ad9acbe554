//! The per-peer actor: owns arbiter and requester state behind a single
//! lock, so `current_grant` can never be left stale by one role while the
//! other moves on. See the module-level docs in `arbiter` and `requester`
//! for the message handling rules this wires together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use maekawa_wire::{LamportTs, Message, MessageKind, PeerId};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, instrument, trace, warn};

use crate::arbiter::ArbiterState;
use crate::quorum::Quorum;
use crate::requester::RequesterState;
use crate::transport::Transport;

struct Shared {
    clock: LamportTs,
    arbiter: ArbiterState,
    requester: RequesterState,
}

/// A single participant in the Maekawa system: a requester competing for the
/// critical section and an arbiter voting on behalf of peers that hold it in
/// their quorum.
pub struct Peer<T> {
    id: PeerId,
    quorum: Quorum,
    transport: T,
    state: Mutex<Shared>,
    admitted: Notify,
}

impl<T: Transport> Peer<T> {
    pub fn new(id: PeerId, quorum: Quorum, transport: T) -> Arc<Self> {
        Arc::new(Peer {
            id,
            quorum,
            transport,
            state: Mutex::new(Shared {
                clock: LamportTs::default(),
                arbiter: ArbiterState::new(),
                requester: RequesterState::new(),
            }),
            admitted: Notify::new(),
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn quorum(&self) -> &Quorum {
        &self.quorum
    }

    fn send(&self, msg: Message) {
        if let Err(err) = self.transport.send(msg) {
            warn!(peer = self.id.0, dest = msg.dest.0, %err, "failed to send");
        }
    }

    /// Feeds one inbound message through the Lamport clock and the
    /// appropriate arbiter/requester handler. The clock update happens
    /// exactly once here, before dispatch, never duplicated per message kind.
    #[instrument(skip(self, msg), fields(peer = self.id.0, kind = %msg.msg_type, src = msg.src.0))]
    pub async fn handle_message(&self, msg: Message) {
        let outgoing;
        let became_unanimous;
        {
            let mut state = self.state.lock().await;
            state.clock = state.clock.observe(msg.ts);
            let ts_local = state.clock;

            outgoing = match msg.msg_type {
                MessageKind::Request => state.arbiter.on_request(self.id, ts_local, msg.ts, msg.src),
                MessageKind::Yield => state.arbiter.on_yield(self.id, ts_local, msg.src),
                MessageKind::Release => state.arbiter.on_release(self.id, ts_local, msg.src),
                MessageKind::Grant => {
                    state.requester.on_grant(msg.src);
                    Vec::new()
                }
                MessageKind::Failed => state.requester.on_failed(self.id, ts_local),
                MessageKind::Inquire => match msg.data {
                    Some(competitor) => {
                        state
                            .requester
                            .on_inquire(self.id, ts_local, msg.src, msg.ts, competitor)
                    }
                    None => {
                        warn!(
                            peer = self.id.0,
                            src = msg.src.0,
                            "INQUIRE missing its competing-request payload, yielding defensively"
                        );
                        // (0, 0) is the highest possible priority, so we concede
                        // unless our own request also happens to be the very first.
                        state
                            .requester
                            .on_inquire(self.id, ts_local, msg.src, msg.ts, (LamportTs(0), PeerId(0)))
                    }
                },
            };

            became_unanimous = state.requester.has_unanimity(self.quorum.len());
        }

        // Sends happen outside the lock: they never need to, and holding it
        // here would block this peer's arbiter duties for everyone else for
        // as long as the critical section this peer might be running takes.
        for reply in outgoing {
            self.send(reply);
        }
        if became_unanimous {
            self.admitted.notify_waiters();
        }
    }

    /// Runs one request/critical-section/release cycle: back off, multicast
    /// REQUEST to the quorum, wait for unanimous GRANT, run `cs`, then
    /// multicast RELEASE.
    #[instrument(skip(self, cs), fields(peer = self.id.0))]
    pub async fn run_iteration<F, Fut>(&self, cs: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let backoff = Duration::from_millis(rand::random_range(0..50));
        tokio::time::sleep(backoff).await;

        let ts = {
            let mut state = self.state.lock().await;
            state.clock = state.clock.tick();
            let ts = state.clock;
            state.requester.begin_request(self.id, ts);
            ts
        };
        trace!(peer = self.id.0, ts = ts.0, "multicasting REQUEST");
        for dest in self.quorum.others(self.id) {
            self.send(Message::new(MessageKind::Request, self.id, dest, ts));
        }

        self.wait_for_unanimity().await;

        {
            let mut state = self.state.lock().await;
            state.requester.enter_cs();
        }
        info!(peer = self.id.0, "entering critical section");
        cs().await;
        debug!(peer = self.id.0, "leaving critical section");
        {
            let mut state = self.state.lock().await;
            state.requester.exit_cs();
        }

        let release_ts = {
            let mut state = self.state.lock().await;
            state.clock = state.clock.tick();
            state.clock
        };
        for dest in self.quorum.others(self.id) {
            self.send(Message::new(MessageKind::Release, self.id, dest, release_ts));
        }
    }

    async fn wait_for_unanimity(&self) {
        loop {
            let notified = self.admitted.notified();
            {
                let state = self.state.lock().await;
                if state.requester.has_unanimity(self.quorum.len()) {
                    return;
                }
            }
            notified.await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn current_grant(&self) -> Option<maekawa_wire::Priority> {
        self.state.lock().await.arbiter.current_grant()
    }
}
