//! The requester half of a peer: reacts to GRANT/FAILED/INQUIRE about this
//! peer's own outstanding request.

use std::collections::HashSet;

use maekawa_wire::{LamportTs, Message, MessageKind, PeerId, Priority};

/// Per-peer requester state, mutated by messages answering this peer's own
/// REQUEST as well as by the request/CS/release cycle itself.
#[derive(Debug, Default)]
pub struct RequesterState {
    grants_received: HashSet<PeerId>,
    in_cs: bool,
    outstanding_ts: Option<LamportTs>,
    yielded: bool,
    failed: bool,
    inquired: HashSet<Priority>,
}

impl RequesterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_cs(&self) -> bool {
        self.in_cs
    }

    pub fn grant_count(&self) -> usize {
        self.grants_received.len()
    }

    pub fn has_unanimity(&self, quorum_size: usize) -> bool {
        self.grants_received.len() == quorum_size
    }

    /// Resets requester state for a new REQUEST round, counting `self` as
    /// already granted (a requester always trivially grants its own vote).
    pub fn begin_request(&mut self, me: PeerId, ts: LamportTs) {
        self.grants_received.clear();
        self.grants_received.insert(me);
        self.outstanding_ts = Some(ts);
        self.yielded = false;
        self.failed = false;
        self.inquired.clear();
    }

    pub fn enter_cs(&mut self) {
        debug_assert!(!self.in_cs);
        self.in_cs = true;
    }

    pub fn exit_cs(&mut self) {
        self.in_cs = false;
        self.grants_received.clear();
    }

    /// A GRANT from `src_g`: we hold its vote until we RELEASE or it YIELDs
    /// us away.
    pub fn on_grant(&mut self, src_g: PeerId) {
        self.grants_received.insert(src_g);
        self.yielded = false;
        self.failed = false;
    }

    /// A FAILED: some arbiter we asked has a higher-priority request ahead of
    /// ours. We concede every grant we are being asked to give back.
    pub fn on_failed(&mut self, me: PeerId, ts_local: LamportTs) -> Vec<Message> {
        self.failed = true;
        self.yielded = true;
        let replies = self
            .inquired
            .iter()
            .map(|&(_, src_q)| Message::new(MessageKind::Yield, me, src_q, ts_local))
            .collect();
        self.inquired.clear();
        self.grants_received.clear();
        self.grants_received.insert(me);
        replies
    }

    /// An INQUIRE from `src_q`, who arbitrates for us and has a competing
    /// request `(ts_other, src_other)` it needs to decide between.
    pub fn on_inquire(
        &mut self,
        me: PeerId,
        ts_local: LamportTs,
        src_q: PeerId,
        ts_q: LamportTs,
        competitor: Priority,
    ) -> Vec<Message> {
        if self.in_cs {
            return Vec::new();
        }

        // A peer with no outstanding request has nothing to defend; treat it
        // as the lowest possible priority so it always concedes.
        let ours = (
            self.outstanding_ts.unwrap_or(LamportTs(u64::MAX)),
            me,
        );
        let will_lose = competitor < ours;

        if self.failed || self.yielded || will_lose {
            self.yielded = true;
            self.grants_received.remove(&src_q);
            vec![Message::new(MessageKind::Yield, me, src_q, ts_local)]
        } else {
            self.inquired.insert((ts_q, src_q));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: PeerId = PeerId(0);

    fn ts(n: u64) -> LamportTs {
        LamportTs(n)
    }

    #[test]
    fn begin_request_counts_self_as_granted() {
        let mut r = RequesterState::new();
        r.begin_request(ME, ts(1));
        assert_eq!(r.grant_count(), 1);
        assert!(r.has_unanimity(1));
        assert!(!r.has_unanimity(3));
    }

    #[test]
    fn grant_accumulates_towards_unanimity() {
        let mut r = RequesterState::new();
        r.begin_request(ME, ts(1));
        r.on_grant(PeerId(1));
        r.on_grant(PeerId(2));
        assert!(r.has_unanimity(3));
    }

    #[test]
    fn failed_replies_yield_to_every_buffered_inquiry_and_resets() {
        let mut r = RequesterState::new();
        r.begin_request(ME, ts(5));
        r.on_grant(PeerId(1));
        // Buffer an inquiry we out-prioritize so it's held, not answered yet.
        r.on_inquire(ME, ts(6), PeerId(9), ts(6), (ts(100), PeerId(50)));

        let out = r.on_failed(ME, ts(7));
        assert_eq!(out, vec![Message::new(MessageKind::Yield, ME, PeerId(9), ts(7))]);
        assert_eq!(r.grant_count(), 1, "a peer never revokes its own trivial self-grant");
    }

    #[test]
    fn inquire_is_buffered_when_we_outrank_the_competitor() {
        let mut r = RequesterState::new();
        r.begin_request(ME, ts(1));
        let out = r.on_inquire(ME, ts(2), PeerId(9), ts(2), (ts(50), PeerId(3)));
        assert!(out.is_empty());
    }

    #[test]
    fn inquire_yields_when_the_competitor_outranks_us() {
        let mut r = RequesterState::new();
        r.begin_request(ME, ts(10));
        r.on_grant(PeerId(9));
        let out = r.on_inquire(ME, ts(11), PeerId(9), ts(11), (ts(2), PeerId(3)));
        assert_eq!(out, vec![Message::new(MessageKind::Yield, ME, PeerId(9), ts(11))]);
        assert_eq!(r.grant_count(), 0, "the yielded grantor's vote is revoked");
    }

    #[test]
    fn inquire_is_ignored_once_in_the_critical_section() {
        let mut r = RequesterState::new();
        r.begin_request(ME, ts(1));
        r.enter_cs();
        let out = r.on_inquire(ME, ts(2), PeerId(9), ts(2), (ts(0), PeerId(0)));
        assert!(out.is_empty());
        assert!(r.in_cs());
    }
}
