//! The arbiter half of a peer: answers REQUEST/YIELD/RELEASE on behalf of
//! every peer that has this one in its quorum.

use std::collections::{BTreeSet, HashSet};

use maekawa_wire::{LamportTs, Message, MessageKind, PeerId, Priority};

/// A priority-ordered queue of waiting requesters with at most one entry per
/// source, backed by a [`BTreeSet`] for O(log n) min-extraction.
#[derive(Debug, Default)]
struct PendingQueue {
    entries: BTreeSet<Priority>,
    srcs: HashSet<PeerId>,
}

impl PendingQueue {
    /// Inserts `priority` unless its source is already queued. Returns
    /// whether the entry was newly added.
    fn insert(&mut self, priority: Priority) -> bool {
        if !self.srcs.insert(priority.1) {
            return false;
        }
        self.entries.insert(priority);
        true
    }

    fn remove_src(&mut self, src: PeerId) {
        if self.srcs.remove(&src) {
            self.entries.retain(|&(_, s)| s != src);
        }
    }

    fn pop_min(&mut self) -> Option<Priority> {
        let priority = *self.entries.iter().next()?;
        self.entries.remove(&priority);
        self.srcs.remove(&priority.1);
        Some(priority)
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Per-peer arbiter state: at most one outstanding grant, plus the queue of
/// requesters waiting behind it.
#[derive(Debug, Default)]
pub struct ArbiterState {
    pending: PendingQueue,
    current_grant: Option<Priority>,
}

impl ArbiterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_grant(&self) -> Option<Priority> {
        self.current_grant
    }

    pub fn pending_is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// A REQUEST arriving from `src_r` with timestamp `ts_r`. `ts_local` is
    /// the Lamport timestamp already advanced by the caller for this
    /// delivery; it stamps whatever reply is produced here.
    pub fn on_request(
        &mut self,
        me: PeerId,
        ts_local: LamportTs,
        ts_r: LamportTs,
        src_r: PeerId,
    ) -> Vec<Message> {
        let incoming = (ts_r, src_r);
        match self.current_grant {
            None => {
                self.current_grant = Some(incoming);
                vec![Message::new(MessageKind::Grant, me, src_r, ts_local)]
            }
            Some(holder) if holder < incoming => {
                self.pending.insert(incoming);
                vec![Message::new(MessageKind::Failed, me, src_r, ts_local)]
            }
            Some((_, src_g)) => {
                self.pending.insert(incoming);
                vec![
                    Message::new(MessageKind::Inquire, me, src_g, ts_local)
                        .with_data(incoming),
                ]
            }
        }
    }

    /// A YIELD from `src_y`, relinquishing the grant it previously held. A
    /// stale YIELD (source no longer matches the current grant) is a no-op.
    pub fn on_yield(&mut self, me: PeerId, ts_local: LamportTs, src_y: PeerId) -> Vec<Message> {
        let Some((ts_g, src_g)) = self.current_grant else {
            return Vec::new();
        };
        if src_g != src_y {
            return Vec::new();
        }

        self.pending.insert((ts_g, src_y));
        let next = self
            .pending
            .pop_min()
            .expect("we just inserted an entry");
        self.current_grant = Some(next);
        vec![Message::new(MessageKind::Grant, me, next.1, ts_local)]
    }

    /// A RELEASE from `src_r`. If it matches the current grant, the grant is
    /// cleared and, if anyone is waiting, the highest-priority waiter is
    /// promoted. A RELEASE from a peer that was only ever pending (never
    /// granted) is treated as a no-op beyond dropping it from the queue: the
    /// arbiter never has two outstanding grants at once.
    pub fn on_release(&mut self, me: PeerId, ts_local: LamportTs, src_r: PeerId) -> Vec<Message> {
        let matched = self.current_grant.is_some_and(|(_, src)| src == src_r);
        if matched {
            self.current_grant = None;
        }
        self.pending.remove_src(src_r);

        if self.current_grant.is_none() {
            if let Some(next) = self.pending.pop_min() {
                self.current_grant = Some(next);
                return vec![Message::new(MessageKind::Grant, me, next.1, ts_local)];
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: PeerId = PeerId(1);

    fn ts(n: u64) -> LamportTs {
        LamportTs(n)
    }

    #[test]
    fn first_request_is_granted_immediately() {
        let mut a = ArbiterState::new();
        let out = a.on_request(ME, ts(2), ts(1), PeerId(0));
        assert_eq!(out, vec![Message::new(MessageKind::Grant, ME, PeerId(0), ts(2))]);
        assert_eq!(a.current_grant(), Some((ts(1), PeerId(0))));
    }

    #[test]
    fn lower_priority_request_is_failed_and_queued() {
        let mut a = ArbiterState::new();
        a.on_request(ME, ts(2), ts(1), PeerId(0));
        let out = a.on_request(ME, ts(8), ts(7), PeerId(2));
        assert_eq!(out, vec![Message::new(MessageKind::Failed, ME, PeerId(2), ts(8))]);
        assert!(!a.pending_is_empty());
    }

    #[test]
    fn higher_priority_request_triggers_inquire_without_changing_grant() {
        let mut a = ArbiterState::new();
        a.on_request(ME, ts(6), ts(5), PeerId(3));
        let out = a.on_request(ME, ts(3), ts(2), PeerId(0));
        assert_eq!(
            out,
            vec![
                Message::new(MessageKind::Inquire, ME, PeerId(3), ts(3))
                    .with_data((ts(2), PeerId(0)))
            ]
        );
        // current_grant does not flip until a YIELD arrives.
        assert_eq!(a.current_grant(), Some((ts(5), PeerId(3))));
    }

    #[test]
    fn duplicate_request_does_not_grow_pending_queue() {
        let mut a = ArbiterState::new();
        a.on_request(ME, ts(2), ts(1), PeerId(0));
        a.on_request(ME, ts(8), ts(7), PeerId(2));
        assert_eq!(a.pending.len(), 1);
        a.on_request(ME, ts(9), ts(7), PeerId(2));
        assert_eq!(a.pending.len(), 1);
    }

    #[test]
    fn yield_promotes_the_minimum_pending_entry() {
        let mut a = ArbiterState::new();
        a.on_request(ME, ts(6), ts(5), PeerId(3));
        a.on_request(ME, ts(3), ts(2), PeerId(0));
        let out = a.on_yield(ME, ts(10), PeerId(3));
        assert_eq!(out, vec![Message::new(MessageKind::Grant, ME, PeerId(0), ts(10))]);
        assert_eq!(a.current_grant(), Some((ts(2), PeerId(0))));
    }

    #[test]
    fn stale_yield_from_a_non_holder_is_ignored() {
        let mut a = ArbiterState::new();
        a.on_request(ME, ts(2), ts(1), PeerId(0));
        let out = a.on_yield(ME, ts(10), PeerId(99));
        assert!(out.is_empty());
        assert_eq!(a.current_grant(), Some((ts(1), PeerId(0))));
    }

    #[test]
    fn release_promotes_the_waiting_queue() {
        let mut a = ArbiterState::new();
        a.on_request(ME, ts(2), ts(1), PeerId(0));
        a.on_request(ME, ts(8), ts(7), PeerId(2));
        let out = a.on_release(ME, ts(9), PeerId(0));
        assert_eq!(out, vec![Message::new(MessageKind::Grant, ME, PeerId(2), ts(9))]);
        assert_eq!(a.current_grant(), Some((ts(7), PeerId(2))));
    }

    #[test]
    fn release_with_no_match_and_nothing_pending_is_a_silent_no_op() {
        let mut a = ArbiterState::new();
        let out = a.on_release(ME, ts(1), PeerId(42));
        assert!(out.is_empty());
        assert_eq!(a.current_grant(), None);
    }
}
