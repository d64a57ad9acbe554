//! Deterministic computation of each peer's Maekawa quorum.

use maekawa_wire::PeerId;

use crate::error::CoreError;

/// The set of peers whose unanimous grant a peer must collect to enter the
/// critical section. Arranges `0..n` into a `ceil(sqrt(n))`-wide row-major
/// grid and unions `i`'s row with `i`'s column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quorum {
    members: Vec<PeerId>,
}

impl Quorum {
    /// Builds `i`'s quorum for a system of `n` peers. Never changes at
    /// runtime: membership is purely a function of `(n, i)`.
    pub fn build(n: u32, i: PeerId) -> Result<Self, CoreError> {
        if n == 0 {
            return Err(CoreError::EmptySystem);
        }
        if i.0 >= n {
            return Err(CoreError::PeerIdOutOfRange { peer: i, n });
        }

        let side = (n as f64).sqrt().ceil() as u32;
        let row = i.0 / side;
        let col = i.0 % side;

        let mut members: Vec<PeerId> = Vec::new();
        // Row: every peer sharing `i`'s row.
        for j in row * side..((row + 1) * side).min(n) {
            members.push(PeerId(j));
        }
        // Column: every peer sharing `i`'s column, not already added.
        let mut k = col;
        while k < n {
            let candidate = PeerId(k);
            if !members.contains(&candidate) {
                members.push(candidate);
            }
            k += side;
        }

        Ok(Quorum { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.members.contains(&peer)
    }

    pub fn members(&self) -> &[PeerId] {
        &self.members
    }

    /// Every quorum member except `self`; used when multicasting REQUEST and
    /// RELEASE, which never need to reach the sender itself.
    pub fn others(&self, me: PeerId) -> impl Iterator<Item = PeerId> + '_ {
        self.members.iter().copied().filter(move |&p| p != me)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_square_quorum_has_size_two_sqrt_n_minus_one() {
        // N=4: side=2, every quorum has exactly 2*sqrt(4)-1 = 3 members.
        for i in 0..4 {
            assert_eq!(Quorum::build(4, PeerId(i)).unwrap().len(), 3);
        }
    }

    #[test]
    fn single_peer_quorum_is_itself() {
        let q = Quorum::build(1, PeerId(0)).unwrap();
        assert_eq!(q.members(), &[PeerId(0)]);
    }

    #[test]
    fn non_square_n_has_no_duplicate_members() {
        let q = Quorum::build(5, PeerId(4)).unwrap();
        let mut members = q.members().to_vec();
        let before = members.len();
        members.sort();
        members.dedup();
        assert_eq!(members.len(), before);
    }

    #[test]
    fn all_pairs_of_quorums_intersect_for_n_up_to_64() {
        for n in 1..=64u32 {
            let quorums: Vec<Quorum> = (0..n).map(|i| Quorum::build(n, PeerId(i)).unwrap()).collect();
            for (i, qi) in quorums.iter().enumerate() {
                for qj in &quorums[i..] {
                    let intersects = qi.members().iter().any(|m| qj.contains(*m));
                    assert!(intersects, "quorums must pairwise intersect for n={n}");
                }
            }
        }
    }

    #[test]
    fn rejects_an_out_of_range_peer_id() {
        assert!(matches!(
            Quorum::build(4, PeerId(4)),
            Err(CoreError::PeerIdOutOfRange { peer: PeerId(4), n: 4 })
        ));
    }

    #[test]
    fn rejects_an_empty_system() {
        assert!(matches!(Quorum::build(0, PeerId(0)), Err(CoreError::EmptySystem)));
    }
}
