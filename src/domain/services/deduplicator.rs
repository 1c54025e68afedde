//! Deduplicator (spec §4.H) — cross-phase deduplication keyed by SHA-256.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::entities::Candidate;

/// Result of deduplicating a candidate list: the surviving winners (one per
/// SHA-256 key) plus how many losers were collapsed.
pub struct DedupOutcome {
    pub winners: Vec<Candidate>,
    pub duplicates_collapsed: u32,
}

/// Priority order (spec §4.H): metadata over carving, higher score over
/// lower, non-partial over partial, earliest offset. Returns `true` if `a`
/// should win over `b`.
fn beats(a: &Candidate, b: &Candidate) -> bool {
    match a.provenance.dedup_priority().cmp(&b.provenance.dedup_priority()) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }
    match b.validation_score.cmp(&a.validation_score) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }
    match a.is_partial.cmp(&b.is_partial) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }
    let a_offset = a.offset().unwrap_or(u64::MAX);
    let b_offset = b.offset().unwrap_or(u64::MAX);
    a_offset < b_offset
}

/// Collapses duplicate candidates sharing a SHA-256 key, keeping the
/// highest-priority one per spec §4.H's ordering. Idempotent: running this
/// again over `winners` is a no-op since every key is already unique.
pub fn deduplicate(candidates: Vec<Candidate>) -> DedupOutcome {
    let mut by_hash: HashMap<String, Candidate> = HashMap::new();
    let mut collapsed = 0u32;

    for candidate in candidates {
        let key = candidate.sha256.clone().unwrap_or_default();
        match by_hash.get(&key) {
            Some(existing) if !beats(&candidate, existing) => {
                collapsed += 1;
            }
            Some(_) => {
                collapsed += 1;
                by_hash.insert(key, candidate);
            }
            None => {
                by_hash.insert(key, candidate);
            }
        }
    }

    DedupOutcome { winners: by_hash.into_values().collect(), duplicates_collapsed: collapsed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Provenance;

    fn candidate(provenance: Provenance, score: u8, offset: u64, sha256: &str) -> Candidate {
        let mut c = Candidate::from_offset(1, provenance, "src", offset, 100, "f", "jpeg", "jpg");
        c.validation_score = score;
        c.sha256 = Some(sha256.to_string());
        c.md5 = Some("m".to_string());
        c
    }

    #[test]
    fn metadata_wins_over_carving_for_same_hash() {
        let meta = candidate(Provenance::MetadataNtfs, 80, 500, "same");
        let carved = candidate(Provenance::Carving, 95, 10, "same");
        let outcome = deduplicate(vec![carved, meta]);
        assert_eq!(outcome.winners.len(), 1);
        assert_eq!(outcome.winners[0].provenance, Provenance::MetadataNtfs);
        assert_eq!(outcome.duplicates_collapsed, 1);
    }

    #[test]
    fn is_idempotent() {
        let a = candidate(Provenance::Carving, 95, 10, "x");
        let b = candidate(Provenance::Carving, 80, 20, "y");
        let first = deduplicate(vec![a, b]);
        assert_eq!(first.duplicates_collapsed, 0);
        let second = deduplicate(first.winners);
        assert_eq!(second.duplicates_collapsed, 0);
        assert_eq!(second.winners.len(), 2);
    }
}
