use std::collections::HashSet;

use crate::models::RankedScore;

/// Maximum recommendation slate size per open house
pub const SLATE_SIZE: usize = 3;

/// Trim a fairness-adjusted, score-sorted candidate list to the final
/// slate, preferring tier coverage over strict score order.
///
/// With more than [`SLATE_SIZE`] candidates, the first pass takes the
/// highest-scored candidate of each tier not seen yet; the second pass
/// fills any open slots with the best remaining scores. The slate order
/// therefore need not be score-descending. Three or fewer candidates
/// are returned untouched.
pub fn ensure_diversity(candidates: Vec<RankedScore>) -> Vec<RankedScore> {
    if candidates.len() <= SLATE_SIZE {
        return candidates;
    }

    let mut slate: Vec<RankedScore> = Vec::with_capacity(SLATE_SIZE);
    let mut chosen_agents = HashSet::new();
    let mut used_tiers = HashSet::new();

    for candidate in &candidates {
        if slate.len() >= SLATE_SIZE {
            break;
        }
        if used_tiers.insert(candidate.tier) {
            chosen_agents.insert(candidate.agent_id);
            slate.push(candidate.clone());
        }
    }

    for candidate in candidates {
        if slate.len() >= SLATE_SIZE {
            break;
        }
        if chosen_agents.insert(candidate.agent_id) {
            slate.push(candidate);
        }
    }

    slate.truncate(SLATE_SIZE);
    slate
}
