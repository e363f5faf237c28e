use std::collections::HashSet;

/// Candidate work orders split by whether Jira already carries them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationState {
    /// No issue references these ids yet.
    pub pending: Vec<i64>,
    /// An issue exists but the work order is still open in Track-It!.
    pub stuck: Vec<i64>,
}

/// `pending = candidates \ existing`, `stuck = candidates ∩ existing`.
/// Candidate order is preserved and duplicate candidates are collapsed.
pub fn partition(candidates: &[i64], existing: &HashSet<i64>) -> MigrationState {
    let mut seen = HashSet::with_capacity(candidates.len());
    let mut state = MigrationState::default();
    for &id in candidates {
        if !seen.insert(id) {
            continue;
        }
        if existing.contains(&id) {
            state.stuck.push(id);
        } else {
            state.pending.push(id);
        }
    }
    state
}
