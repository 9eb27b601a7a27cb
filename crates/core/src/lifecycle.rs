//! Run and node-result status state machines.
//!
//! Status transitions are monotonic: once a run or node result reaches a
//! terminal state it never leaves it, and a paused state can only move
//! forward. The rules here operate on raw SMALLINT status ids so this
//! module stays free of internal dependencies; the `db` crate's status
//! enums use the same 1-based ids.

/// Run status ids matching the `run_statuses` seed data.
pub mod run {
    /// Returns the set of valid target status ids reachable from `from`.
    ///
    /// Terminal states (Completed=3, Failed=4, Cancelled=5) return an
    /// empty slice because no further transitions are allowed.
    pub fn valid_transitions(from: i16) -> &'static [i16] {
        match from {
            // Running -> WaitingForReview, Completed, Failed, Cancelled
            1 => &[2, 3, 4, 5],
            // WaitingForReview -> Running, Failed, Cancelled
            2 => &[1, 4, 5],
            // Terminal: Completed, Failed, Cancelled
            3 | 4 | 5 => &[],
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// A run in a terminal state accepts no further work.
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, 3 | 4 | 5)
    }
}

/// Node-result status ids matching the `node_result_statuses` seed data.
pub mod node {
    /// Returns the set of valid target status ids reachable from `from`.
    pub fn valid_transitions(from: i16) -> &'static [i16] {
        match from {
            // Pending -> Running, Skipped
            1 => &[2, 6],
            // Running -> Completed, Failed, WaitingForReview, Skipped
            2 => &[3, 4, 5, 6],
            // WaitingForReview -> Completed, Failed, Skipped
            5 => &[3, 4, 6],
            // Terminal: Completed, Failed, Skipped
            3 | 4 | 6 => &[],
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// A terminal node result is never re-executed (this is what makes
    /// resuming a run after a gate approval safe).
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, 3 | 4 | 6)
    }
}
