//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table. The transition rules
//! for runs and node results live in `atelier_core::lifecycle` and operate
//! on the same ids.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Workflow lifecycle status.
    WorkflowStatus {
        Draft = 1,
        Active = 2,
        Paused = 3,
        Archived = 4,
    }
}

define_status_enum! {
    /// Run execution status.
    RunStatus {
        Running = 1,
        WaitingForReview = 2,
        Completed = 3,
        Failed = 4,
        Cancelled = 5,
    }
}

define_status_enum! {
    /// Per-node execution status within a run.
    NodeResultStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        WaitingForReview = 5,
        Skipped = 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::lifecycle;

    #[test]
    fn run_ids_are_stable() {
        assert_eq!(RunStatus::Running.id(), 1);
        assert_eq!(RunStatus::Cancelled.id(), 5);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            NodeResultStatus::Pending,
            NodeResultStatus::Running,
            NodeResultStatus::Completed,
            NodeResultStatus::Failed,
            NodeResultStatus::WaitingForReview,
            NodeResultStatus::Skipped,
        ] {
            assert_eq!(NodeResultStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(NodeResultStatus::from_id(99), None);
    }

    #[test]
    fn ids_agree_with_lifecycle_rules() {
        // The core lifecycle module duplicates these ids; keep them honest.
        assert!(lifecycle::run::is_terminal(RunStatus::Completed.id()));
        assert!(lifecycle::run::is_terminal(RunStatus::Failed.id()));
        assert!(lifecycle::run::is_terminal(RunStatus::Cancelled.id()));
        assert!(!lifecycle::run::is_terminal(RunStatus::WaitingForReview.id()));

        assert!(lifecycle::node::is_terminal(NodeResultStatus::Skipped.id()));
        assert!(!lifecycle::node::is_terminal(
            NodeResultStatus::WaitingForReview.id()
        ));
        assert!(lifecycle::node::can_transition(
            NodeResultStatus::WaitingForReview.id(),
            NodeResultStatus::Completed.id()
        ));
    }
}
