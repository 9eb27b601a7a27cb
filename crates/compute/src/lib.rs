//! Compute job routing for self-hosted generation backends.
//!
//! Jobs are submitted to a warm "dedicated" pool first (cheaper and
//! faster when awake, but it may need wake-up time) and fall back to an
//! always-available "serverless" pool when the dedicated submission fails
//! or times out. The [`tracker::JobRouteTracker`] remembers which pool
//! accepted each job so later status polls ask the right one.

pub mod backend;
pub mod error;
pub mod http;
pub mod poll;
pub mod router;
pub mod tracker;

pub use backend::{JobBackend, JobPoll, JobState, PoolKind};
pub use error::ComputeError;
pub use router::{JobRouter, Submission};
pub use tracker::JobRouteTracker;
