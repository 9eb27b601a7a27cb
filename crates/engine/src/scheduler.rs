//! The trigger scheduler.
//!
//! A single fixed-interval poll selects due scheduled triggers,
//! re-validates their preconditions, and fires runs. A failed
//! precondition is a silent skip, never an error — but the schedule
//! always advances, so a broken trigger cannot re-fire in a tight loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use atelier_core::schedule::Schedule;
use atelier_db::models::status::WorkflowStatus;
use atelier_db::models::trigger::Trigger;

use crate::runner::Runner;
use crate::supervisor;

/// Default polling interval for the trigger loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Background trigger poller. One long-lived Tokio task fires runs for
/// due schedules.
pub struct TriggerScheduler {
    runner: Arc<Runner>,
    poll_interval: Duration,
}

impl TriggerScheduler {
    /// Create a scheduler with the default one-minute poll interval.
    pub fn new(runner: Arc<Runner>) -> Self {
        Self {
            runner,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval (tests use millisecond cadences).
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the scheduler loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Trigger scheduler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Trigger scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Trigger poll cycle failed");
                    }
                }
            }
        }
    }

    /// One poll cycle: fire every due trigger that passes its
    /// preconditions, advancing every due trigger's schedule either way.
    pub async fn poll_once(&self) -> anyhow::Result<()> {
        let store = &self.runner.services().store;
        let now = Utc::now();

        let due = store.due_triggers(now).await?;
        if due.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = due.len(), "Due triggers found");

        for trigger in due {
            let fired = match self.try_fire(&trigger).await {
                Ok(fired) => fired,
                Err(e) => {
                    tracing::error!(
                        trigger_id = trigger.id,
                        workflow_id = trigger.workflow_id,
                        error = %e,
                        "Trigger fire attempt failed",
                    );
                    false
                }
            };

            // Always advance the schedule, fired or not, so a failing
            // precondition cannot cause a tight re-fire loop.
            let next = self.compute_next(&trigger);
            store
                .record_trigger_decision(trigger.id, next, fired.then_some(now))
                .await?;
        }

        Ok(())
    }

    /// Re-validate preconditions and, if they hold, create a run and
    /// hand it to the runner on a supervised background task.
    async fn try_fire(&self, trigger: &Trigger) -> anyhow::Result<bool> {
        let store = &self.runner.services().store;

        let workflow = store.workflow(trigger.workflow_id).await?;

        if workflow.status_id != WorkflowStatus::Active.id() {
            tracing::debug!(trigger_id = trigger.id, "Skip: workflow not active");
            return Ok(false);
        }
        if workflow.model_profile_id.is_none() {
            tracing::debug!(trigger_id = trigger.id, "Skip: workflow has no target model");
            return Ok(false);
        }
        if workflow.nodes.0.is_empty() {
            tracing::debug!(trigger_id = trigger.id, "Skip: workflow graph is empty");
            return Ok(false);
        }

        let balance = store.credit_balance(workflow.agency_id).await?;
        if balance <= 0 {
            tracing::debug!(
                trigger_id = trigger.id,
                agency_id = workflow.agency_id,
                "Skip: agency has no credits",
            );
            return Ok(false);
        }

        let active = store.active_run_count(trigger.workflow_id).await?;
        if active >= trigger.max_concurrent_runs as i64 {
            tracing::debug!(
                trigger_id = trigger.id,
                active,
                cap = trigger.max_concurrent_runs,
                "Skip: concurrency cap reached",
            );
            return Ok(false);
        }

        let run = self.runner.start_run(trigger.workflow_id).await?;
        supervisor::spawn_run(Arc::clone(&self.runner), run.id);

        tracing::info!(
            trigger_id = trigger.id,
            workflow_id = trigger.workflow_id,
            run_id = run.id,
            "Trigger fired",
        );
        Ok(true)
    }

    /// Recompute `next_trigger_at` from the trigger's schedule config.
    /// Malformed schedule rows log and clear the next fire time rather
    /// than wedging the poll loop.
    fn compute_next(&self, trigger: &Trigger) -> Option<chrono::DateTime<Utc>> {
        let frequency = trigger.frequency.as_deref()?;
        let time = trigger.time_of_day.as_deref()?;
        let timezone = trigger.timezone.as_deref()?;

        match Schedule::parse(frequency, &trigger.days, time, timezone)
            .and_then(|s| s.next_trigger_at(Utc::now()))
        {
            Ok(next) => Some(next),
            Err(e) => {
                tracing::error!(
                    trigger_id = trigger.id,
                    error = %e,
                    "Could not compute next fire time; disabling schedule",
                );
                None
            }
        }
    }
}
