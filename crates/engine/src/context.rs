//! Shared engine services and per-run execution context.

use std::collections::HashMap;
use std::sync::Arc;

use atelier_compute::poll::PollConfig;
use atelier_compute::JobRouter;
use atelier_core::backoff::RetryPolicy;
use atelier_core::types::DbId;
use atelier_db::models::agency::{Agency, ModelProfile};

use crate::hosted::HostedMediaApi;
use crate::store::OrchestratorStore;
use crate::throttle::RequestThrottle;

/// Injected collaborators shared by the runner, scheduler and executors.
///
/// Assembled once at startup; every piece is an explicit service with its
/// own lifecycle (the tracker and throttle run their eviction loops as
/// background tasks), never ambient global state.
pub struct EngineServices {
    pub store: Arc<dyn OrchestratorStore>,
    pub router: Arc<JobRouter>,
    pub throttle: Arc<RequestThrottle>,
    pub hosted: Arc<dyn HostedMediaApi>,
    pub retry_policy: RetryPolicy,
    pub poll: PollConfig,
}

/// Immutable context for one run: the tenant and the target model the
/// content is generated for.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: DbId,
    pub agency: Agency,
    pub profile: ModelProfile,
}

impl RunContext {
    /// Key for the per-agency outbound request throttle.
    pub fn throttle_key(&self) -> String {
        format!("agency-{}", self.agency.id)
    }

    /// The template variable namespace for this run.
    ///
    /// Only present profile fields become variables; a `{{model.persona}}`
    /// reference on a profile without a persona passes through unresolved,
    /// the same as a typo would.
    pub fn template_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("agency.name".to_string(), self.agency.name.clone());
        vars.insert("model.name".to_string(), self.profile.name.clone());
        if let Some(persona) = &self.profile.persona {
            vars.insert("model.persona".to_string(), persona.clone());
        }
        if let Some(appearance) = &self.profile.appearance {
            vars.insert("model.appearance".to_string(), appearance.clone());
        }
        if let Some(style) = &self.profile.style {
            vars.insert("model.style".to_string(), style.clone());
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context() -> RunContext {
        RunContext {
            run_id: 1,
            agency: Agency {
                id: 7,
                name: "Northlight".into(),
                credit_balance: 100,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            profile: ModelProfile {
                id: 3,
                agency_id: 7,
                name: "Lena".into(),
                persona: Some("adventurous".into()),
                appearance: None,
                style: Some("film noir".into()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    #[test]
    fn throttle_key_is_per_agency() {
        assert_eq!(context().throttle_key(), "agency-7");
    }

    #[test]
    fn vars_cover_present_fields_only() {
        let vars = context().template_vars();
        assert_eq!(vars["model.name"], "Lena");
        assert_eq!(vars["model.persona"], "adventurous");
        assert_eq!(vars["agency.name"], "Northlight");
        assert!(!vars.contains_key("model.appearance"));
    }
}
