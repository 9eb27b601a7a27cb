//! Routing of generation work to the right backend family.
//!
//! Generation and editing executors dispatch on the `model` config field:
//! self-hosted models go through the compute [`JobRouter`] (submit, then
//! poll to completion); hosted models go through the per-agency throttle
//! and the retry wrapper to the provider gateway. Executors receive the
//! raw completion payload and normalize it themselves.

use serde_json::Value;

use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;
use crate::hosted::HostedRequest;
use crate::retry::retry_with_backoff;

/// Model id of the internal self-hosted upscaler worker.
pub const UPSCALER_MODEL: &str = "upscaler";

/// Models served by the self-hosted diffusion pools.
const SELF_HOSTED_MODELS: &[&str] = &["sdxl", "flux-dev", "wan-video", UPSCALER_MODEL];

/// Which backend family serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRoute {
    SelfHosted,
    Hosted,
}

/// Resolve the backend family for a model id. Unknown models default to
/// the hosted gateway, which rejects them with a provider error.
pub fn route_for_model(model: &str) -> BackendRoute {
    if SELF_HOSTED_MODELS.contains(&model) {
        BackendRoute::SelfHosted
    } else {
        BackendRoute::Hosted
    }
}

/// Run one generation task and return the backend's raw payload.
pub async fn run_media_task(
    services: &EngineServices,
    ctx: &RunContext,
    model: &str,
    task: &'static str,
    params: Value,
) -> Result<Value, EngineError> {
    match route_for_model(model) {
        BackendRoute::SelfHosted => {
            let mut payload = serde_json::json!({ "model": model, "task": task });
            if let (Some(map), Some(extra)) = (payload.as_object_mut(), params.as_object()) {
                for (k, v) in extra {
                    map.insert(k.clone(), v.clone());
                }
            }

            let submission = services.router.submit(&payload).await?;
            if submission.used_fallback {
                tracing::info!(
                    run_id = ctx.run_id,
                    job_id = %submission.job_id,
                    reason = submission.fallback_reason.as_deref().unwrap_or("unknown"),
                    "Job routed to serverless fallback",
                );
            }

            let output =
                atelier_compute::poll::poll_job(&services.router, &submission.job_id, &services.poll)
                    .await?;
            Ok(output)
        }
        BackendRoute::Hosted => {
            let request = HostedRequest {
                model: model.to_string(),
                task,
                params,
            };
            let hosted = &services.hosted;
            let policy = &services.retry_policy;
            let response = services
                .throttle
                .run(&ctx.throttle_key(), async move {
                    retry_with_backoff(policy, || hosted.run(&request)).await
                })
                .await?;
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_hosted_models_route_to_pools() {
        assert_eq!(route_for_model("sdxl"), BackendRoute::SelfHosted);
        assert_eq!(route_for_model("flux-dev"), BackendRoute::SelfHosted);
        assert_eq!(route_for_model("wan-video"), BackendRoute::SelfHosted);
        assert_eq!(route_for_model(UPSCALER_MODEL), BackendRoute::SelfHosted);
    }

    #[test]
    fn hosted_models_route_to_gateway() {
        assert_eq!(route_for_model("flux-pro"), BackendRoute::Hosted);
        assert_eq!(route_for_model("flux-kontext"), BackendRoute::Hosted);
        assert_eq!(route_for_model("kling"), BackendRoute::Hosted);
        assert_eq!(route_for_model("caption-v1"), BackendRoute::Hosted);
    }

    #[test]
    fn unknown_model_defaults_to_hosted() {
        assert_eq!(route_for_model("imagen-9000"), BackendRoute::Hosted);
    }
}
