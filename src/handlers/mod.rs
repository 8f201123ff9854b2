// src/handlers/mod.rs
pub mod campaigns;
pub mod error;
pub mod jobs;
pub mod output;
pub mod status;
pub mod workspaces;

use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::middleware;
use crate::AppState;

/// All routes with shared state and middleware applied
pub fn build_router(state: Arc<AppState>) -> Router {
    // Everything under here needs a bearer token
    let protected = Router::new()
        .merge(campaigns::campaign_routes())
        .merge(jobs::job_routes())
        .merge(workspaces::workspace_routes())
        .route_layer(axum::middleware::from_fn(middleware::auth::auth_middleware));

    Router::new()
        .merge(protected)
        .merge(status::status_routes())
        .merge(output::output_routes())
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ProviderError;
    use crate::providers::testing::{
        FakeImageModel, FakeVideoSource, ScriptedTextModel, BRIEF_JSON, PROMPTS_JSON,
    };
    use crate::providers::TextModel;
    use crate::workflow::CampaignWorkflows;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    /// Text model that holds every call until the test opens the gate
    struct GatedTextModel {
        gate: Arc<Semaphore>,
        inner: ScriptedTextModel,
    }

    #[async_trait]
    impl TextModel for GatedTextModel {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ProviderError::Api {
                    status: 503,
                    body: e.to_string(),
                })?;
            self.inner.complete(system, prompt).await
        }
    }

    fn scripted() -> ScriptedTextModel {
        ScriptedTextModel::new().reply(BRIEF_JSON).reply(PROMPTS_JSON)
    }

    fn full_workflows(text: Arc<dyn TextModel>, images: FakeImageModel) -> CampaignWorkflows {
        CampaignWorkflows::new(3)
            .with_text_model(text)
            .with_image_model(Arc::new(images))
            .with_video_source(Arc::new(FakeVideoSource::with_clips(2)))
    }

    fn app(workflows: CampaignWorkflows) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::in_memory(AppConfig::default(), workflows));
        (build_router(state.clone()), state)
    }

    fn token(state: &AppState, owner: &str) -> String {
        state.jwt.issue_token(owner, chrono::Duration::hours(1)).unwrap()
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn wait_for_terminal(router: &Router, bearer: &str, job_id: &str) -> Value {
        for _ in 0..200 {
            let (_, job) = send(router, Method::GET, &format!("/api/jobs/{}", job_id), Some(bearer), None).await;
            if job["status"] == "completed" || job["status"] == "failed" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal status", job_id);
    }

    fn acme() -> Value {
        json!({"brandName": "Acme", "campaignGoal": "awareness", "channel": "instagram"})
    }

    #[tokio::test]
    async fn test_campaign_lifecycle_over_http() {
        let gate = Arc::new(Semaphore::new(0));
        let text = Arc::new(GatedTextModel {
            gate: gate.clone(),
            inner: scripted(),
        });
        let (router, state) = app(full_workflows(text, FakeImageModel::new()));
        let u1 = token(&state, "u1");

        let (status, started) = send(&router, Method::POST, "/api/campaigns", Some(&u1), Some(acme())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id = started["jobId"].as_str().unwrap().to_string();
        let workspace_id = started["workspaceId"].as_str().unwrap().to_string();

        // First poll: already running, before any provider has answered
        let (status, first) = send(&router, Method::GET, &format!("/api/jobs/{}", job_id), Some(&u1), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["status"], "running");
        assert!(first["progress"].as_u64().unwrap() > 0);
        assert!(first.get("result").is_none());

        gate.add_permits(1);
        let done = wait_for_terminal(&router, &u1, &job_id).await;
        assert_eq!(done["status"], "completed");
        assert_eq!(done["progress"], 100);
        assert!(done.get("error").is_none());
        assert!(done["result"]["adImages"][0]["url"].as_str().unwrap().starts_with("/outputs/"));

        let (_, ws) = send(&router, Method::GET, &format!("/api/workspaces/{}", workspace_id), Some(&u1), None).await;
        assert_eq!(ws["versionCount"], 1);
        assert_eq!(ws["currentVersionId"], job_id.as_str());
        assert_eq!(ws["currentOutputs"], done["result"]);
        assert_eq!(ws["inputs"]["brandName"], "Acme");

        let (_, jobs) = send(&router, Method::GET, "/api/jobs", Some(&u1), None).await;
        assert_eq!(jobs.as_array().unwrap().len(), 1);
        assert!(jobs[0].get("result").is_none());
    }

    #[tokio::test]
    async fn test_missing_brand_is_rejected_before_any_job() {
        let (router, state) = app(full_workflows(Arc::new(scripted()), FakeImageModel::new()));
        let u1 = token(&state, "u1");

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/campaigns",
            Some(&u1),
            Some(json!({"campaignGoal": "awareness"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "brandName is required");

        let (_, jobs) = send(&router, Method::GET, "/api/jobs", Some(&u1), None).await;
        assert_eq!(jobs, json!([]));
        let (_, workspaces) = send(&router, Method::GET, "/api/workspaces", Some(&u1), None).await;
        assert_eq!(workspaces, json!([]));
    }

    #[tokio::test]
    async fn test_provider_failure_fails_job_and_keeps_versions() {
        let (router, state) = app(full_workflows(
            Arc::new(scripted()),
            FakeImageModel::failing("quota exceeded"),
        ));
        let u1 = token(&state, "u1");

        let (_, started) = send(&router, Method::POST, "/api/campaigns", Some(&u1), Some(acme())).await;
        let job_id = started["jobId"].as_str().unwrap();
        let workspace_id = started["workspaceId"].as_str().unwrap();

        let done = wait_for_terminal(&router, &u1, job_id).await;
        assert_eq!(done["status"], "failed");
        assert_eq!(done["progress"], 100);
        assert!(done.get("result").is_none());
        assert!(done["error"].as_str().unwrap().contains("provider failure"));

        let (_, ws) = send(&router, Method::GET, &format!("/api/workspaces/{}", workspace_id), Some(&u1), None).await;
        assert_eq!(ws["versionCount"], 0);
    }

    #[tokio::test]
    async fn test_other_owner_sees_not_found() {
        let (router, state) = app(full_workflows(Arc::new(scripted()), FakeImageModel::new()));
        let u1 = token(&state, "u1");
        let u2 = token(&state, "u2");

        let (_, started) = send(&router, Method::POST, "/api/campaigns", Some(&u1), Some(acme())).await;
        let job_id = started["jobId"].as_str().unwrap();
        let workspace_id = started["workspaceId"].as_str().unwrap();

        let (status, body) = send(&router, Method::GET, &format!("/api/jobs/{}", job_id), Some(&u2), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Job not found");

        let (status, _) = send(&router, Method::GET, &format!("/api/workspaces/{}", workspace_id), Some(&u2), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &router,
            Method::PATCH,
            &format!("/api/workspaces/{}/inputs", workspace_id),
            Some(&u2),
            Some(json!({"tone": "hijacked"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&router, Method::GET, "/api/jobs/does-not-exist", Some(&u1), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_requests_without_valid_token_are_unauthorized() {
        let (router, _state) = app(full_workflows(Arc::new(scripted()), FakeImageModel::new()));

        let (status, body) = send(&router, Method::GET, "/api/jobs", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(&router, Method::POST, "/api/campaigns", Some("not-a-jwt"), Some(acme())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, Method::GET, "/api/status", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_provider_is_a_configuration_error() {
        let text_only = CampaignWorkflows::new(3).with_text_model(Arc::new(scripted()));
        let (router, state) = app(text_only);
        let u1 = token(&state, "u1");

        let (status, body) = send(&router, Method::POST, "/api/campaigns", Some(&u1), Some(acme())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["message"].as_str().unwrap().contains("not configured"));

        let (_, jobs) = send(&router, Method::GET, "/api/jobs", Some(&u1), None).await;
        assert_eq!(jobs, json!([]));

        // Brand analysis needs only the text model
        let (status, started) = send(&router, Method::POST, "/api/brands/analyze", Some(&u1), Some(acme())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(started.get("workspaceId").is_none());
        let done = wait_for_terminal(&router, &u1, started["jobId"].as_str().unwrap()).await;
        assert_eq!(done["status"], "completed");
        assert_eq!(done["result"]["campaignBrief"]["keyMessages"], json!(["Reliable", "Fast"]));

        let (_, status_body) = send(&router, Method::GET, "/api/status", None, None).await;
        assert_eq!(status_body["pipelines"]["brand_analysis"], true);
        assert_eq!(status_body["pipelines"]["video"], false);
        assert_eq!(status_body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_patch_inputs_merges_and_regeneration_appends() {
        let text = ScriptedTextModel::new()
            .reply(BRIEF_JSON)
            .reply(PROMPTS_JSON)
            .reply(BRIEF_JSON)
            .reply(PROMPTS_JSON);
        let (router, state) = app(full_workflows(Arc::new(text), FakeImageModel::new()));
        let u1 = token(&state, "u1");

        let (_, started) = send(&router, Method::POST, "/api/campaigns", Some(&u1), Some(acme())).await;
        let workspace_id = started["workspaceId"].as_str().unwrap().to_string();
        wait_for_terminal(&router, &u1, started["jobId"].as_str().unwrap()).await;

        let (status, ws) = send(
            &router,
            Method::PATCH,
            &format!("/api/workspaces/{}/inputs", workspace_id),
            Some(&u1),
            Some(json!({"tone": "playful"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ws["inputs"]["tone"], "playful");
        assert_eq!(ws["inputs"]["channel"], "instagram");
        assert_eq!(ws["versionCount"], 1);

        let mut again = acme();
        again["workspaceId"] = json!(workspace_id);
        let (status, restarted) = send(&router, Method::POST, "/api/campaigns", Some(&u1), Some(again)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(restarted["workspaceId"], workspace_id.as_str());
        wait_for_terminal(&router, &u1, restarted["jobId"].as_str().unwrap()).await;

        let (_, versions) = send(
            &router,
            Method::GET,
            &format!("/api/workspaces/{}/versions", workspace_id),
            Some(&u1),
            None,
        )
        .await;
        assert_eq!(versions.as_array().unwrap().len(), 2);
    }
}
