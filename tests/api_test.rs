//! HTTP API integration tests
//!
//! Requests go through `routes::dispatch` against in-memory state, so the
//! full handler stack (auth gate, body parsing, store, read model, error
//! rendering) runs without a socket.

use async_trait::async_trait;
use callisto::config::Args;
use callisto::model::{Category, CategoryPatch, NewCategory};
use callisto::routes::{self, ApiRequest, BoxBody};
use callisto::server::{self, AppState};
use callisto::services::{ConsoleNotifier, ModelClient, ModelError, RoadmapGenerator};
use callisto::store::{
    CategoryRepository, MemoryCategoryRepository, MemoryItemRepository, MemoryUserRepository,
    ProgressStore,
};
use clap::Parser;
use http_body_util::BodyExt;
use hyper::{Method, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn dev_args() -> Args {
    Args::parse_from(["callisto", "--dev-mode", "--in-memory"])
}

fn state() -> AppState {
    AppState::in_memory(dev_args(), RoadmapGenerator::unconfigured()).unwrap()
}

async fn body_json(resp: Response<BoxBody>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(state: &AppState, req: ApiRequest) -> (StatusCode, Value) {
    let resp = routes::dispatch(state, req).await;
    let status = resp.status();
    (status, body_json(resp).await)
}

async fn signup(state: &AppState, email: &str) -> String {
    let (status, body) = call(
        state,
        ApiRequest::new(Method::POST, "/auth/signup").with_json(&json!({
            "email": email,
            "name": "Ada",
            "password": "secret1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create_category(state: &AppState, token: &str, name: &str) -> String {
    let (status, body) = call(
        state,
        ApiRequest::new(Method::POST, "/categories")
            .with_bearer(token)
            .with_json(&json!({"name": name, "color": "bg-blue-500"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["category"]["icon"], "Tag");
    body["category"]["id"].as_str().unwrap().to_string()
}

async fn create_item(state: &AppState, token: &str, category_id: &str, name: &str) -> Value {
    let (status, body) = call(
        state,
        ApiRequest::new(Method::POST, "/items")
            .with_bearer(token)
            .with_json(&json!({"categoryId": category_id, "name": name})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["item"].clone()
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_protected_routes_require_token() {
    let state = state();

    let (status, body) = call(&state, ApiRequest::new(Method::GET, "/categories")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::GET, "/items").with_bearer("not-a-jwt"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_signup_me_and_onboarding() {
    let state = state();
    let token = signup(&state, "Ada@Example.com").await;

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::GET, "/auth/me").with_bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("otp").is_none());

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, "/auth/onboarding")
            .with_bearer(&token)
            .with_json(&json!({"useCase": "team"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["onboardingCompleted"], true);

    let (status, _) = call(
        &state,
        ApiRequest::new(Method::POST, "/auth/signup").with_json(&json!({
            "email": "ada@example.com",
            "name": "Ada again",
            "password": "secret1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// =============================================================================
// Goals and topic tree
// =============================================================================

#[tokio::test]
async fn test_topic_endpoints_drive_progress() {
    let state = state();
    let token = signup(&state, "ada@example.com").await;
    let category_id = create_category(&state, &token, "Languages").await;
    let item = create_item(&state, &token, &category_id, "Learn Rust").await;
    let item_id = item["id"].as_str().unwrap().to_string();
    assert_eq!(item["description"], "My personal goal: Learn Rust");
    assert_eq!(item["category"]["name"], "Languages");
    assert_eq!(item["progress"], 0);

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, &format!("/items/{}/topics", item_id)).with_bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["topics"][0]["title"], "New Module");
    let topic_id = body["item"]["topics"][0]["id"].as_str().unwrap().to_string();

    for id in ["obj-a", "obj-b"] {
        let (status, _) = call(
            &state,
            ApiRequest::new(
                Method::POST,
                &format!("/items/{}/topics/{}/subtopics", item_id, topic_id),
            )
            .with_bearer(&token)
            .with_json(&json!({"id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(
        &state,
        ApiRequest::new(
            Method::PUT,
            &format!("/items/{}/topics/{}/subtopics/obj-a", item_id, topic_id),
        )
        .with_bearer(&token)
        .with_json(&json!({"isCompleted": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["progress"], 50);
    assert_eq!(body["item"]["topics"][0]["subTopics"][1]["title"], "New Objective");

    let (_, body) = call(
        &state,
        ApiRequest::new(
            Method::PUT,
            &format!("/items/{}/topics/{}/subtopics/obj-b", item_id, topic_id),
        )
        .with_bearer(&token)
        .with_json(&json!({"isCompleted": true})),
    )
    .await;
    assert_eq!(body["item"]["progress"], 100);
    assert_eq!(body["item"]["topics"][0]["isCompleted"], true);

    // Duplicate sibling id
    let (status, _) = call(
        &state,
        ApiRequest::new(
            Method::POST,
            &format!("/items/{}/topics/{}/subtopics", item_id, topic_id),
        )
        .with_bearer(&token)
        .with_json(&json!({"id": "obj-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Bad deadline leaves the topic untouched
    let (status, _) = call(
        &state,
        ApiRequest::new(Method::PUT, &format!("/items/{}/topics/{}", item_id, topic_id))
            .with_bearer(&token)
            .with_json(&json!({"title": "Ownership", "deadline": "soon"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = call(
        &state,
        ApiRequest::new(Method::GET, &format!("/items/{}", item_id)).with_bearer(&token),
    )
    .await;
    assert_eq!(body["item"]["topics"][0]["title"], "New Module");
}

#[tokio::test]
async fn test_items_are_private_and_filterable() {
    let state = state();
    let ada = signup(&state, "ada@example.com").await;
    let bob = signup(&state, "bob@example.com").await;
    let category_id = create_category(&state, &ada, "Languages").await;
    let item = create_item(&state, &ada, &category_id, "Learn Rust").await;
    let item_id = item["id"].as_str().unwrap();

    let (status, _) = call(
        &state,
        ApiRequest::new(Method::GET, &format!("/items/{}", item_id)).with_bearer(&bob),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bob cannot file his goal under Ada's category
    let (status, _) = call(
        &state,
        ApiRequest::new(Method::POST, "/items")
            .with_bearer(&bob)
            .with_json(&json!({"categoryId": category_id, "name": "Steal"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(
        &state,
        ApiRequest::new(Method::GET, "/items?filter=completed-topics").with_bearer(&ada),
    )
    .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    let (_, body) = call(
        &state,
        ApiRequest::new(Method::PUT, &format!("/items/{}", item_id))
            .with_bearer(&ada)
            .with_json(&json!({
                "status": "In progress",
                "topics": [{"id": "t1", "title": "Basics", "isCompleted": true}]
            })),
    )
    .await;
    assert_eq!(body["item"]["status"], "In progress");

    let (_, body) = call(
        &state,
        ApiRequest::new(Method::GET, "/items?filter=completed-topics").with_bearer(&ada),
    )
    .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, _) = call(
        &state,
        ApiRequest::new(Method::PUT, &format!("/items/{}", item_id))
            .with_bearer(&ada)
            .with_json(&json!({"status": "Done"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_import_dashboard_and_search() {
    let state = state();
    let token = signup(&state, "ada@example.com").await;
    let category_id = create_category(&state, &token, "Languages").await;

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, "/items/import")
            .with_bearer(&token)
            .with_json(&json!({
                "categoryId": category_id,
                "goal": {
                    "name": "Learn Go",
                    "topics": [
                        {"title": "Goroutines", "isCompleted": true, "subTopics": [
                            {"title": "Channels", "isCompleted": true}
                        ]},
                        {"title": "Modules"}
                    ]
                }
            })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["item"]["progress"], 100);

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, "/items/import")
            .with_bearer(&token)
            .with_json(&json!({
                "categoryId": category_id,
                "goal": {"name": "Broken", "topics": [{"title": "ok"}, {"notes": "no title"}]}
            })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Topic 2 is missing or has invalid \"title\"");

    let (_, dash) = call(
        &state,
        ApiRequest::new(Method::GET, "/dashboard").with_bearer(&token),
    )
    .await;
    assert_eq!(dash["activeGoals"], 1);
    assert_eq!(dash["completedTopics"], 1);
    assert_eq!(dash["totalCategories"], 1);
    assert_eq!(dash["categoryCounts"][0]["count"], 1);

    let (_, found) = call(
        &state,
        ApiRequest::new(Method::GET, "/search?q=chan").with_bearer(&token),
    )
    .await;
    assert_eq!(found["results"][0]["type"], "subtopic");
    assert_eq!(found["results"][0]["title"], "Channels");

    let (_, data) = call(&state, ApiRequest::new(Method::GET, "/data").with_bearer(&token)).await;
    assert_eq!(data["categories"].as_array().unwrap().len(), 1);
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_roadmap_requires_configuration() {
    let state = state();
    let token = signup(&state, "ada@example.com").await;

    let (status, _) = call(
        &state,
        ApiRequest::new(Method::POST, "/generate-roadmap").with_json(&json!({"itemName": "Rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, "/generate-roadmap")
            .with_bearer(&token)
            .with_json(&json!({"itemName": "Rust"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn test_id_less_adds_in_a_row_get_distinct_ids() {
    let state = state();
    let token = signup(&state, "ada@example.com").await;
    let category_id = create_category(&state, &token, "Languages").await;
    let item = create_item(&state, &token, &category_id, "Learn Rust").await;
    let item_id = item["id"].as_str().unwrap().to_string();

    for _ in 0..20 {
        let (status, body) = call(
            &state,
            ApiRequest::new(Method::POST, &format!("/items/{}/topics", item_id))
                .with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (_, body) = call(
        &state,
        ApiRequest::new(Method::GET, &format!("/items/{}", item_id)).with_bearer(&token),
    )
    .await;
    let topics = body["item"]["topics"].as_array().unwrap();
    let ids: HashSet<&str> = topics.iter().map(|t| t["id"].as_str().unwrap()).collect();
    assert_eq!(topics.len(), 20);
    assert_eq!(ids.len(), 20);

    let topic_id = topics[0]["id"].as_str().unwrap().to_string();
    for _ in 0..5 {
        let (status, body) = call(
            &state,
            ApiRequest::new(
                Method::POST,
                &format!("/items/{}/topics/{}/subtopics", item_id, topic_id),
            )
            .with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
}

// =============================================================================
// Roadmap routes with a scripted model
// =============================================================================

const TWO_TOPICS: &str = r#"[
    {"title": "Foundations", "subTopics": [{"title": "Syntax"}, {"title": "Tooling"}]},
    {"title": "Ownership", "subTopics": [{"title": "Moves"}]}
]"#;

/// Replays queued `(delay, reply)` pairs, one per call
struct PacedModel {
    script: Mutex<VecDeque<(Duration, Result<String, ModelError>)>>,
    calls: AtomicUsize,
}

impl PacedModel {
    fn new(script: Vec<(Duration, Result<String, ModelError>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModelClient for PacedModel {
    async fn generate_json(
        &self,
        _model: &str,
        _prompt: &str,
        _schema: &Value,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let (delay, reply) = next.unwrap_or_else(|| {
            (
                Duration::ZERO,
                Err(ModelError::Unavailable("script exhausted".into())),
            )
        });
        tokio::time::sleep(delay).await;
        reply
    }
}

fn state_with_model(args: Args, model: Arc<PacedModel>, candidates: &[&str]) -> AppState {
    let roadmap = RoadmapGenerator::new(
        model,
        candidates.iter().map(|c| c.to_string()).collect(),
    )
    .with_call_timeout(args.model_timeout());
    AppState::in_memory(args, roadmap).unwrap()
}

#[tokio::test]
async fn test_apply_roadmap_replaces_topics_only_on_success() {
    let model = PacedModel::new(vec![
        (Duration::ZERO, Err(ModelError::Unavailable("HTTP 503".into()))),
        (Duration::ZERO, Ok(TWO_TOPICS.to_string())),
    ]);
    let state = state_with_model(dev_args(), model.clone(), &["m-one"]);
    let token = signup(&state, "ada@example.com").await;
    let category_id = create_category(&state, &token, "Languages").await;
    let item = create_item(&state, &token, &category_id, "Learn Rust").await;
    let item_id = item["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &state,
        ApiRequest::new(Method::POST, &format!("/items/{}/topics", item_id))
            .with_bearer(&token)
            .with_json(&json!({"id": "manual", "title": "Hand written"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Every candidate fails: existing topics stay as they were
    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, &format!("/items/{}/roadmap", item_id)).with_bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
    assert_eq!(body["code"], "UPSTREAM_ERROR");

    let (_, body) = call(
        &state,
        ApiRequest::new(Method::GET, &format!("/items/{}", item_id)).with_bearer(&token),
    )
    .await;
    let topics = body["item"]["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["id"], "manual");

    // Success replaces the whole array
    let (status, body) = call(
        &state,
        ApiRequest::new(Method::POST, &format!("/items/{}/roadmap", item_id)).with_bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let topics = body["item"]["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["title"], "Foundations");
    assert_eq!(topics[1]["title"], "Ownership");
    assert!(topics.iter().all(|t| t["id"] != "manual"));
    assert!(topics.iter().all(|t| t["isCompleted"] == false));
    assert_eq!(body["item"]["progress"], 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_slow_candidates_fit_within_the_request_deadline() {
    let args = Args::parse_from([
        "callisto",
        "--dev-mode",
        "--in-memory",
        "--request-timeout-ms",
        "300",
        "--model-timeout-ms",
        "300",
    ]);
    let pace = Duration::from_millis(200);
    let model = PacedModel::new(vec![
        (pace, Err(ModelError::Unavailable("HTTP 503".into()))),
        (pace, Ok(TWO_TOPICS.to_string())),
    ]);
    let state = state_with_model(args, model.clone(), &["slow", "fast"]);
    let token = signup(&state, "ada@example.com").await;

    let generate = ApiRequest::new(Method::POST, "/generate-roadmap")
        .with_bearer(&token)
        .with_json(&json!({"itemName": "Rust"}));
    assert_eq!(state.request_deadline(&generate), Duration::from_millis(900));
    assert_eq!(
        state.request_deadline(&ApiRequest::new(Method::GET, "/items")),
        Duration::from_millis(300)
    );

    let resp = server::respond(&state, generate).await;
    let status = resp.status();
    let body = body_json(resp).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["topics"].as_array().unwrap().len(), 2);
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_candidate_past_its_call_timeout_is_skipped() {
    let args = Args::parse_from([
        "callisto",
        "--dev-mode",
        "--in-memory",
        "--model-timeout-ms",
        "50",
    ]);
    let model = PacedModel::new(vec![
        (Duration::from_secs(5), Ok("[]".to_string())),
        (Duration::ZERO, Ok(TWO_TOPICS.to_string())),
        (Duration::from_secs(5), Ok("[]".to_string())),
        (Duration::from_secs(5), Ok("[]".to_string())),
    ]);
    let state = state_with_model(args, model.clone(), &["stalled", "next"]);
    let token = signup(&state, "ada@example.com").await;
    let generate = || {
        ApiRequest::new(Method::POST, "/generate-roadmap")
            .with_bearer(&token)
            .with_json(&json!({"itemName": "Rust"}))
    };

    let (status, body) = call(&state, generate()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["topics"].as_array().unwrap().len(), 2);
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);

    // Every candidate stalls: the chain ends with the timeout as last error
    let (status, body) = call(&state, generate()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 4);
}

// =============================================================================
// Category delete guard
// =============================================================================

/// Category repository that counts delete calls
struct SpyCategories {
    inner: MemoryCategoryRepository,
    deletes: Arc<AtomicUsize>,
}

#[async_trait]
impl CategoryRepository for SpyCategories {
    async fn list(&self, user_id: &str) -> callisto::Result<Vec<Category>> {
        self.inner.list(user_id).await
    }

    async fn find(&self, user_id: &str, id: &str) -> callisto::Result<Option<Category>> {
        self.inner.find(user_id, id).await
    }

    async fn create(&self, user_id: &str, category: NewCategory) -> callisto::Result<Category> {
        self.inner.create(user_id, category).await
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: CategoryPatch,
    ) -> callisto::Result<Option<Category>> {
        self.inner.update(user_id, id, patch).await
    }

    async fn delete(&self, user_id: &str, id: &str) -> callisto::Result<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(user_id, id).await
    }
}

#[test]
fn test_category_in_use_is_never_deleted() {
    tokio_test::block_on(async {
        let deletes = Arc::new(AtomicUsize::new(0));
        let store = ProgressStore::new(
            Arc::new(SpyCategories {
                inner: MemoryCategoryRepository::new(),
                deletes: deletes.clone(),
            }),
            Arc::new(MemoryItemRepository::new()),
        );
        let state = AppState::with_services(
            dev_args(),
            Arc::new(MemoryUserRepository::new()),
            store,
            Arc::new(ConsoleNotifier),
            RoadmapGenerator::unconfigured(),
            "memory",
        )
        .unwrap();

        let token = signup(&state, "ada@example.com").await;
        let category_id = create_category(&state, &token, "Languages").await;
        let item = create_item(&state, &token, &category_id, "Learn Rust").await;

        let (status, body) = call(
            &state,
            ApiRequest::new(Method::DELETE, &format!("/categories/{}", category_id))
                .with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("1 goal(s)"));
        assert_eq!(deletes.load(Ordering::SeqCst), 0);

        // Once the goal is gone the delete goes through
        let (status, _) = call(
            &state,
            ApiRequest::new(
                Method::DELETE,
                &format!("/items/{}", item["id"].as_str().unwrap()),
            )
            .with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &state,
            ApiRequest::new(Method::DELETE, &format!("/categories/{}", category_id))
                .with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Category deleted successfully");
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
    });
}

#[tokio::test]
async fn test_unknown_route_and_preflight() {
    let state = state();

    let resp = routes::dispatch(&state, ApiRequest::new(Method::OPTIONS, "/items")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, _) = call(&state, ApiRequest::new(Method::GET, "/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&state, ApiRequest::new(Method::PATCH, "/categories")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = call(&state, ApiRequest::new(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["persistence"], "memory");
    assert_eq!(body["mail"], "console");
    assert_eq!(body["roadmap"]["configured"], false);
}
