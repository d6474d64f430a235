//! HTTP routes for Callisto

pub mod auth_routes;
pub mod categories;
pub mod health;
pub mod items;
pub mod overview;
pub mod request;
pub mod response;
pub mod roadmap;

use hyper::{Method, Response};

pub use auth_routes::handle_auth_request;
pub use health::{build_health_response, health_check, HealthResponse};
pub use request::ApiRequest;
pub use response::{
    cors_preflight, error_response, json_response, method_not_allowed, not_found_response,
    BoxBody, ErrorResponse,
};

use crate::server::AppState;
use crate::types::Result;

/// Route a buffered request. Handler errors are rendered as JSON error
/// bodies here, so this never fails.
pub async fn dispatch(state: &AppState, req: ApiRequest) -> Response<BoxBody> {
    if req.method == Method::OPTIONS {
        return cors_preflight();
    }

    match route(state, &req).await {
        Ok(response) => response,
        Err(err) => error_response(&err, state.args.dev_mode),
    }
}

/// Whether the request runs the roadmap model chain
pub fn calls_model(req: &ApiRequest) -> bool {
    req.method == Method::POST
        && matches!(
            req.segments().as_slice(),
            ["generate-roadmap"] | ["items", _, "roadmap"]
        )
}

async fn route(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let segments = req.segments();
    let method = &req.method;

    match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => Ok(health_check(state)),

        (_, ["auth", action]) => handle_auth_request(state, req, action).await,

        // Categories
        (&Method::GET, ["categories"]) => categories::handle_list(state, req).await,
        (&Method::POST, ["categories"]) => categories::handle_create(state, req).await,
        (&Method::PUT, ["categories", id]) => categories::handle_update(state, req, id).await,
        (&Method::DELETE, ["categories", id]) => categories::handle_delete(state, req, id).await,

        // Items
        (&Method::GET, ["items"]) => items::handle_list(state, req).await,
        (&Method::POST, ["items"]) => items::handle_create(state, req).await,
        (&Method::POST, ["items", "import"]) => items::handle_import(state, req).await,
        (&Method::GET, ["items", id]) => items::handle_get(state, req, id).await,
        (&Method::PUT, ["items", id]) => items::handle_update(state, req, id).await,
        (&Method::DELETE, ["items", id]) => items::handle_delete(state, req, id).await,
        (&Method::POST, ["items", id, "roadmap"]) => {
            items::handle_apply_roadmap(state, req, id).await
        }

        // Topic tree
        (&Method::POST, ["items", id, "topics"]) => items::handle_add_topic(state, req, id).await,
        (&Method::PUT, ["items", id, "topics", topic_id]) => {
            items::handle_update_topic(state, req, id, topic_id).await
        }
        (&Method::DELETE, ["items", id, "topics", topic_id]) => {
            items::handle_delete_topic(state, req, id, topic_id).await
        }
        (&Method::POST, ["items", id, "topics", topic_id, "subtopics"]) => {
            items::handle_add_sub_topic(state, req, id, topic_id).await
        }
        (&Method::PUT, ["items", id, "topics", topic_id, "subtopics", sub_topic_id]) => {
            items::handle_update_sub_topic(state, req, id, topic_id, sub_topic_id).await
        }
        (&Method::DELETE, ["items", id, "topics", topic_id, "subtopics", sub_topic_id]) => {
            items::handle_delete_sub_topic(state, req, id, topic_id, sub_topic_id).await
        }

        // Whole-account reads
        (&Method::GET, ["data"]) => overview::handle_data(state, req).await,
        (&Method::GET, ["dashboard"]) => overview::handle_dashboard(state, req).await,
        (&Method::GET, ["search"]) => overview::handle_search(state, req).await,

        (&Method::POST, ["generate-roadmap"]) => roadmap::handle_generate(state, req).await,

        // Method not allowed
        (_, ["health"])
        | (_, ["categories"])
        | (_, ["categories", _])
        | (_, ["items"])
        | (_, ["items", _])
        | (_, ["items", _, "roadmap"])
        | (_, ["items", _, "topics"])
        | (_, ["items", _, "topics", _])
        | (_, ["items", _, "topics", _, "subtopics"])
        | (_, ["items", _, "topics", _, "subtopics", _])
        | (_, ["data"])
        | (_, ["dashboard"])
        | (_, ["search"])
        | (_, ["generate-roadmap"]) => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&req.path)),
    }
}
