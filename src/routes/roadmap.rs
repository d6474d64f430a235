//! POST /generate-roadmap: preview a generated topic tree without saving it

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::request::ApiRequest;
use super::response::{json_response, BoxBody};
use crate::model::Topic;
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoadmapRequest {
    pub item_name: String,
}

#[derive(Serialize)]
struct RoadmapResponse {
    topics: Vec<Topic>,
}

pub async fn handle_generate(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    state.gate.authenticate(&req.headers)?;
    let body: RoadmapRequest = req.json()?;
    let topics = state.roadmap.generate(&body.item_name).await?;
    Ok(json_response(StatusCode::OK, &RoadmapResponse { topics }))
}
