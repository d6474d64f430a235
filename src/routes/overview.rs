//! Whole-account read endpoints
//!
//! - GET /data       - categories and items in one response (initial load)
//! - GET /dashboard  - counters, per-item progress and per-category counts
//! - GET /search?q=  - search across categories, items, topics, objectives

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::request::ApiRequest;
use super::response::{json_response, BoxBody};
use crate::server::AppState;
use crate::services::catalog::{self, CategoryView, ItemView, SearchResult};
use crate::types::Result;

#[derive(Serialize)]
struct DataResponse {
    categories: Vec<CategoryView>,
    items: Vec<ItemView>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchResult>,
}

pub async fn handle_data(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let (categories, items) = state.store.load_all(&auth.user_id).await?;

    Ok(json_response(
        StatusCode::OK,
        &DataResponse {
            categories: categories.iter().map(CategoryView::from).collect(),
            items: catalog::item_views(items, &categories, catalog::today()),
        },
    ))
}

pub async fn handle_dashboard(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let (categories, items) = state.store.load_all(&auth.user_id).await?;
    Ok(json_response(
        StatusCode::OK,
        &catalog::dashboard(&categories, &items),
    ))
}

pub async fn handle_search(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let query = req.query_param("q").unwrap_or_default();

    let results = if query.trim().is_empty() {
        Vec::new()
    } else {
        let (categories, items) = state.store.load_all(&auth.user_id).await?;
        catalog::search(&query, &categories, &items)
    };

    Ok(json_response(StatusCode::OK, &SearchResponse { query, results }))
}
