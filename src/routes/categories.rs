//! Category endpoints
//!
//! - GET    /categories       - list, newest first
//! - POST   /categories       - create (`icon` defaults to `Tag`)
//! - PUT    /categories/{id}  - partial update
//! - DELETE /categories/{id}  - delete; refused while goals still use it

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::request::ApiRequest;
use super::response::{json_response, BoxBody};
use crate::model::{CategoryPatch, NewCategory, DEFAULT_CATEGORY_ICON};
use crate::server::AppState;
use crate::services::CategoryView;
use crate::types::{CallistoError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CategoryRequest {
    fn into_new(self) -> Result<NewCategory> {
        match (present(self.name), present(self.color)) {
            (Some(name), Some(color)) => Ok(NewCategory {
                name,
                color,
                icon: present(self.icon).unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
            }),
            _ => Err(CallistoError::validation("Name and color are required")),
        }
    }

    fn into_patch(self) -> Result<CategoryPatch> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(CallistoError::validation("Name cannot be empty"));
        }
        Ok(CategoryPatch {
            name: present(self.name),
            color: present(self.color),
            icon: present(self.icon),
        })
    }
}

#[derive(Serialize)]
struct CategoriesResponse {
    categories: Vec<CategoryView>,
}

#[derive(Serialize)]
struct CategoryResponse {
    category: CategoryView,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub async fn handle_list(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let categories = state.store.list_categories(&auth.user_id).await?;
    Ok(json_response(
        StatusCode::OK,
        &CategoriesResponse {
            categories: categories.iter().map(CategoryView::from).collect(),
        },
    ))
}

pub async fn handle_create(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: CategoryRequest = req.json()?;
    let category = state
        .store
        .create_category(&auth.user_id, body.into_new()?)
        .await?;

    info!(user_id = %auth.user_id, category_id = %category.id, "Category created");
    Ok(json_response(
        StatusCode::CREATED,
        &CategoryResponse {
            category: CategoryView::from(&category),
        },
    ))
}

pub async fn handle_update(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: CategoryRequest = req.json()?;
    let category = state
        .store
        .update_category(&auth.user_id, id, body.into_patch()?)
        .await?;
    Ok(json_response(
        StatusCode::OK,
        &CategoryResponse {
            category: CategoryView::from(&category),
        },
    ))
}

pub async fn handle_delete(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let category = state.store.get_category(&auth.user_id, id).await?;

    let in_use = state
        .store
        .count_items_in_category(&auth.user_id, id)
        .await?;
    if in_use > 0 {
        return Err(CallistoError::Conflict(format!(
            "Cannot delete category \"{}\" because it contains {} goal(s). Please move or delete the goals first.",
            category.name, in_use
        )));
    }

    state.store.delete_category(&auth.user_id, id).await?;
    info!(user_id = %auth.user_id, category_id = %id, "Category deleted");
    Ok(json_response(
        StatusCode::OK,
        &MessageResponse {
            message: "Category deleted successfully",
        },
    ))
}
