use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::api::handler_utils::{into_json, map_diff_error, validation_error, ApiObject};
use crate::api::server::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffQuery {
    #[serde(default)]
    pub image1: Option<String>,
    #[serde(default)]
    pub image2: Option<String>,
}

pub async fn diff_handler(
    State(state): State<AppState>,
    query: Result<Query<DiffQuery>, QueryRejection>,
) -> ApiObject<Value> {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return validation_error(format!(
                "Invalid query string: {}",
                rejection.body_text()
            ))
        }
    };
    let image1 = match required_image(query.image1, "image1") {
        Ok(image) => image,
        Err(message) => return validation_error(message),
    };
    let image2 = match required_image(query.image2, "image2") {
        Ok(image) => image,
        Err(message) => return validation_error(message),
    };

    let span = info_span!(
        "diff",
        request_id = %Uuid::new_v4(),
        image1 = %image1,
        image2 = %image2
    );
    async move {
        info!("reconstructing dockerfiles");
        match state.diff_service.diff(image1.as_str(), image2.as_str()).await {
            Ok(result) => (StatusCode::OK, into_json(result)),
            Err(error) => map_diff_error(error),
        }
    }
    .instrument(span)
    .await
}

fn required_image(value: Option<String>, field: &str) -> Result<String, String> {
    match value {
        Some(image) if !image.trim().is_empty() => Ok(image),
        _ => Err(format!("Query parameter '{field}' is required")),
    }
}
