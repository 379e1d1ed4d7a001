mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::teach_handler, api::classify_handler),
    components(schemas(types::TeachForm, types::ClassifyForm))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/teach", post(api::teach_handler))
        .route("/classify", post(api::classify_handler))
        .route("/models", get(api::list_models_handler))
        .route("/models/{model}", delete(api::delete_model_handler))
        .route("/models/{model}/classes", get(api::list_classes_handler))
        .route("/models/{model}/classes/{class}", delete(api::delete_class_handler))
        .route("/cleanup", post(api::cleanup_handler))
        .route("/stats", get(api::stats_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
