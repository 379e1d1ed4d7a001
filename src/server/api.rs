use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;
use rand::distr::{Alphanumeric, SampleString};
use serde_json::{Value, json};

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::metrics;
use crate::vdb::TeachRequest;

/// 教学一个新类别
#[utoipa::path(
    post,
    path = "/teach",
    request_body(content = TeachForm, content_type = "multipart/form-data"),
)]
pub async fn teach_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<TeachRequestForm>,
) -> Result<Json<Value>> {
    let req = TeachRequest {
        model_name: data.model_name.clone(),
        class_name: data.class_name.clone(),
        num_images: data.num_images.unwrap_or(8),
        source_dir: data.source_dir.clone().map(PathBuf::from),
        prefix: state.storage.prefix.clone(),
    };

    info!("教学请求: model='{}' class='{}'", req.model_name, req.class_name);

    if data.background.unwrap_or(false) {
        Arc::clone(&state.db)
            .teach_detached(req)
            .await
            .inspect_err(|_| metrics::inc_teach("error"))?;
        metrics::inc_teach("background");
        return Ok(Json(json!({ "status": "training in progress" })));
    }

    let outcome = state.db.teach(&req).await.inspect_err(|_| metrics::inc_teach("error"))?;
    metrics::inc_teach("ok");
    Ok(Json(json!(outcome)))
}

/// 识别一张图片
#[utoipa::path(
    post,
    path = "/classify",
    request_body(content = ClassifyForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = ClassifyResponse),
    )
)]
pub async fn classify_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<ClassifyRequest>,
) -> Result<Json<Value>> {
    let start = Instant::now();

    // 相机上传可能没有文件名，随机命名后走内容哈希匹配
    let file_name = match &data.file.metadata.file_name {
        Some(file_name) if !file_name.is_empty() => file_name.clone(),
        _ => format!("{}.jpg", Alphanumeric.sample_string(&mut rand::rng(), 16)),
    };

    // 每个请求独立的临时目录，并发上传同名文件互不影响；
    // 保留原始文件名，精确匹配阶梯的文件名一级依赖它
    let tmp_dir = std::env::temp_dir()
        .join("imteach")
        .join(Alphanumeric.sample_string(&mut rand::rng(), 8));
    std::fs::create_dir_all(&tmp_dir)?;
    let tmp = tmp_dir.join(&file_name);
    std::fs::write(&tmp, &data.file.contents)?;

    info!("识别上传图片: {}", file_name);
    let result = state.db.classify(&tmp, &state.storage.prefix, data.model.as_deref()).await;
    let _ = std::fs::remove_dir_all(&tmp_dir);

    let result = result.inspect_err(|_| metrics::inc_classify("error"))?;
    metrics::inc_classify("ok");
    metrics::observe_classify_duration(start.elapsed().as_secs_f64());

    Ok(Json(json!({
        "time": start.elapsed().as_millis(),
        "result": result.iter().map(|m| (m.score, m.class_name.clone())).collect::<Vec<_>>(),
    })))
}

fn check_token(state: &AppState, token: &str) -> Result<()> {
    if token != state.token {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

/// 模型列表
#[utoipa::path(get, path = "/models")]
pub async fn list_models_handler(
    AuthBearer(token): AuthBearer,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    let models = state.db.list_models().await?;
    Ok(Json(json!({ "models": models })))
}

/// 删除模型及其所有类别
#[utoipa::path(delete, path = "/models/{model}")]
pub async fn delete_model_handler(
    AuthBearer(token): AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    state.db.delete_model(&model, &state.storage.prefix).await?;
    Ok(Json(json!({ "ok": true })))
}

/// 模型下的类别列表
#[utoipa::path(get, path = "/models/{model}/classes")]
pub async fn list_classes_handler(
    AuthBearer(token): AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    let classes = state.db.list_classes(&model).await?;
    Ok(Json(json!({ "classes": classes })))
}

/// 删除单个类别
#[utoipa::path(delete, path = "/models/{model}/classes/{class}")]
pub async fn delete_class_handler(
    AuthBearer(token): AuthBearer,
    State(state): State<Arc<AppState>>,
    Path((model, class)): Path<(String, String)>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    state.db.delete_class(&model, &class, &state.storage.prefix).await?;
    Ok(Json(json!({ "ok": true })))
}

/// 清理没有对应类别的孤儿文件
#[utoipa::path(post, path = "/cleanup")]
pub async fn cleanup_handler(
    AuthBearer(token): AuthBearer,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    let (files, dirs) = state.db.cleanup_images(&state.storage.prefix).await?;
    Ok(Json(json!({ "files_removed": files, "dirs_removed": dirs })))
}

/// 系统统计信息
#[utoipa::path(get, path = "/stats")]
pub async fn stats_handler(
    AuthBearer(token): AuthBearer,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;
    let stats = state.db.stats().await?;
    Ok(Json(json!(stats)))
}
