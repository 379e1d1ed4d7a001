use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// API错误类型
pub struct AppError(pub StatusCode, pub anyhow::Error);

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn unauthorized() -> Self {
        Self(StatusCode::UNAUTHORIZED, anyhow::anyhow!("无效的鉴权 token"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, format!("Something went wrong: {}", self.1)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}
