use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use studymode_core::CoreError;
use studymode_ingest::ParseError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Core(e) => {
                let status = match e {
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Validation(_) | CoreError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            ApiError::Parse(_) => (StatusCode::UNPROCESSABLE_ENTITY, "parse"),
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody { error: self.to_string(), kind });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_by_kind() {
        let cases = [
            (ApiError::from(CoreError::NotFound("card")), StatusCode::NOT_FOUND),
            (ApiError::from(CoreError::Validation("question must not be empty")), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(CoreError::InvalidInput("quality".into())), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(CoreError::Storage("disk full".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::from(ParseError::Empty), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, want) in cases {
            assert_eq!(err.into_response().status(), want);
        }
    }
}
