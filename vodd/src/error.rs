use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Forbidden(String),
    ResourceNotFound(String),
    BadRequest(String),
    Upstream(String),
    InternalServerError(anyhow::Error),
}

impl AppError {
    pub fn unauthorized<T>(t: T) -> Self
    where
        T: ToString,
    {
        AppError::Unauthorized(t.to_string())
    }

    pub fn forbidden<T>(t: T) -> Self
    where
        T: ToString,
    {
        AppError::Forbidden(t.to_string())
    }

    pub fn resource_not_found<T>(t: T) -> Self
    where
        T: ToString,
    {
        AppError::ResourceNotFound(t.to_string())
    }

    pub fn bad_request<T>(t: T) -> Self
    where
        T: ToString,
    {
        AppError::BadRequest(t.to_string())
    }

    pub fn upstream<T>(t: T) -> Self
    where
        T: ToString,
    {
        AppError::Upstream(t.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err),
            AppError::Forbidden(err) => (StatusCode::FORBIDDEN, err),
            AppError::ResourceNotFound(err) => (StatusCode::NOT_FOUND, err),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err),
            AppError::Upstream(err) => (StatusCode::BAD_GATEWAY, err),
            AppError::InternalServerError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(api::response::Error::new(message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        AppError::InternalServerError(err.into())
    }
}
