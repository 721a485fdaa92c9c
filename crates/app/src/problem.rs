use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::session::SessionError;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    pub fn session_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "session_not_found",
            "no rack session with this id",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SessionError> for ProblemResponse {
    fn from(err: SessionError) -> Self {
        let detail = err.to_string();
        match err {
            SessionError::InvalidLocation(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_location", detail)
            }
            SessionError::Search(_) => Self::new(StatusCode::BAD_GATEWAY, "search_failed", detail),
            SessionError::Superseded => {
                Self::new(StatusCode::CONFLICT, "search_superseded", detail)
            }
            SessionError::NoRack => Self::new(StatusCode::CONFLICT, "no_rack_loaded", detail),
        }
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
