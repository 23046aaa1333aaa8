//! Error conversions - rendering [`AppError`] as an HTTP response
//!
//! The body is an RFC 7807 problem document extended with the numeric
//! `code` member that clients branch on.

use super::app_error::AppError;

impl AppError {
    /// Response body: RFC 7807 plus `code`
    pub fn to_problem_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": format!("https://httpstatuses.io/{}", self.status_code()),
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "code": self.code(),
            "detail": self.message(),
            "action": self.action(),
        })
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.to_problem_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind::ErrorKind;

    #[test]
    fn test_problem_json_carries_code_and_detail() {
        let err = AppError::new(ErrorKind::Unauthorized, "token expired").with_code(10104);
        let body = err.to_problem_json();
        assert_eq!(body["status"], 401);
        assert_eq!(body["code"], 10104);
        assert_eq!(body["detail"], "token expired");
        assert_eq!(body["title"], "Unauthorized");
        assert!(body["action"].is_null());
    }

    #[test]
    fn test_problem_json_carries_action() {
        let err = AppError::new(ErrorKind::TooManyRequests, "too many login attempts")
            .with_code(10106)
            .with_action("Try again in 15 minutes");
        let body = err.to_problem_json();
        assert_eq!(body["status"], 429);
        assert_eq!(body["action"], "Try again in 15 minutes");
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_into_response_status() {
        use axum::response::IntoResponse;

        let response = AppError::new(ErrorKind::TooManyRequests, "slow down").into_response();
        assert_eq!(response.status().as_u16(), 429);
    }
}
