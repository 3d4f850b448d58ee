//! Shared response envelope
//!
//! Every operation result is wrapped in `{success, data?, message?}`;
//! validation failures additionally carry a per-field `errors` list. Store
//! errors are logged with full detail here and leave the process as a
//! generic message only.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::types::CaselogError;

pub type FullBody = Full<Bytes>;

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// 200 with a data payload
pub fn ok<T: Serialize>(data: &T) -> Response<FullBody> {
    json_response(StatusCode::OK, &json!({ "success": true, "data": data }))
}

/// 201 with the created entity
pub fn created<T: Serialize>(data: &T) -> Response<FullBody> {
    json_response(
        StatusCode::CREATED,
        &json!({ "success": true, "data": data }),
    )
}

/// 200 with a message and no data
pub fn ok_message(message: &str) -> Response<FullBody> {
    json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": message }),
    )
}

/// Failure envelope for any operation error
pub fn failure(err: &CaselogError) -> Response<FullBody> {
    // Full detail stays server-side for store/internal failures
    if matches!(
        err,
        CaselogError::Database(_) | CaselogError::Internal(_) | CaselogError::Config(_)
    ) {
        error!("Request failed: {}", err);
    }

    let body = match err.field_errors() {
        Some(fields) => json!({
            "success": false,
            "message": err.public_message(),
            "errors": fields,
        }),
        None => json!({
            "success": false,
            "message": err.public_message(),
        }),
    };

    json_response(err.status_code(), &body)
}

/// Render a service result into the envelope
pub fn respond<T: Serialize>(result: crate::types::Result<T>) -> Response<FullBody> {
    match result {
        Ok(data) => ok(&data),
        Err(err) => failure(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldError;

    fn body_json(response: Response<FullBody>) -> serde_json::Value {
        use http_body_util::BodyExt;
        let bytes = tokio_test::block_on(async { response.into_body().collect().await })
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn success_envelope_carries_data() {
        let response = ok(&serde_json::json!({ "n": 1 }));
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["n"], 1);
    }

    #[test]
    fn validation_failure_lists_fields() {
        let err = CaselogError::Validation(vec![FieldError::new("action", "is required")]);
        let response = failure(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["field"], "action");
    }

    #[test]
    fn database_failure_is_generic() {
        let err = CaselogError::Database("mongodb://internal detail".into());
        let body = body_json(failure(&err));
        assert_eq!(body["message"], "Database error");
    }
}
