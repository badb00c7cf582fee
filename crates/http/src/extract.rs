//! Extractors whose rejections use the [`AppError`] envelope.

use axum::extract::FromRequest;

use crate::AppError;

/// JSON request body. Malformed or mistyped bodies are reported as
/// `validation_error` instead of axum's plain-text rejection.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};

    fn post(content_type: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let AppJson(numbers) = AppJson::<Vec<i64>>::from_request(post("application/json", "[1, 2]"), &())
            .await
            .unwrap();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn syntax_and_type_errors_are_validation_errors() {
        let broken = AppJson::<serde_json::Value>::from_request(post("application/json", "{\"name\":"), &())
            .await
            .unwrap_err();
        assert_eq!(broken.code(), "validation_error");

        let mistyped = AppJson::<Vec<i64>>::from_request(post("application/json", "{\"name\":\"x\"}"), &())
            .await
            .unwrap_err();
        assert_eq!(mistyped.code(), "validation_error");
    }

    #[tokio::test]
    async fn missing_content_type_is_a_bad_request() {
        let err = AppJson::<Vec<i64>>::from_request(post("text/plain", "[1]"), &())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }
}
