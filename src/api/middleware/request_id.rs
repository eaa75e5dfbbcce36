use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Reuse the caller's `x-request-id` or mint one, and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(req).await;
    };

    req.headers_mut().insert(X_REQUEST_ID.clone(), value.clone());
    let mut response = next.run(req).await;
    response.headers_mut().insert(X_REQUEST_ID.clone(), value);

    response
}
