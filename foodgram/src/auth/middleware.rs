use crate::{AppState, errors::Error};
use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Host the request was addressed to: the `Host` header, falling back to the URI authority
fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
}

/// Reject requests whose Host is not in `allowed_hosts`
pub async fn allowed_hosts_middleware(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    if let Some(host) = request_host(&request) {
        if !state.config.is_host_allowed(host) {
            debug!("Rejected request for disallowed host {}", host);
            return Err(Error::BadRequest {
                message: "Invalid host header".to_string(),
            });
        }
    }
    Ok(next.run(request).await)
}
