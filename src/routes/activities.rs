//! Activity feed API endpoints
//!
//! ## Endpoints
//!
//! - `GET /activities` - List activities with filter, sort, pagination
//! - `GET /activities/stats` - Aggregated statistics
//! - `GET /activities/search/{query}` - Relevance-ranked text search
//! - `POST /activities` - Record a new activity
//! - `POST /activities/bulk` - Apply one action across many activities
//! - `GET /activities/{id}` - Fetch one activity
//! - `PUT /activities/{id}` - Update mutable fields
//! - `DELETE /activities/{id}` - Soft delete (manager/super_admin only)
//!
//! ## Authentication
//!
//! All endpoints require a bearer token resolving to an actor `{id, role}`.
//! Agents see only activities they own or performed; managers and super
//! admins see everything.

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::activity::filter::{ListQuery, SearchQuery, StatsQuery};
use crate::activity::types::{BulkActionRequest, CreateActivityRequest, RequestContext,
                             UpdateActivityRequest};
use crate::activity::{ActivityService, Params};
use crate::auth::{extract_token_from_header, Actor};
use crate::routes::envelope::{self, FullBody};
use crate::server::AppState;
use crate::types::{CaselogError, Result};

/// Decode a raw query string into a key/value map
fn parse_query(query: Option<&str>) -> Params {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let value = urlencoding::decode(value).unwrap_or_default();
                params.insert(key.to_string(), value.to_string());
            }
        }
    }
    params
}

/// Resolve the acting identity from the Authorization header
fn authenticate(req: &Request<Incoming>, state: &AppState) -> Result<Actor> {
    let auth_header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = extract_token_from_header(auth_header)
        .ok_or_else(|| CaselogError::Unauthorized("No token provided".into()))?;

    let result = state.jwt.verify_token(token);
    if !result.valid {
        return Err(CaselogError::Unauthorized(
            result.error.unwrap_or_else(|| "Invalid token".into()),
        ));
    }

    match result.claims {
        Some(claims) => Ok(Actor::from_claims(claims)),
        None => Err(CaselogError::Unauthorized("Invalid token".into())),
    }
}

/// Open the activity service against the shared MongoDB client
async fn open_service(state: &AppState) -> Result<ActivityService> {
    let mongo = state
        .mongo
        .as_ref()
        .ok_or_else(|| CaselogError::Unavailable("Database not available".into()))?;
    ActivityService::open(mongo).await
}

/// IP and user agent captured for create-time metadata
fn request_context(req: &Request<Incoming>, addr: SocketAddr) -> RequestContext {
    let ip_address = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());

    let user_agent = req
        .headers()
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    RequestContext {
        ip_address: Some(ip_address),
        user_agent,
    }
}

/// Read and deserialize a JSON request body
async fn read_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|_| CaselogError::BadRequest("Invalid body".into()))?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| CaselogError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Main handler for /activities/* routes
pub async fn handle_activities_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    addr: SocketAddr,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/activities").unwrap_or("").to_string();

    match (method, subpath.as_str()) {
        // GET /activities - list with filters and pagination
        (Method::GET, "") | (Method::GET, "/") => handle_list(req, state).await,

        // GET /activities/stats - aggregation mode
        (Method::GET, "/stats") => handle_stats(req, state).await,

        // GET /activities/search/{query} - ranked text search
        (Method::GET, p) if p.starts_with("/search/") => {
            let raw = p.strip_prefix("/search/").unwrap_or("");
            let query = urlencoding::decode(raw).unwrap_or_default().to_string();
            handle_search(req, state, query).await
        }

        // POST /activities - record a new activity
        (Method::POST, "") | (Method::POST, "/") => handle_create(req, state, addr).await,

        // POST /activities/bulk - uniform mutation across a set
        (Method::POST, "/bulk") => handle_bulk(req, state).await,

        // GET /activities/{id}
        (Method::GET, p) if is_id_path(p) => {
            let id = p.trim_start_matches('/').to_string();
            handle_get(req, state, id).await
        }

        // PUT /activities/{id}
        (Method::PUT, p) if is_id_path(p) => {
            let id = p.trim_start_matches('/').to_string();
            handle_update(req, state, id).await
        }

        // DELETE /activities/{id} - role-gated soft delete
        (Method::DELETE, p) if is_id_path(p) => {
            let id = p.trim_start_matches('/').to_string();
            handle_delete(req, state, id).await
        }

        _ => envelope::failure(&CaselogError::NotFound("Not found".into())),
    }
}

fn is_id_path(subpath: &str) -> bool {
    let id = subpath.trim_start_matches('/');
    !id.is_empty() && !id.contains('/')
}

/// GET /activities
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let params = parse_query(req.uri().query());
    let query = match ListQuery::from_params(&params) {
        Ok(query) => query,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    envelope::respond(service.list(&query, &actor).await)
}

/// GET /activities/stats
async fn handle_stats(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let params = parse_query(req.uri().query());
    let query = match StatsQuery::from_params(&params) {
        Ok(query) => query,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    envelope::respond(service.stats(&query, &actor).await)
}

/// GET /activities/search/{query}
async fn handle_search(
    req: Request<Incoming>,
    state: Arc<AppState>,
    raw_query: String,
) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let params = parse_query(req.uri().query());
    let query = match SearchQuery::from_params(&raw_query, &params) {
        Ok(query) => query,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    envelope::respond(service.search(&query, &actor).await)
}

/// POST /activities
async fn handle_create(
    req: Request<Incoming>,
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let ctx = request_context(&req, addr);

    let body: CreateActivityRequest = match read_body(req).await {
        Ok(body) => body,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    match service.create(body, &actor, &ctx).await {
        Ok(view) => envelope::created(&view),
        Err(err) => envelope::failure(&err),
    }
}

/// GET /activities/{id}
async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    envelope::respond(service.get(&id, &actor).await)
}

/// PUT /activities/{id}
async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let body: UpdateActivityRequest = match read_body(req).await {
        Ok(body) => body,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    envelope::respond(service.update(&id, body, &actor).await)
}

/// DELETE /activities/{id}
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    match service.delete(&id, &actor).await {
        Ok(()) => envelope::ok_message("Activity deleted"),
        Err(err) => envelope::failure(&err),
    }
}

/// POST /activities/bulk
async fn handle_bulk(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let actor = match authenticate(&req, &state) {
        Ok(actor) => actor,
        Err(err) => return envelope::failure(&err),
    };

    let body: BulkActionRequest = match read_body(req).await {
        Ok(body) => body,
        Err(err) => return envelope::failure(&err),
    };

    let service = match open_service(&state).await {
        Ok(service) => service,
        Err(err) => return envelope::failure(&err),
    };

    match service.bulk(body, &actor).await {
        Ok(result) => envelope::ok(&result),
        Err(err) => {
            if matches!(err, CaselogError::Forbidden(_)) {
                warn!(actor = %actor.id, "bulk action denied");
            }
            envelope::failure(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_strings_are_decoded() {
        let params = parse_query(Some("search=policy%20renewal&page=2"));
        assert_eq!(params.get("search").map(String::as_str), Some("policy renewal"));
        assert_eq!(params.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn query_parsing_tolerates_noise() {
        let params = parse_query(Some("flag&=x&a=1"));
        assert_eq!(params.get("a").map(String::as_str), Some("1"));
        assert!(!params.contains_key("flag"));
    }

    #[test]
    fn id_paths_are_single_segments() {
        assert!(is_id_path("/665f1c2a9d3e4b0012345678"));
        assert!(!is_id_path("/"));
        assert!(!is_id_path(""));
        assert!(!is_id_path("/abc/def"));
    }
}
