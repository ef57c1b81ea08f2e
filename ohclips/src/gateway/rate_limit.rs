use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{error::ApiError, state::AppState};
use crate::store::{RateDecision, RateQuota};

/// Request budget per client IP for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub route: &'static str,
    pub path: &'static str,
    pub max: u32,
    pub window: Duration,
    pub message: &'static str,
}

pub const LIKE_POLICY: RatePolicy = RatePolicy {
    route: "like",
    path: "/api/like",
    max: 20,
    window: Duration::from_secs(60 * 60),
    message: "Too many requests from this IP, please try again after an hour",
};

pub const UPLOAD_POLICY: RatePolicy = RatePolicy {
    route: "upload",
    path: "/api/getUploadAuth",
    max: 5,
    window: Duration::from_secs(24 * 60 * 60),
    message: "Too many requests from this IP, please try again after a day",
};

const POLICIES: [RatePolicy; 2] = [LIKE_POLICY, UPLOAD_POLICY];

impl RatePolicy {
    pub fn for_path(path: &str) -> Option<RatePolicy> {
        let path = path.trim_end_matches('/');
        POLICIES.iter().copied().find(|policy| policy.path == path)
    }

    pub fn quota(&self) -> RateQuota {
        RateQuota {
            max: self.max,
            window: self.window,
        }
    }
}

/// Left-most `x-forwarded-for` entry, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn enforce(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(policy) = RatePolicy::for_path(req.uri().path()) else {
        return next.run(req).await;
    };
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let client = client_ip(req.headers(), peer);

    match state.rate_limits.check(policy.route, &client, policy.quota()).await {
        Ok(RateDecision::Limited { retry_after }) => {
            log::info!("rate limit hit on {} by {client}", policy.route);
            ApiError::RateLimited {
                message: policy.message,
                retry_after,
            }
            .into_response()
        }
        Ok(RateDecision::Allowed) => next.run(req).await,
        Err(err) => {
            // Fails open.
            log::error!("rate limit store failed for {}: {err}", policy.route);
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn policies_match_exact_paths() {
        assert_eq!(RatePolicy::for_path("/api/like"), Some(LIKE_POLICY));
        assert_eq!(RatePolicy::for_path("/api/getUploadAuth/"), Some(UPLOAD_POLICY));
        assert_eq!(RatePolicy::for_path("/api/comment"), None);
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
