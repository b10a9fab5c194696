//! Loopback-only request filter.
//!
//! # Responsibilities
//! - Decide whether a peer address is loopback (IPv4, IPv6, IPv4-mapped IPv6)
//! - Reject HTTP requests from any other peer with 403
//!
//! # Design Decisions
//! - Fail closed: a request without connection info is rejected

use std::net::IpAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::PeerAddr;
use crate::observability::metrics;

/// True for `127.0.0.0/8`, `::1`, and `::ffff:127.x.y.z`.
pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Axum middleware: only loopback peers get through.
///
/// Needs the router served with `into_make_service_with_connect_info::<PeerAddr>()`.
pub async fn local_only(req: Request<Body>, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<PeerAddr>>()
        .map(|ConnectInfo(PeerAddr(addr))| *addr);

    match peer {
        Some(addr) if is_loopback(addr.ip()) => next.run(req).await,
        Some(addr) => {
            tracing::warn!(peer_addr = %addr, "Rejected non-loopback peer");
            metrics::record_rejected_peer("request");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
        None => {
            tracing::warn!("Rejected request without connection info");
            metrics::record_rejected_peer("request");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}
