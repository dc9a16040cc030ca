//! Request-context middleware
//!
//! Captures request metadata for every request and makes it available to
//! the audit coordinator for the duration of the inner call:
//! - Full request URL (host from `Host`)
//! - Client IP from the socket peer
//! - User agent
//! - Session user from `x-user-id`, only when that header is trusted
//!
//! Behind a reverse proxy, `trust_forwarded_headers` takes the client IP from
//! the first `x-forwarded-for` hop and the scheme from `x-forwarded-proto`.
//! A first hop that is not an IP address is ignored.

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, Uri},
    response::Response,
};
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;

use super::context::RequestContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Layer that scopes each request with its `RequestContext`.
#[derive(Debug, Clone, Default)]
pub struct AuditContextLayer {
    trust: HeaderTrust,
}

/// Which client-supplied headers are believed.
#[derive(Debug, Clone, Copy, Default)]
struct HeaderTrust {
    user: bool,
    forwarded: bool,
}

impl AuditContextLayer {
    pub fn new(trust_user_header: bool) -> Self {
        Self {
            trust: HeaderTrust {
                user: trust_user_header,
                forwarded: false,
            },
        }
    }

    /// Believe `x-forwarded-for`/`x-forwarded-proto` set by a reverse proxy.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust.forwarded = trust;
        self
    }
}

impl<S> Layer<S> for AuditContextLayer {
    type Service = AuditContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditContextMiddleware {
            inner,
            trust: self.trust,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditContextMiddleware<S> {
    inner: S,
    trust: HeaderTrust,
}

impl<S> Service<Request> for AuditContextMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let context = capture(&request, self.trust);

        // Take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        debug!(
            url = ?context.url,
            ip = ?context.ip_address,
            user_id = ?context.actor_id,
            "Captured audit request context"
        );

        Box::pin(context.scope(async move { inner.call(request).await }))
    }
}

fn capture(request: &Request, trust: HeaderTrust) -> RequestContext {
    let headers = request.headers();

    let ip_address = trust
        .forwarded
        .then(|| forwarded_client(headers))
        .flatten()
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
        .map(|ip| ip.to_string());

    let actor_id = trust
        .user
        .then(|| header(headers, USER_ID_HEADER))
        .flatten()
        .map(str::to_string);

    RequestContext {
        url: Some(full_url(headers, request.uri(), trust.forwarded)),
        ip_address,
        user_agent: header(headers, "user-agent").map(str::to_string),
        actor_id,
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// First `x-forwarded-for` hop, when it parses as an IP address.
fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    header(headers, FORWARDED_FOR_HEADER)?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Absolute URL when the host is known, else the request target as received.
fn full_url(headers: &HeaderMap, uri: &Uri, trust_forwarded: bool) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match header(headers, "host") {
        Some(host) => {
            let scheme = trust_forwarded
                .then(|| header(headers, FORWARDED_PROTO_HEADER))
                .flatten()
                .filter(|s| matches!(*s, "http" | "https"))
                .unwrap_or("http");
            format!("{scheme}://{host}{path}")
        },
        None => path.to_string(),
    }
}
