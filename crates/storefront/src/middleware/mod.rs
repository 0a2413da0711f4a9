//! HTTP middleware for the edge server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Route guard (redirects on the access-token cookie)

pub mod route_guard;

pub use route_guard::{GuardDecision, RouteGuard, has_access_token, route_guard_middleware};
