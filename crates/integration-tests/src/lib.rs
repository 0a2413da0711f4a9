//! Integration tests for the Nature Marketplace storefront.
//!
//! Tests run the client state layer against [`StubBackend`], an axum app
//! bound to an ephemeral local port that records every request it serves.
//! Nothing external is needed:
//!
//! ```bash
//! cargo test -p nature-integration-tests
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use nature_storefront::Storefront;
use nature_storefront::auth::{CookieMirror, MemoryCookieJar};
use nature_storefront::config::StorefrontConfig;
use nature_storefront::favorites::FavoritesSyncWorker;
use nature_storefront::storage::{KeyValueStore, MemoryStore};
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

/// A request received by the stub backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub accept_language: Option<String>,
    pub body: Value,
}

type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

/// In-process stand-in for the marketplace backend.
pub struct StubBackend {
    url: Url,
    log: RequestLog,
    server: JoinHandle<()>,
}

impl StubBackend {
    /// Serve `routes` on `127.0.0.1:0`, recording every request.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start(routes: Router) -> Self {
        let log = RequestLog::default();
        let app = routes.layer(from_fn_with_state(Arc::clone(&log), record));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub backend");
        let addr = listener.local_addr().expect("Stub backend has no address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let url = Url::parse(&format!("http://{addr}")).expect("Invalid stub backend URL");
        Self { url, log, server }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Configuration pointing at this backend.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig::for_api(self.url.clone())
    }

    /// Requests served so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `METHOD /path` of every request served so far.
    #[must_use]
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    /// A fresh storefront wired to this backend with in-memory storage and cookies.
    #[must_use]
    pub fn storefront(&self) -> TestStorefront {
        let storage = Arc::new(MemoryStore::new());
        let cookies = Arc::new(MemoryCookieJar::new());
        let (storefront, worker) = Storefront::new(
            self.config(),
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
            Arc::clone(&cookies) as Arc<dyn CookieMirror>,
        );
        TestStorefront {
            storefront,
            worker,
            storage,
            cookies,
        }
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A storefront with handles on its storage and cookie jar.
pub struct TestStorefront {
    pub storefront: Storefront,
    pub worker: FavoritesSyncWorker,
    pub storage: Arc<MemoryStore>,
    pub cookies: Arc<MemoryCookieJar>,
}

async fn record(State(log): State<RequestLog>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let header_value = |headers: &HeaderMap, name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        authorization: header_value(&parts.headers, header::AUTHORIZATION),
        accept_language: header_value(&parts.headers, header::ACCEPT_LANGUAGE),
        body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    };
    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(recorded);

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// A product as the list endpoint returns it.
#[must_use]
pub fn product_json(id: i64, slug: &str, price: &str, stock: Option<u32>) -> Value {
    serde_json::json!({
        "id": id,
        "title": format!("Product {id}"),
        "slug": slug,
        "price": price,
        "category_slug": "trees",
        "primary_image": format!("https://cdn.test/{slug}.jpg"),
        "stock": stock,
        "is_unlimited_stock": stock.is_none(),
    })
}
