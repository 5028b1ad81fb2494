//! `x-api-key` gate for the `/api/zcash` routes.
//!
//! ```rust,ignore
//! let api = Router::new()
//!     .route("/wallet/info", get(wallet_info))
//!     .route_layer(ApiKeyLayer::new("secret"));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::Request,
    http::Response,
    response::IntoResponse,
};
use tower::{Layer, Service};
use tracing::warn;

use crate::ApiError;

pub const HEADER_API_KEY: &str = "x-api-key";

#[derive(Clone)]
pub struct ApiKeyLayer {
    api_key: Arc<str>,
}

impl ApiKeyLayer {
    pub fn new(api_key: impl Into<Arc<str>>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl<S> Layer<S> for ApiKeyLayer {
    type Service = ApiKeyMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyMiddleware {
            inner,
            api_key: self.api_key.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ApiKeyMiddleware<S> {
    inner: S,
    api_key: Arc<str>,
}

impl<S> ApiKeyMiddleware<S> {
    fn authorized(&self, req: &Request) -> bool {
        // An unset key locks the API rather than opening it.
        if self.api_key.is_empty() {
            return false;
        }
        req.headers()
            .get(HEADER_API_KEY)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |presented| presented == &*self.api_key)
    }
}

impl<S> Service<Request> for ApiKeyMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if !self.authorized(&req) {
            warn!(path = %req.uri().path(), "rejected request without valid api key");
            let response = ApiError::unauthorized().into_response();
            return Box::pin(async move { Ok::<_, S::Error>(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}
