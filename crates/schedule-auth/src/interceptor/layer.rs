//! Tower Layer and Service wrapping the interceptor
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use schedule_auth::interceptor::RequireAuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(RequireAuthLayer::new(token_manager))
//!     .service(schedule_routes);
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::{Request, Response};
use tower::{Layer, Service};

use super::{unauthorized_response, RequireAuth};
use crate::token::TokenManager;

/// Tower Layer that rejects requests without a valid bearer token.
#[derive(Debug, Clone)]
pub struct RequireAuthLayer {
    auth: RequireAuth,
}

impl RequireAuthLayer {
    /// Create a new layer over a shared token manager.
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self {
            auth: RequireAuth::new(tokens),
        }
    }
}

impl<S> Layer<S> for RequireAuthLayer {
    type Service = RequireAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAuthService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

/// Tower Service produced by [`RequireAuthLayer`].
///
/// Verified requests reach the inner service with a
/// [`RequestIdentity`](super::RequestIdentity) in their extensions; others
/// get a 401 without the inner service being called.
#[derive(Debug, Clone)]
pub struct RequireAuthService<S> {
    inner: S,
    auth: RequireAuth,
}

impl<S, B, ResBody> Service<Request<B>> for RequireAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        match self.auth.intercept(req) {
            Ok(req) => {
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                Box::pin(async move { inner.call(req).await })
            }
            Err(_) => Box::pin(async { Ok(unauthorized_response()) }),
        }
    }
}
