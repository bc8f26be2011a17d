//! Tower middleware around [`SqlFirewall`].

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::{Screened, SqlFirewall};
use crate::config::FirewallConfig;

/// Layer that screens every request before the wrapped service sees it.
#[derive(Debug, Clone)]
pub struct SqlFirewallLayer {
    firewall: Arc<SqlFirewall>,
}

impl SqlFirewallLayer {
    pub fn new(firewall: SqlFirewall) -> Self {
        Self {
            firewall: Arc::new(firewall),
        }
    }

    pub fn from_config(config: &FirewallConfig) -> Self {
        Self::new(SqlFirewall::new(config))
    }
}

impl<S> Layer<S> for SqlFirewallLayer {
    type Service = SqlFirewallService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SqlFirewallService {
            inner,
            firewall: self.firewall.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlFirewallService<S> {
    inner: S,
    firewall: Arc<SqlFirewall>,
}

impl<S> Service<Request> for SqlFirewallService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let firewall = self.firewall.clone();
        // The readied service handles this request; the clone waits for the next.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match firewall.screen(req).await {
                Ok(Screened::Forward(req)) => inner.call(req).await,
                Ok(Screened::Reject(_)) => Ok(StatusCode::FORBIDDEN.into_response()),
                Err(e) => {
                    tracing::debug!(error = %e, "Request body rejected before inspection");
                    Ok(e.into_response())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, DialectSet};
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt as _;

    fn app(config: &FirewallConfig) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(SqlFirewallLayer::from_config(config))
    }

    #[tokio::test]
    async fn rejected_request_gets_empty_403() {
        let config = FirewallConfig::with_dialects(DialectSet::only(Dialect::MsSql));
        let req = axum::http::Request::builder()
            .uri("/?id=1%27%20or%20%271%27=%271")
            .body(Body::empty())
            .unwrap();
        let resp = app(&config).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn clean_request_reaches_handler() {
        let req = axum::http::Request::builder().uri("/?q=rust").body(Body::empty()).unwrap();
        let resp = app(&FirewallConfig::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[test]
    fn layer_shares_one_firewall() {
        let layer = SqlFirewallLayer::from_config(&FirewallConfig::default());
        let a = layer.layer(());
        let b = layer.layer(());
        assert!(Arc::ptr_eq(&a.firewall, &b.firewall));
    }
}
