use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use futures::future::BoxFuture;
use tower::{Layer, Service};

/// Overwrites the `Server` header of every response.
///
/// Built with `None` the layer is a pass-through.
#[derive(Debug, Clone)]
pub struct ServerHeaderLayer {
    value: Option<HeaderValue>,
}

impl ServerHeaderLayer {
    /// An empty or non-header-safe `value` disables the rewrite.
    pub fn new(value: &str) -> Self {
        let value = if value.is_empty() {
            None
        } else {
            HeaderValue::from_str(value).ok()
        };
        Self { value }
    }
}

impl<S> Layer<S> for ServerHeaderLayer {
    type Service = ServerHeaderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerHeaderService {
            inner,
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerHeaderService<S> {
    inner: S,
    value: Option<HeaderValue>,
}

impl<S> Service<Request> for ServerHeaderService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let value = self.value.clone();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut resp = fut.await?;
            if let Some(value) = value {
                resp.headers_mut().insert(header::SERVER, value);
            }
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt as _;

    async fn server_header(layer: ServerHeaderLayer) -> Option<String> {
        let app = Router::new()
            .route("/", get(|| async { ([(header::SERVER, "Kestrel")], "ok") }))
            .layer(layer);
        let req = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        resp.headers()
            .get(header::SERVER)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn replaces_server_header() {
        assert_eq!(
            server_header(ServerHeaderLayer::new("Firewall")).await.as_deref(),
            Some("Firewall")
        );
    }

    #[tokio::test]
    async fn empty_value_leaves_header_alone() {
        assert_eq!(
            server_header(ServerHeaderLayer::new("")).await.as_deref(),
            Some("Kestrel")
        );
    }
}
