//! Reverse proxy that puts the firewall in front of an existing application.
//!
//! Every request is screened by [`SqlFirewallLayer`] and, when forwarded,
//! replayed against `server.upstream` with `reqwest`. The upstream response is
//! relayed back unchanged apart from hop-by-hop headers and the `Server`
//! header.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use url::Url;

use crate::config::{AppConfig, FirewallConfig};
use crate::error::{Result, SqlFirewallError};
use crate::firewall::{ServerHeaderLayer, SqlFirewallLayer};

/// Headers that describe a single connection and are never forwarded.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Parse and validate the upstream base URL.
pub fn parse_upstream(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| SqlFirewallError::InvalidUpstream(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(SqlFirewallError::InvalidUpstream(format!(
            "{}: expected an http(s) URL with a host",
            raw
        )));
    }
    Ok(url)
}

struct Upstream {
    base: Url,
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl Upstream {
    fn target(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path_and_query)
    }

    async fn send(&self, req: Request) -> Result<Response> {
        let (parts, body) = req.into_parts();
        let target = self.target(&parts.uri);
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| SqlFirewallError::Proxy(format!("failed to read request body: {}", e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        let upstream_resp = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream_resp.status();
        let upstream_headers = upstream_resp.headers().clone();
        let bytes = upstream_resp.bytes().await?;

        let mut resp = Response::new(Body::from(bytes));
        *resp.status_mut() = status;
        for (name, value) in upstream_headers.iter() {
            if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
                continue;
            }
            resp.headers_mut().append(name.clone(), value.clone());
        }
        Ok(resp)
    }
}

async fn forward(State(upstream): State<Arc<Upstream>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    match upstream.send(req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(method = %method, path = %path, error = %e, "Upstream request failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

pub struct ProxyServer {
    listen_addr: String,
    upstream: Url,
    server_header: String,
    firewall: FirewallConfig,
}

impl ProxyServer {
    /// Validates the upstream URL; nothing is bound until [`start`](Self::start).
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            listen_addr: config.server.listen.clone(),
            upstream: parse_upstream(&config.server.upstream)?,
            server_header: config.server.server_header.clone(),
            firewall: config.firewall.clone(),
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// The full middleware stack around the forwarding handler.
    pub fn router(&self) -> Result<Router> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        let upstream = Arc::new(Upstream {
            base: self.upstream.clone(),
            client,
            max_body_bytes: self.firewall.max_body_bytes,
        });

        Ok(Router::new()
            .fallback(forward)
            .with_state(upstream)
            .layer(SqlFirewallLayer::from_config(&self.firewall))
            .layer(ServerHeaderLayer::new(&self.server_header)))
    }

    /// Start the proxy server and return the actual bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            listen = %local_addr,
            upstream = %self.upstream,
            dialects = %self.firewall.dialects,
            "sqlfirewall proxy listening"
        );

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Proxy server stopped: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_must_be_http() {
        assert!(parse_upstream("http://127.0.0.1:5000").is_ok());
        assert!(parse_upstream("https://app.internal/base/").is_ok());
        assert!(matches!(
            parse_upstream("ftp://files.internal"),
            Err(SqlFirewallError::InvalidUpstream(_))
        ));
        assert!(matches!(
            parse_upstream("not a url"),
            Err(SqlFirewallError::InvalidUpstream(_))
        ));
    }

    #[test]
    fn target_keeps_path_and_query() {
        let upstream = Upstream {
            base: parse_upstream("http://127.0.0.1:5000/app/").unwrap(),
            client: reqwest::Client::new(),
            max_body_bytes: 1024,
        };
        let uri: Uri = "/users?id=7&sort=name".parse().unwrap();
        assert_eq!(
            upstream.target(&uri),
            "http://127.0.0.1:5000/app/users?id=7&sort=name"
        );
    }

    #[test]
    fn hop_by_hop_headers_are_recognized() {
        assert!(is_hop_by_hop(&header::CONNECTION));
        assert!(is_hop_by_hop(&HeaderName::from_static("keep-alive")));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
    }

    #[test]
    fn new_rejects_bad_upstream() {
        let config = AppConfig::from_toml(
            "[server]\nlisten = \"127.0.0.1:0\"\nupstream = \"localhost\"\n",
        )
        .unwrap();
        assert!(matches!(
            ProxyServer::new(&config),
            Err(SqlFirewallError::InvalidUpstream(_))
        ));
    }
}
