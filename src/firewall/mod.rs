//! Request filter.
//!
//! [`SqlFirewall`] holds everything built once at startup (the compiled
//! [`PatternSet`], the [`AllowList`], limits) and screens one request at a
//! time. Each request passes through these steps, at most once each:
//!
//! 1. allow-list check: an exempt path is forwarded untouched
//! 2. query inspection: every query parameter value
//! 3. body inspection, for body methods only (`POST` by default): urlencoded
//!    form fields, the text fields of a multipart form (file parts are
//!    skipped), or a JSON body walked structurally
//! 4. reject with `403 Forbidden` on the first match, otherwise forward
//!
//! A body that is read for inspection is re-attached to the forwarded request,
//! so downstream handlers see the identical bytes. A JSON or multipart body
//! that fails to parse is forwarded as if clean.
//!
//! [`layer::SqlFirewallLayer`] wires this into a tower / axum stack.

pub mod allowlist;
pub mod layer;
pub mod server_header;

use std::fmt;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{service_fn, Layer, ServiceExt};
use tracing::{debug, warn};

use crate::config::FirewallConfig;
use crate::detect::inspect::{decode_text, inspect, InspectedValue, Inspection};
use crate::detect::patterns::PatternSet;

pub use self::allowlist::AllowList;
pub use self::layer::{SqlFirewallLayer, SqlFirewallService};
pub use self::server_header::ServerHeaderLayer;

/// Where in the request a payload was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Query,
    Form,
    Json,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Location::Query => "query",
            Location::Form => "form",
            Location::Json => "json",
        })
    }
}

/// Result of screening one request.
#[derive(Debug)]
pub enum Screened {
    /// Pass the (possibly rebuilt) request to the next handler.
    Forward(Request),
    /// Answer `403 Forbidden` without calling the next handler.
    Reject(Location),
}

/// The request body could not be buffered for inspection.
#[derive(Debug)]
pub enum ScreenError {
    /// Declared `Content-Length` exceeds the configured limit.
    TooLarge { declared: u64, limit: usize },
    /// Reading the body failed or exceeded the limit mid-stream.
    Unreadable(axum::Error),
}

impl fmt::Display for ScreenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenError::TooLarge { declared, limit } => {
                write!(f, "body of {} bytes exceeds limit of {} bytes", declared, limit)
            }
            ScreenError::Unreadable(e) => write!(f, "failed to read request body: {}", e),
        }
    }
}

impl std::error::Error for ScreenError {}

impl IntoResponse for ScreenError {
    fn into_response(self) -> Response {
        match self {
            ScreenError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE.into_response(),
            ScreenError::Unreadable(_) => StatusCode::BAD_REQUEST.into_response(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Form,
    Multipart,
    Json,
    Other,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return BodyKind::Other;
    };
    let content_type = content_type.to_ascii_lowercase();
    let media_type = content_type.split(';').next().unwrap_or("").trim();

    if media_type == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else if media_type == "multipart/form-data" {
        BodyKind::Multipart
    } else if content_type.contains("application/json") {
        BodyKind::Json
    } else {
        BodyKind::Other
    }
}

/// SQL-injection request filter. Immutable after construction and shared
/// behind an `Arc` by every service clone.
#[derive(Debug)]
pub struct SqlFirewall {
    patterns: Arc<PatternSet>,
    allow_list: AllowList,
    body_methods: Vec<String>,
    max_body_bytes: usize,
    max_depth: usize,
}

impl SqlFirewall {
    pub fn new(config: &FirewallConfig) -> Self {
        Self {
            patterns: PatternSet::shared(config.dialects),
            allow_list: AllowList::new(&config.allow_urls),
            body_methods: config
                .body_methods
                .iter()
                .map(|m| m.to_ascii_uppercase())
                .collect(),
            max_body_bytes: config.max_body_bytes,
            max_depth: config.max_depth,
        }
    }

    fn inspects_body(&self, method: &Method) -> bool {
        self.body_methods.iter().any(|m| m == method.as_str())
    }

    fn inspect(&self, value: &InspectedValue) -> Inspection {
        inspect(value, self.patterns.as_ref(), self.max_depth)
    }

    /// Decide whether `req` is forwarded or rejected.
    pub async fn screen(&self, req: Request) -> Result<Screened, ScreenError> {
        let path = decoded_path(req.uri().path());
        if self.allow_list.is_allowed(&path) {
            debug!(path = %path, "Path is allow-listed, skipping inspection");
            return Ok(Screened::Forward(req));
        }

        if let Some(query) = req.uri().query() {
            let params = InspectedValue::from_urlencoded(query.as_bytes());
            if self.inspect(&params).is_match() {
                return Ok(reject(req.method(), req.uri().path(), Location::Query));
            }
        }

        if !self.inspects_body(req.method()) {
            return Ok(Screened::Forward(req));
        }

        let kind = body_kind(req.headers());
        let location = match kind {
            BodyKind::Form | BodyKind::Multipart => Location::Form,
            BodyKind::Json => Location::Json,
            BodyKind::Other => return Ok(Screened::Forward(req)),
        };

        let (parts, body) = req.into_parts();
        let bytes = self.read_body(&parts, body).await?;

        let outcome = match kind {
            BodyKind::Json => match InspectedValue::from_json_slice(&bytes) {
                Ok(value) => self.inspect(&value),
                Err(e) => {
                    debug!(path = %parts.uri.path(), error = %e, "Forwarding unparsable JSON body");
                    Inspection::Clean
                }
            },
            BodyKind::Multipart => match multipart_fields(&parts.headers, bytes.clone()).await {
                Ok(fields) => self.inspect(&fields),
                Err(e) => {
                    debug!(path = %parts.uri.path(), error = %e, "Forwarding unparsable multipart body");
                    Inspection::Clean
                }
            },
            _ => self.inspect(&InspectedValue::from_urlencoded(&bytes)),
        };

        match outcome {
            Inspection::Matched => Ok(reject(&parts.method, parts.uri.path(), location)),
            Inspection::TooDeep => {
                debug!(
                    path = %parts.uri.path(),
                    max_depth = self.max_depth,
                    "Body nesting exceeds depth limit, deep branches skipped"
                );
                Ok(Screened::Forward(Request::from_parts(parts, Body::from(bytes))))
            }
            Inspection::Clean => Ok(Screened::Forward(Request::from_parts(parts, Body::from(bytes)))),
        }
    }

    async fn read_body(&self, parts: &Parts, body: Body) -> Result<Bytes, ScreenError> {
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(declared) = declared {
            if declared > self.max_body_bytes as u64 {
                return Err(ScreenError::TooLarge {
                    declared,
                    limit: self.max_body_bytes,
                });
            }
        }
        axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(ScreenError::Unreadable)
    }
}

/// Percent-decoded request path, as a host framework presents it to routing.
/// Falls back to the raw path when the decoded bytes are not UTF-8.
fn decoded_path(raw: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(std::borrow::Cow::Borrowed(raw))
}

/// Text fields of a buffered `multipart/form-data` body, in order. Parts that
/// carry a file name are file uploads and are skipped.
async fn multipart_fields(
    headers: &HeaderMap,
    bytes: Bytes,
) -> Result<InspectedValue, axum::BoxError> {
    let mut req = Request::new(Body::from(bytes));
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        req.headers_mut().insert(header::CONTENT_TYPE, content_type.clone());
    }
    // The body is already bounded by `max_body_bytes`.
    DefaultBodyLimit::disable()
        .layer(service_fn(read_text_fields))
        .oneshot(req)
        .await
}

async fn read_text_fields(req: Request) -> Result<InspectedValue, axum::BoxError> {
    let mut multipart = Multipart::from_request(req, &()).await?;
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            continue;
        }
        let name = field.name().unwrap_or_default().to_string();
        let value = field.bytes().await?;
        fields.push((name, decode_text(&value).into_owned()));
    }
    Ok(InspectedValue::from_pairs(fields))
}

fn reject(method: &Method, path: &str, location: Location) -> Screened {
    warn!(
        method = %method,
        path = %path,
        location = %location,
        "BLOCKED request: SQL injection pattern matched"
    );
    Screened::Reject(location)
}
