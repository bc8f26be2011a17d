//! # sqlfirewall
//!
//! **SQL-injection request filter for axum / tower stacks.**
//!
//! Every query parameter value, form field (urlencoded or multipart text) and
//! JSON string leaf of an incoming request is normalized and tested against a regex catalog built
//! for the enabled database dialects. A hit answers `403 Forbidden` before the
//! protected handler runs; everything else passes through with its body
//! intact.
//!
//! ## Architecture
//!
//! - **[`dialect`]**: `Dialect` flags and the `DialectSet` that selects catalog groups
//! - **[`detect`]**: normalizer, pattern catalog and structural payload walker
//! - **[`firewall`]**: request screening, URL allow-list and the tower layer
//! - **[`proxy`]**: reverse proxy that runs the filter in front of another server
//! - **[`coverage`]**: offline check of the catalog against a payload corpus
//! - **[`config`]**: TOML configuration with environment substitution
//! - **[`cli`]**: command-line interface (clap)
//! - **[`error`]**: unified error type using `thiserror`
//!
//! ## Embedding
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use sqlfirewall::config::FirewallConfig;
//! use sqlfirewall::dialect::Dialect;
//! use sqlfirewall::firewall::SqlFirewallLayer;
//!
//! let config = FirewallConfig::with_dialects(Dialect::MsSql.into())
//!     .allow_urls(["/Admins/Logs/Ajax/GetLoginList"]);
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(SqlFirewallLayer::from_config(&config));
//! ```
//!
//! ## Standalone
//!
//! ```
//! use sqlfirewall::dialect::DialectSet;
//!
//! assert!(sqlfirewall::is_match("1' or '1'='1", DialectSet::all()));
//! assert!(!sqlfirewall::is_match("O'Brien", DialectSet::all()));
//! ```

pub mod cli;
pub mod config;
pub mod coverage;
pub mod detect;
pub mod dialect;
pub mod error;
pub mod firewall;
pub mod proxy;

pub use detect::is_match;
pub use dialect::{Dialect, DialectSet};
pub use firewall::{SqlFirewall, SqlFirewallLayer};
