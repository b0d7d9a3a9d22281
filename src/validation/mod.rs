//! Parameter validation and normalization.
//!
//! Each endpoint declares a [`Schema`]: per-field type, required-ness,
//! default, enum constraint and predicate, plus cross-field rules. Raw
//! query/path/body input is turned into typed [`Params`] once at the
//! boundary; handlers never see unsanitized input.

mod params;
pub mod sanitize;
mod schema;

pub use params::{ParamValue, Params, RawParams};
pub use schema::{not_empty, CrossRule, DefaultValue, FieldKind, FieldSpec, Predicate, Schema};

/// Shared pagination inputs accepted by every list endpoint.
pub const PAGE: FieldSpec = FieldSpec::new("page", FieldKind::Int).describe("1-based page number");
pub const PER_PAGE: FieldSpec = FieldSpec::new("per_page", FieldKind::Int).describe("page size used with `page`");
pub const LIMIT: FieldSpec = FieldSpec::new("limit", FieldKind::Int).describe("maximum rows; takes precedence over `page`");
pub const OFFSET: FieldSpec = FieldSpec::new("offset", FieldKind::Int).describe("rows to skip; takes precedence over `page`");
