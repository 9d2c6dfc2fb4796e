//! Draft 2019-09 JSON Schema compiler and validator.
//!
//! Schemas are compiled once into an immutable graph of validator nodes and
//! then applied to any number of instances. `$ref` and `$recursiveRef` may
//! form arbitrary cycles: references are bound in a separate pass after the
//! whole graph exists.
//!
//! # Example
//!
//! ```
//! use schemagraph::construct_validator;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "$id": "https://example.com/ope",
//!     "$defs": {
//!         "string": { "$anchor": "StringWithmax20", "maxLength": 20 }
//!     },
//!     "items": { "$ref": "https://example.com/ope#StringWithmax20" }
//! });
//!
//! let validator = construct_validator(&schema).unwrap();
//! assert!(validator.is_valid(&json!(["12345", "67890"])));
//!
//! let result = validator.validate(&json!(["a string well over twenty characters"]));
//! assert!(!result.ok);
//! assert_eq!(result.errors()[0].instance_location, "/0");
//! ```
//!
//! # Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Annotate | `annotate` | schema value tagged with JSON Pointers |
//! | Build | `builder` | validator nodes with unbound reference slots |
//! | Resolve | `resolver` | base URIs, URI index, bound slots |
//! | Execute | `validator` | [`ValidationResult`] trees |
//!
//! Schemas are checked against the Draft 2019-09 meta-schema before they
//! are built unless [`CompileOptions::validate_schema`] turns that off.

mod annotate;
mod builder;
mod compiler;
mod error;
mod loader;
mod node;
mod output;
mod pointer;
mod resolver;
mod types;
mod validator;
mod vocabulary;

use serde_json::Value;

pub use compiler::{CompileOptions, DEFAULT_BASE_URI};
pub use error::{LoadError, SchemaError};
pub use loader::{
    is_url, load_schema, load_schema_auto, load_schema_str, BundledLoader, LocalLoader,
    SchemaLoader, META_SCHEMA_URI,
};
pub use output::{ValidationError, ValidationResult};
pub use types::JsonType;
pub use validator::Validator;

#[cfg(feature = "remote")]
pub use loader::{load_schema_url, RemoteLoader};

/// Compile `schema` with the default options.
pub fn construct_validator(schema: &Value) -> Result<Validator, SchemaError> {
    CompileOptions::new().build(schema)
}

/// Compile `schema` and check `instance` against it.
///
/// Prefer [`construct_validator`] when validating more than one instance.
pub fn validate(schema: &Value, instance: &Value) -> Result<bool, SchemaError> {
    Ok(construct_validator(schema)?.is_valid(instance))
}
