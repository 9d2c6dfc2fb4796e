//! Error types for schema compilation and document loading.

use std::path::PathBuf;
use thiserror::Error;

use crate::output::ValidationError;

/// Errors raised while loading a schema document through a loader.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("no document is available for {uri}")]
    UnknownUri { uri: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors raised while building or resolving a validator.
///
/// These never occur during `validate()`: a compiled [`crate::Validator`]
/// only reports instance failures through [`crate::ValidationResult`].
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema at {location:?} must be an object or a boolean, got {actual}")]
    InvalidSchemaType { location: String, actual: String },

    #[error("unsupported keyword \"{keyword}\" at {location:?}")]
    UnsupportedKeyword { keyword: String, location: String },

    #[error("invalid \"{keyword}\" at {location:?}: {message}")]
    InvalidKeyword {
        keyword: String,
        location: String,
        message: String,
    },

    #[error("invalid regular expression {pattern:?} in \"{keyword}\" at {location:?}: {message}")]
    InvalidRegex {
        keyword: String,
        location: String,
        pattern: String,
        message: String,
    },

    #[error("invalid URI {uri:?} at {location:?}: {message}")]
    InvalidUri {
        uri: String,
        location: String,
        message: String,
    },

    #[error("cannot resolve reference {uri:?} at {location:?} (known: {})", .known.join(", "))]
    Unresolvable {
        uri: String,
        location: String,
        known: Vec<String>,
    },

    #[error("URI {uri:?} is registered by two different subschemas")]
    DuplicateUri { uri: String },

    #[error("required vocabulary {uri:?} is not supported")]
    UnknownVocabulary { uri: String },

    #[error("reference cycle at {location:?} never consumes any part of the instance")]
    InfiniteRecursion { location: String },

    #[error("Schema is invalid according to the meta-schema")]
    InvalidAgainstMetaSchema { errors: Vec<ValidationError> },

    #[error("cannot load {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: LoadError,
    },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::Load { source, .. } => source.exit_code(),
            _ => 2,
        }
    }

    pub(crate) fn invalid(
        keyword: impl Into<String>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SchemaError::InvalidKeyword {
            keyword: keyword.into(),
            location: location.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::UnknownUri {
            uri: "https://example.com/missing".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn schema_error_exit_codes() {
        let err = SchemaError::UnsupportedKeyword {
            keyword: "unevaluatedItems".into(),
            location: "".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = SchemaError::Load {
            uri: "file:///nowhere.json".into(),
            source: LoadError::FileNotFound {
                path: PathBuf::from("/nowhere.json"),
            },
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn meta_schema_error_display() {
        let err = SchemaError::InvalidAgainstMetaSchema { errors: vec![] };
        assert_eq!(
            err.to_string(),
            "Schema is invalid according to the meta-schema"
        );
    }

    #[test]
    fn unresolvable_lists_known_uris() {
        let err = SchemaError::Unresolvable {
            uri: "json-schema:///#/$defs/missing".into(),
            location: "/$ref".into(),
            known: vec!["json-schema:///".into(), "json-schema:///#/$defs".into()],
        };
        let text = err.to_string();
        assert!(text.contains("json-schema:///#/$defs/missing"));
        assert!(text.contains("known: json-schema:///, json-schema:///#/$defs"));
    }
}
