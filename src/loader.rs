//! Schema loading from various sources.
//!
//! Handles loading schemas from files, strings, and HTTP URLs, and the
//! [`SchemaLoader`] seam the compiler uses to fetch meta-schemas and
//! documents named by cross-document `$ref`s.

use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// URI of the Draft 2019-09 dialect meta-schema.
pub const META_SCHEMA_URI: &str = "https://json-schema.org/draft/2019-09/schema";

const BUNDLED: &[(&str, &str)] = &[
    (
        META_SCHEMA_URI,
        include_str!("../meta-schemas/draft2019-09/schema.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/core",
        include_str!("../meta-schemas/draft2019-09/meta/core.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/applicator",
        include_str!("../meta-schemas/draft2019-09/meta/applicator.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/validation",
        include_str!("../meta-schemas/draft2019-09/meta/validation.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/meta-data",
        include_str!("../meta-schemas/draft2019-09/meta/meta-data.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/format",
        include_str!("../meta-schemas/draft2019-09/meta/format.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/content",
        include_str!("../meta-schemas/draft2019-09/meta/content.json"),
    ),
];

/// Fetches schema documents by absolute URI.
///
/// Called once per document during compilation, never while validating.
pub trait SchemaLoader: Send + Sync {
    fn get(&self, uri: &str) -> Result<Value, LoadError>;
}

/// Serves the Draft 2019-09 meta-schemas compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledLoader;

impl BundledLoader {
    /// Whether `uri` names one of the bundled documents.
    pub fn contains(uri: &str) -> bool {
        bundled_source(uri).is_some()
    }
}

impl SchemaLoader for BundledLoader {
    fn get(&self, uri: &str) -> Result<Value, LoadError> {
        let source = bundled_source(uri).ok_or_else(|| LoadError::UnknownUri {
            uri: uri.to_string(),
        })?;
        load_schema_str(source)
    }
}

fn bundled_source(uri: &str) -> Option<&'static str> {
    let uri = uri.trim_end_matches('#');
    BUNDLED
        .iter()
        .find(|(known, _)| *known == uri)
        .map(|(_, source)| *source)
}

/// Maps URIs under `remote_base` onto files under `local_base`.
///
/// `file://` URIs are read directly. Anything else falls back to the
/// bundled meta-schemas.
///
/// # Example
/// ```text
/// remote_base = "https://example.com/schemas"
/// local_base = Path::new("site")
/// "https://example.com/schemas/order.json" -> "site/order.json"
/// ```
#[derive(Debug, Clone)]
pub struct LocalLoader {
    remote_base: String,
    local_base: PathBuf,
}

impl LocalLoader {
    pub fn new(remote_base: impl Into<String>, local_base: impl Into<PathBuf>) -> Self {
        Self {
            remote_base: remote_base.into(),
            local_base: local_base.into(),
        }
    }

    /// Local path a URI maps to, if it falls under the remote base.
    pub fn local_path(&self, uri: &str) -> Option<PathBuf> {
        let remainder = uri.strip_prefix(self.remote_base.as_str())?;
        let remainder = remainder.split('#').next().unwrap_or_default();
        Some(self.local_base.join(remainder.trim_start_matches('/')))
    }
}

impl SchemaLoader for LocalLoader {
    fn get(&self, uri: &str) -> Result<Value, LoadError> {
        if let Some(path) = self.local_path(uri) {
            return load_schema(&path);
        }
        if let Some(path) = file_path(uri) {
            return load_schema(&path);
        }
        BundledLoader.get(uri)
    }
}

/// Fetches HTTP(S) documents, serving the meta-schemas from the bundle.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteLoader;

#[cfg(feature = "remote")]
impl SchemaLoader for RemoteLoader {
    fn get(&self, uri: &str) -> Result<Value, LoadError> {
        if BundledLoader::contains(uri) {
            return BundledLoader.get(uri);
        }
        if is_url(uri) {
            return load_schema_url(uri);
        }
        match file_path(uri) {
            Some(path) => load_schema(&path),
            None => Err(LoadError::UnknownUri {
                uri: uri.to_string(),
            }),
        }
    }
}

/// The loader used when none is configured.
pub fn default_loader() -> Box<dyn SchemaLoader> {
    #[cfg(feature = "remote")]
    {
        Box::new(RemoteLoader)
    }
    #[cfg(not(feature = "remote"))]
    {
        Box::new(BundledLoader)
    }
}

fn file_path(uri: &str) -> Option<PathBuf> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

/// Load a schema from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_schema_str(&content)
}

/// Load a schema from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema from an HTTP/HTTPS URL.
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with an error status.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    tracing::debug!(url, "fetching schema");
    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_schema_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::UnknownUri {
                uri: source.to_string(),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}
