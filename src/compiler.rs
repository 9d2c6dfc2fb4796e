//! Compilation pipeline: annotate, build, resolve.

use std::sync::OnceLock;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::annotate::annotate;
use crate::builder::BuildContext;
use crate::error::{LoadError, SchemaError};
use crate::loader::{default_loader, SchemaLoader, META_SCHEMA_URI};
use crate::node::{Document, Graph, NodeId};
use crate::resolver::{attach_base_uris, missing_documents, resolve};
use crate::validator::Validator;
use crate::vocabulary::VocabularySet;

/// Base URI for schemas that declare no `$id`.
pub const DEFAULT_BASE_URI: &str = "json-schema:///";

/// Options for compiling a schema into a [`Validator`].
///
/// # Example
///
/// ```
/// use schemagraph::CompileOptions;
/// use serde_json::json;
///
/// let validator = CompileOptions::new()
///     .with_base_uri("https://example.com/root.json")
///     .build(&json!({"items": {"$ref": "#/$defs/name"}, "$defs": {"name": {"type": "string"}}}))
///     .unwrap();
/// assert!(validator.is_valid(&json!(["a", "b"])));
/// ```
pub struct CompileOptions {
    loader: Box<dyn SchemaLoader>,
    validate_schema: bool,
    base_uri: String,
    meta: OnceLock<Validator>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            loader: default_loader(),
            validate_schema: true,
            base_uri: DEFAULT_BASE_URI.to_string(),
            meta: OnceLock::new(),
        }
    }
}

impl std::fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOptions")
            .field("validate_schema", &self.validate_schema)
            .field("base_uri", &self.base_uri)
            .finish_non_exhaustive()
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch meta-schemas and referenced documents through `loader`.
    pub fn with_loader(mut self, loader: Box<dyn SchemaLoader>) -> Self {
        self.loader = loader;
        self.meta = OnceLock::new();
        self
    }

    /// Check schemas against the Draft 2019-09 meta-schema before building.
    pub fn validate_schema(mut self, enabled: bool) -> Self {
        self.validate_schema = enabled;
        self
    }

    pub fn with_base_uri(mut self, base_uri: &str) -> Self {
        self.base_uri = base_uri.to_string();
        self
    }

    /// Compile `schema`.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`]: a schema failing the meta-schema is never built.
    pub fn build(&self, schema: &Value) -> Result<Validator, SchemaError> {
        if self.validate_schema {
            let result = self.meta_validator()?.validate(schema);
            if !result.ok {
                return Err(SchemaError::InvalidAgainstMetaSchema {
                    errors: result.errors(),
                });
            }
        }
        self.compile(schema, &self.base_uri)
    }

    fn meta_validator(&self) -> Result<&Validator, SchemaError> {
        if let Some(meta) = self.meta.get() {
            return Ok(meta);
        }
        let document = self.fetch(META_SCHEMA_URI, "")?;
        let compiled = self.compile(&document, META_SCHEMA_URI)?;
        Ok(self.meta.get_or_init(|| compiled))
    }

    fn compile(&self, schema: &Value, base: &str) -> Result<Validator, SchemaError> {
        let base = Url::parse(base).map_err(|e| SchemaError::InvalidUri {
            uri: base.to_string(),
            location: String::new(),
            message: e.to_string(),
        })?;

        let mut graph = Graph::new();
        let root = self.add_document(&mut graph, schema, base)?;

        loop {
            let missing = missing_documents(&graph)?;
            if missing.is_empty() {
                break;
            }
            for (uri, location) in missing {
                let document = self.fetch(uri.as_str(), &location)?;
                debug!(uri = %uri, "loaded referenced document");
                self.add_document(&mut graph, &document, uri)?;
            }
        }

        let resolution = resolve(&graph)?;
        debug!(
            nodes = graph.len(),
            documents = graph.documents.len(),
            references = resolution.targets.len(),
            "compiled schema"
        );
        Ok(Validator::new(graph, resolution, root))
    }

    fn add_document(&self, graph: &mut Graph, schema: &Value, base: Url) -> Result<NodeId, SchemaError> {
        let vocabularies = self.vocabularies_for(schema)?;
        let root = BuildContext::new(graph, vocabularies).build(&annotate(schema), None)?;
        attach_base_uris(graph, root, &base)?;
        debug!(uri = %base, "compiled document");
        graph.documents.push(Document {
            root,
            retrieval_uri: base,
        });
        Ok(root)
    }

    /// Active vocabularies for one document, from its `$schema` or its own
    /// `$vocabulary`.
    fn vocabularies_for(&self, schema: &Value) -> Result<VocabularySet, SchemaError> {
        let Some(object) = schema.as_object() else {
            return Ok(VocabularySet::all());
        };
        let own = object.get("$vocabulary");
        let id = object
            .get("$id")
            .and_then(Value::as_str)
            .map(|s| s.trim_end_matches('#'));
        let dialect = object
            .get("$schema")
            .and_then(Value::as_str)
            .map(|s| s.trim_end_matches('#'));

        if let Some(dialect) = dialect.filter(|d| Some(*d) != id) {
            match self.loader.get(dialect) {
                Ok(meta) => {
                    if let Some(declared) = meta.get("$vocabulary") {
                        return VocabularySet::from_declaration(declared);
                    }
                }
                Err(error) => {
                    warn!(dialect, %error, "cannot fetch meta-schema, assuming all vocabularies");
                    return Ok(VocabularySet::all());
                }
            }
        }

        match own {
            Some(declared) => VocabularySet::from_declaration(declared),
            None => Ok(VocabularySet::all()),
        }
    }

    fn fetch(&self, uri: &str, location: &str) -> Result<Value, SchemaError> {
        self.loader.get(uri).map_err(|source| match source {
            LoadError::UnknownUri { uri } => SchemaError::Unresolvable {
                uri,
                location: location.to_string(),
                known: Vec::new(),
            },
            source => SchemaError::Load {
                uri: uri.to_string(),
                source,
            },
        })
    }
}
