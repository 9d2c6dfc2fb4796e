//! Validation results.

use serde::Serialize;

/// Outcome of validating one instance against one validator node.
///
/// `ok` is false exactly when `messages` is non-empty or a child failed.
/// Passing results carry no children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub ok: bool,
    /// JSON Pointer of the schema keyword that produced this result.
    pub keyword_location: String,
    /// JSON Pointer into the instance.
    pub instance_location: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ValidationResult>,
}

/// A single failure leaf with its locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// JSON Pointer (RFC 6901) to the invalid value.
    pub instance_location: String,
    /// JSON Pointer to the keyword in the schema.
    pub keyword_location: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.instance_location.is_empty() {
            "/"
        } else {
            &self.instance_location
        };
        write!(f, "{}: {}", path, self.message)
    }
}

impl ValidationResult {
    pub(crate) fn valid(keyword_location: String, instance_location: String) -> Self {
        Self {
            ok: true,
            keyword_location,
            instance_location,
            messages: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn invalid(
        keyword_location: String,
        instance_location: String,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            keyword_location,
            instance_location,
            messages: vec![message.into()],
            children: Vec::new(),
        }
    }

    /// Conjunction: keeps only the failing children.
    pub(crate) fn all(
        keyword_location: String,
        instance_location: String,
        children: Vec<ValidationResult>,
    ) -> Self {
        let failed: Vec<_> = children.into_iter().filter(|c| !c.ok).collect();
        Self {
            ok: failed.is_empty(),
            keyword_location,
            instance_location,
            messages: Vec::new(),
            children: failed,
        }
    }

    /// Mark as failed with `message`, keeping failing children as detail.
    pub(crate) fn fail_with(mut self, message: impl Into<String>, children: Vec<ValidationResult>) -> Self {
        self.ok = false;
        self.messages.push(message.into());
        self.children = children.into_iter().filter(|c| !c.ok).collect();
        self
    }

    /// Flatten the tree into its failure messages, depth first.
    pub fn errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors);
        errors
    }

    fn collect_errors(&self, errors: &mut Vec<ValidationError>) {
        if self.ok {
            return;
        }
        for message in &self.messages {
            errors.push(ValidationError {
                instance_location: self.instance_location.clone(),
                keyword_location: self.keyword_location.clone(),
                message: message.clone(),
            });
        }
        for child in &self.children {
            child.collect_errors(errors);
        }
    }
}
