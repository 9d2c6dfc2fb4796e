//! Keyword registry partitioned into the Draft 2019-09 vocabularies.
//!
//! Each keyword maps to the [`KeywordGroup`] that builds it. Several keywords
//! share one group (`items`/`additionalItems` are validated together, every
//! type-specific keyword lives under the `type` group), so the builder
//! instantiates each group at most once per schema object.

use serde_json::Value;

use crate::error::SchemaError;

const VOCAB_PREFIX: &str = "https://json-schema.org/draft/2019-09/vocab/";

/// Keywords that require annotation collection and are rejected at build time.
pub const UNSUPPORTED_KEYWORDS: &[&str] = &["unevaluatedProperties", "unevaluatedItems"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    Core,
    Applicator,
    Validation,
}

/// Constructor selected for a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordGroup {
    Ref,
    RecursiveRef,
    Defs,
    Types,
    Const,
    Enum,
    AllOf,
    AnyOf,
    OneOf,
    Not,
    Conditional,
}

/// The registry, in build order.
pub const REGISTRY: &[(&str, Vocabulary, KeywordGroup)] = &[
    // Core
    ("$ref", Vocabulary::Core, KeywordGroup::Ref),
    ("$recursiveRef", Vocabulary::Core, KeywordGroup::RecursiveRef),
    ("$defs", Vocabulary::Core, KeywordGroup::Defs),
    ("definitions", Vocabulary::Core, KeywordGroup::Defs),
    // Validation
    ("type", Vocabulary::Validation, KeywordGroup::Types),
    ("const", Vocabulary::Validation, KeywordGroup::Const),
    ("enum", Vocabulary::Validation, KeywordGroup::Enum),
    ("multipleOf", Vocabulary::Validation, KeywordGroup::Types),
    ("maximum", Vocabulary::Validation, KeywordGroup::Types),
    ("exclusiveMaximum", Vocabulary::Validation, KeywordGroup::Types),
    ("minimum", Vocabulary::Validation, KeywordGroup::Types),
    ("exclusiveMinimum", Vocabulary::Validation, KeywordGroup::Types),
    ("maxLength", Vocabulary::Validation, KeywordGroup::Types),
    ("minLength", Vocabulary::Validation, KeywordGroup::Types),
    ("pattern", Vocabulary::Validation, KeywordGroup::Types),
    ("maxItems", Vocabulary::Validation, KeywordGroup::Types),
    ("minItems", Vocabulary::Validation, KeywordGroup::Types),
    ("uniqueItems", Vocabulary::Validation, KeywordGroup::Types),
    ("maxContains", Vocabulary::Validation, KeywordGroup::Types),
    ("minContains", Vocabulary::Validation, KeywordGroup::Types),
    ("maxProperties", Vocabulary::Validation, KeywordGroup::Types),
    ("minProperties", Vocabulary::Validation, KeywordGroup::Types),
    ("required", Vocabulary::Validation, KeywordGroup::Types),
    ("dependentRequired", Vocabulary::Validation, KeywordGroup::Types),
    // Applicator
    ("allOf", Vocabulary::Applicator, KeywordGroup::AllOf),
    ("anyOf", Vocabulary::Applicator, KeywordGroup::AnyOf),
    ("oneOf", Vocabulary::Applicator, KeywordGroup::OneOf),
    ("not", Vocabulary::Applicator, KeywordGroup::Not),
    ("if", Vocabulary::Applicator, KeywordGroup::Conditional),
    ("then", Vocabulary::Applicator, KeywordGroup::Conditional),
    ("else", Vocabulary::Applicator, KeywordGroup::Conditional),
    ("items", Vocabulary::Applicator, KeywordGroup::Types),
    ("additionalItems", Vocabulary::Applicator, KeywordGroup::Types),
    ("contains", Vocabulary::Applicator, KeywordGroup::Types),
    ("properties", Vocabulary::Applicator, KeywordGroup::Types),
    ("patternProperties", Vocabulary::Applicator, KeywordGroup::Types),
    ("additionalProperties", Vocabulary::Applicator, KeywordGroup::Types),
    ("propertyNames", Vocabulary::Applicator, KeywordGroup::Types),
    ("dependentSchemas", Vocabulary::Applicator, KeywordGroup::Types),
];

/// Vocabulary a registered keyword belongs to.
pub fn vocabulary_of(keyword: &str) -> Option<Vocabulary> {
    REGISTRY
        .iter()
        .find(|(name, _, _)| *name == keyword)
        .map(|(_, vocabulary, _)| *vocabulary)
}

/// Set of vocabularies active while building one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabularySet {
    applicator: bool,
    validation: bool,
}

impl Default for VocabularySet {
    fn default() -> Self {
        Self::all()
    }
}

impl VocabularySet {
    pub fn all() -> Self {
        Self {
            applicator: true,
            validation: true,
        }
    }

    /// Core alone. It can never be switched off.
    pub fn core_only() -> Self {
        Self {
            applicator: false,
            validation: false,
        }
    }

    pub fn is_active(&self, vocabulary: Vocabulary) -> bool {
        match vocabulary {
            Vocabulary::Core => true,
            Vocabulary::Applicator => self.applicator,
            Vocabulary::Validation => self.validation,
        }
    }

    /// Whether `keyword` is registered and belongs to an active vocabulary.
    pub fn allows(&self, keyword: &str) -> bool {
        vocabulary_of(keyword)
            .map(|v| self.is_active(v))
            .unwrap_or(false)
    }

    /// Parse a `$vocabulary` declaration.
    ///
    /// Vocabularies declared `false` are optional and ignored when unknown;
    /// an unknown vocabulary declared `true` is an error.
    pub fn from_declaration(declaration: &Value) -> Result<Self, SchemaError> {
        let map = declaration.as_object().ok_or_else(|| {
            SchemaError::invalid("$vocabulary", "/$vocabulary", "expected an object")
        })?;

        let mut set = Self::core_only();
        for (uri, required) in map {
            let required = required.as_bool().ok_or_else(|| {
                SchemaError::invalid("$vocabulary", "/$vocabulary", "values must be booleans")
            })?;
            let name = uri.strip_prefix(VOCAB_PREFIX);
            match name {
                Some("core") | Some("meta-data") | Some("content") | Some("format") => {}
                Some("applicator") => set.applicator = true,
                Some("validation") => set.validation = true,
                _ if required => {
                    return Err(SchemaError::UnknownVocabulary { uri: uri.clone() });
                }
                _ => {}
            }
        }
        Ok(set)
    }
}
