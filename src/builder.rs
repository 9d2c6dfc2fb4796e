//! Schema → validator graph construction.
//!
//! The builder never looks at references: `$ref` and `$recursiveRef` become
//! placeholder nodes holding a slot that the resolver fills in later.

use regex::Regex;

use crate::annotate::AnnotatedNode;
use crate::error::SchemaError;
use crate::node::{Graph, Items, Keyword, NodeId, NodeKind};
use crate::types::JsonType;
use crate::vocabulary::{KeywordGroup, VocabularySet, REGISTRY, UNSUPPORTED_KEYWORDS};

/// Explicit construction state threaded through every recursive `build` call.
pub struct BuildContext<'g> {
    graph: &'g mut Graph,
    vocabularies: VocabularySet,
}

impl<'g> BuildContext<'g> {
    pub fn new(graph: &'g mut Graph, vocabularies: VocabularySet) -> Self {
        Self {
            graph,
            vocabularies,
        }
    }

    /// Build the validator for `schema` and everything below it.
    pub fn build(
        &mut self,
        schema: &AnnotatedNode,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SchemaError> {
        let location = schema.location().clone();

        if let Some(accept) = schema.as_bool() {
            let id = self.graph.reserve(location, parent);
            let kind = if accept {
                NodeKind::AcceptAll
            } else {
                NodeKind::RejectAll
            };
            self.graph.set_kind(id, kind);
            return Ok(id);
        }

        let Some(entries) = schema.entries() else {
            return Err(SchemaError::InvalidSchemaType {
                location: location.to_string(),
                actual: schema.type_name().to_string(),
            });
        };

        for keyword in UNSUPPORTED_KEYWORDS {
            if schema.contains_key(keyword) {
                return Err(SchemaError::UnsupportedKeyword {
                    keyword: keyword.to_string(),
                    location: location.to_string(),
                });
            }
        }

        let id = self.graph.reserve(location, parent);
        self.read_identity(schema, id)?;

        if entries.is_empty() {
            return Ok(id);
        }

        let mut built: Vec<KeywordGroup> = Vec::new();
        let mut children = Vec::new();
        for (keyword, vocabulary, group) in REGISTRY {
            if !schema.contains_key(keyword)
                || !self.vocabularies.is_active(*vocabulary)
                || built.contains(group)
            {
                continue;
            }
            built.push(*group);
            if let Some(child) = self.build_group(*group, schema, id)? {
                children.push(child);
            }
        }

        self.graph.set_kind(id, NodeKind::Schema(children));
        Ok(id)
    }

    fn read_identity(&mut self, schema: &AnnotatedNode, id: NodeId) -> Result<(), SchemaError> {
        if let Some(value) = schema.get("$id") {
            let declared = expect_str(value, "$id")?;
            if let Some((_, fragment)) = declared.split_once('#') {
                if !fragment.is_empty() {
                    return Err(SchemaError::invalid(
                        "$id",
                        value.location(),
                        "non-empty fragments are not allowed",
                    ));
                }
            }
            self.graph.node_mut(id).id = Some(declared.to_string());
        }

        if let Some(value) = schema.get("$anchor") {
            let anchor = expect_str(value, "$anchor")?;
            if !is_valid_anchor(anchor) {
                return Err(SchemaError::invalid(
                    "$anchor",
                    value.location(),
                    format!("{:?} is not a valid anchor name", anchor),
                ));
            }
            self.graph.node_mut(id).anchor = Some(anchor.to_string());
        }

        if let Some(value) = schema.get("$recursiveAnchor") {
            let flag = value.as_bool().ok_or_else(|| {
                SchemaError::invalid("$recursiveAnchor", value.location(), "expected a boolean")
            })?;
            self.graph.node_mut(id).recursive_anchor = flag;
        }

        Ok(())
    }

    fn build_group(
        &mut self,
        group: KeywordGroup,
        schema: &AnnotatedNode,
        parent: NodeId,
    ) -> Result<Option<NodeId>, SchemaError> {
        match group {
            KeywordGroup::Ref => self.build_ref(schema, parent).map(Some),
            KeywordGroup::RecursiveRef => self.build_recursive_ref(schema, parent).map(Some),
            KeywordGroup::Defs => self.build_defs(schema, parent).map(Some),
            KeywordGroup::Types => self.build_types(schema, parent).map(Some),
            KeywordGroup::Const => {
                let value = field(schema, "const")?;
                Ok(Some(self.leaf(value, parent, Keyword::Const(value.to_value()))))
            }
            KeywordGroup::Enum => {
                let value = field(schema, "enum")?;
                let items = value
                    .items()
                    .ok_or_else(|| SchemaError::invalid("enum", value.location(), "expected an array"))?;
                let options = items.iter().map(|item| item.to_value()).collect();
                Ok(Some(self.leaf(value, parent, Keyword::Enum(options))))
            }
            KeywordGroup::AllOf => self.build_schema_list(schema, "allOf", parent, NodeKind::AllOf),
            KeywordGroup::AnyOf => self.build_schema_list(schema, "anyOf", parent, NodeKind::AnyOf),
            KeywordGroup::OneOf => self.build_schema_list(schema, "oneOf", parent, NodeKind::OneOf),
            KeywordGroup::Not => {
                let value = field(schema, "not")?;
                let id = self.graph.reserve(value.location().clone(), Some(parent));
                let inner = self.build(value, Some(id))?;
                self.graph.set_kind(id, NodeKind::Not(inner));
                Ok(Some(id))
            }
            KeywordGroup::Conditional => self.build_conditional(schema, parent),
        }
    }

    fn build_ref(&mut self, schema: &AnnotatedNode, parent: NodeId) -> Result<NodeId, SchemaError> {
        let value = field(schema, "$ref")?;
        let reference = expect_str(value, "$ref")?.to_string();
        let id = self.graph.reserve(value.location().clone(), Some(parent));
        let slot = self.graph.next_slot();
        self.graph.set_kind(id, NodeKind::Ref { reference, slot });
        Ok(id)
    }

    fn build_recursive_ref(
        &mut self,
        schema: &AnnotatedNode,
        parent: NodeId,
    ) -> Result<NodeId, SchemaError> {
        let value = field(schema, "$recursiveRef")?;
        if expect_str(value, "$recursiveRef")? != "#" {
            return Err(SchemaError::invalid(
                "$recursiveRef",
                value.location(),
                "only \"#\" is supported",
            ));
        }
        let id = self.graph.reserve(value.location().clone(), Some(parent));
        let slot = self.graph.next_slot();
        self.graph.set_kind(id, NodeKind::RecursiveRef { slot });
        Ok(id)
    }

    fn build_defs(&mut self, schema: &AnnotatedNode, parent: NodeId) -> Result<NodeId, SchemaError> {
        let containers: Vec<(&str, &AnnotatedNode)> = ["$defs", "definitions"]
            .into_iter()
            .filter_map(|key| schema.get(key).map(|container| (key, container)))
            .collect();
        let location = containers[0].1.location().clone();
        let id = self.graph.reserve(location, Some(parent));

        let mut definitions = Vec::new();
        for (keyword, container) in containers {
            let entries = container
                .entries()
                .ok_or_else(|| SchemaError::invalid(keyword, container.location(), "expected an object"))?;
            for (name, definition) in entries {
                definitions.push((name.clone(), self.build(definition, Some(id))?));
            }
        }
        self.graph.set_kind(id, NodeKind::Defs(definitions));
        Ok(id)
    }

    fn build_schema_list(
        &mut self,
        schema: &AnnotatedNode,
        keyword: &str,
        parent: NodeId,
        kind: fn(Vec<NodeId>) -> NodeKind,
    ) -> Result<Option<NodeId>, SchemaError> {
        let value = field(schema, keyword)?;
        let items = value
            .items()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| SchemaError::invalid(keyword, value.location(), "expected a non-empty array"))?;
        let id = self.graph.reserve(value.location().clone(), Some(parent));
        let children = items
            .iter()
            .map(|item| self.build(item, Some(id)))
            .collect::<Result<Vec<_>, _>>()?;
        self.graph.set_kind(id, kind(children));
        Ok(Some(id))
    }

    fn build_conditional(
        &mut self,
        schema: &AnnotatedNode,
        parent: NodeId,
    ) -> Result<Option<NodeId>, SchemaError> {
        // then/else without if have no effect
        let Some(condition) = schema.get("if") else {
            return Ok(None);
        };
        let id = self.graph.reserve(condition.location().clone(), Some(parent));
        let condition = self.build(condition, Some(id))?;
        let then = schema.get("then").map(|s| self.build(s, Some(id))).transpose()?;
        let otherwise = schema.get("else").map(|s| self.build(s, Some(id))).transpose()?;
        self.graph.set_kind(
            id,
            NodeKind::Conditional {
                condition,
                then,
                otherwise,
            },
        );
        Ok(Some(id))
    }

    fn build_types(&mut self, schema: &AnnotatedNode, parent: NodeId) -> Result<NodeId, SchemaError> {
        let location = schema.location().push("type");
        let id = self.graph.reserve(location.clone(), Some(parent));

        let declared = match schema.get("type") {
            Some(value) if self.vocabularies.allows("type") => Some(parse_types(value)?),
            _ => None,
        };

        let branch_types: Vec<JsonType> = match &declared {
            Some(types) => types.clone(),
            None => [
                JsonType::Object,
                JsonType::Array,
                JsonType::Number,
                JsonType::String,
            ]
            .into_iter()
            .filter(|t| {
                type_keywords(*t)
                    .iter()
                    .any(|k| schema.contains_key(k) && self.vocabularies.allows(k))
            })
            .collect(),
        };

        let mut branches = Vec::new();
        for json_type in branch_types {
            let branch = self.graph.reserve(location.clone(), Some(id));
            let keywords = self.build_type_keywords(json_type, schema, branch)?;
            self.graph.set_kind(
                branch,
                NodeKind::Type {
                    json_type,
                    keywords,
                },
            );
            branches.push(branch);
        }

        self.graph.set_kind(id, NodeKind::Types { declared, branches });
        Ok(id)
    }

    fn build_type_keywords(
        &mut self,
        json_type: JsonType,
        schema: &AnnotatedNode,
        parent: NodeId,
    ) -> Result<Vec<NodeId>, SchemaError> {
        let mut keywords = Vec::new();
        let vocabularies = self.vocabularies;
        let active = |keyword: &str| schema.get(keyword).filter(|_| vocabularies.allows(keyword));

        match json_type {
            JsonType::String => {
                let (min_length, max_length, pattern) =
                    (active("minLength"), active("maxLength"), active("pattern"));
                if let Some(value) = min_length {
                    keywords.push(self.leaf(value, parent, Keyword::MinLength(count(value, "minLength")?)));
                }
                if let Some(value) = max_length {
                    keywords.push(self.leaf(value, parent, Keyword::MaxLength(count(value, "maxLength")?)));
                }
                if let Some(value) = pattern {
                    keywords.push(self.leaf(value, parent, Keyword::Pattern(regex(value, "pattern")?)));
                }
            }
            JsonType::Number | JsonType::Integer => {
                let bounds: [(&str, fn(f64) -> Keyword); 4] = [
                    ("minimum", Keyword::Minimum),
                    ("maximum", Keyword::Maximum),
                    ("exclusiveMinimum", Keyword::ExclusiveMinimum),
                    ("exclusiveMaximum", Keyword::ExclusiveMaximum),
                ];
                let present: Vec<_> = bounds
                    .iter()
                    .filter_map(|(name, make)| active(name).map(|value| (*name, *make, value)))
                    .collect();
                let multiple_of = active("multipleOf");
                for (name, make, value) in present {
                    keywords.push(self.leaf(value, parent, make(number(value, name)?)));
                }
                if let Some(value) = multiple_of {
                    let divisor = number(value, "multipleOf")?;
                    if divisor <= 0.0 {
                        return Err(SchemaError::invalid(
                            "multipleOf",
                            value.location(),
                            "must be strictly greater than 0",
                        ));
                    }
                    keywords.push(self.leaf(value, parent, Keyword::MultipleOf(divisor)));
                }
            }
            JsonType::Object => self.build_object_keywords(schema, parent, &mut keywords)?,
            JsonType::Array => self.build_array_keywords(schema, parent, &mut keywords)?,
            JsonType::Null | JsonType::Boolean => {}
        }
        Ok(keywords)
    }

    fn build_object_keywords(
        &mut self,
        schema: &AnnotatedNode,
        parent: NodeId,
        keywords: &mut Vec<NodeId>,
    ) -> Result<(), SchemaError> {
        let vocabularies = self.vocabularies;
        let active = |keyword: &str| schema.get(keyword).filter(|_| vocabularies.allows(keyword));

        let properties = active("properties");
        let patterns = active("patternProperties");
        let additional = active("additionalProperties");
        if let Some(first) = properties.or(patterns).or(additional) {
            let id = self.graph.reserve(first.location().clone(), Some(parent));
            let mut named = Vec::new();
            if let Some(value) = properties {
                for (name, sub) in object_entries(value, "properties")? {
                    named.push((name.clone(), self.build(sub, Some(id))?));
                }
            }
            let mut matched = Vec::new();
            if let Some(value) = patterns {
                for (pattern, sub) in object_entries(value, "patternProperties")? {
                    let compiled = compile_regex(pattern, "patternProperties", sub)?;
                    matched.push((compiled, self.build(sub, Some(id))?));
                }
            }
            let additional = additional.map(|s| self.build(s, Some(id))).transpose()?;
            self.graph.set_kind(
                id,
                NodeKind::Properties {
                    properties: named,
                    patterns: matched,
                    additional,
                },
            );
            keywords.push(id);
        }

        if let Some(value) = active("required") {
            let names = string_list(value, "required")?;
            keywords.push(self.leaf(value, parent, Keyword::Required(names)));
        }
        if let Some(value) = active("propertyNames") {
            let id = self.graph.reserve(value.location().clone(), Some(parent));
            let inner = self.build(value, Some(id))?;
            self.graph.set_kind(id, NodeKind::PropertyNames(inner));
            keywords.push(id);
        }
        if let Some(value) = active("minProperties") {
            keywords.push(self.leaf(value, parent, Keyword::MinProperties(count(value, "minProperties")?)));
        }
        if let Some(value) = active("maxProperties") {
            keywords.push(self.leaf(value, parent, Keyword::MaxProperties(count(value, "maxProperties")?)));
        }
        if let Some(value) = active("dependentRequired") {
            let mut dependencies = Vec::new();
            for (name, list) in object_entries(value, "dependentRequired")? {
                dependencies.push((name.clone(), string_list(list, "dependentRequired")?));
            }
            keywords.push(self.leaf(value, parent, Keyword::DependentRequired(dependencies)));
        }
        if let Some(value) = active("dependentSchemas") {
            let id = self.graph.reserve(value.location().clone(), Some(parent));
            let mut dependents = Vec::new();
            for (name, sub) in object_entries(value, "dependentSchemas")? {
                dependents.push((name.clone(), self.build(sub, Some(id))?));
            }
            self.graph.set_kind(id, NodeKind::DependentSchemas(dependents));
            keywords.push(id);
        }
        Ok(())
    }

    fn build_array_keywords(
        &mut self,
        schema: &AnnotatedNode,
        parent: NodeId,
        keywords: &mut Vec<NodeId>,
    ) -> Result<(), SchemaError> {
        let vocabularies = self.vocabularies;
        let active = |keyword: &str| schema.get(keyword).filter(|_| vocabularies.allows(keyword));

        // additionalItems only applies after a tuple-form items
        if let Some(items) = active("items") {
            let id = self.graph.reserve(items.location().clone(), Some(parent));
            let (form, additional) = match items.items() {
                Some(tuple) => {
                    let ids = tuple
                        .iter()
                        .map(|item| self.build(item, Some(id)))
                        .collect::<Result<Vec<_>, _>>()?;
                    let additional = active("additionalItems")
                        .map(|s| self.build(s, Some(id)))
                        .transpose()?;
                    (Items::Tuple(ids), additional)
                }
                None => (Items::Single(self.build(items, Some(id))?), None),
            };
            self.graph.set_kind(
                id,
                NodeKind::Items {
                    items: Some(form),
                    additional,
                },
            );
            keywords.push(id);
        }

        if let Some(contains) = active("contains") {
            let min = active("minContains")
                .map(|v| count(v, "minContains"))
                .transpose()?
                .unwrap_or(1);
            let max = active("maxContains")
                .map(|v| count(v, "maxContains"))
                .transpose()?;
            let id = self.graph.reserve(contains.location().clone(), Some(parent));
            let inner = self.build(contains, Some(id))?;
            self.graph.set_kind(
                id,
                NodeKind::Contains {
                    schema: inner,
                    min,
                    max,
                },
            );
            keywords.push(id);
        }

        if let Some(value) = active("minItems") {
            keywords.push(self.leaf(value, parent, Keyword::MinItems(count(value, "minItems")?)));
        }
        if let Some(value) = active("maxItems") {
            keywords.push(self.leaf(value, parent, Keyword::MaxItems(count(value, "maxItems")?)));
        }
        if let Some(value) = active("uniqueItems") {
            let unique = value.as_bool().ok_or_else(|| {
                SchemaError::invalid("uniqueItems", value.location(), "expected a boolean")
            })?;
            if unique {
                keywords.push(self.leaf(value, parent, Keyword::UniqueItems));
            }
        }
        Ok(())
    }

    fn leaf(&mut self, value: &AnnotatedNode, parent: NodeId, keyword: Keyword) -> NodeId {
        let id = self.graph.reserve(value.location().clone(), Some(parent));
        self.graph.set_kind(id, NodeKind::Keyword(keyword));
        id
    }
}

/// Keywords that only apply to instances of `json_type`.
fn type_keywords(json_type: JsonType) -> &'static [&'static str] {
    match json_type {
        JsonType::String => &["minLength", "maxLength", "pattern"],
        JsonType::Number | JsonType::Integer => &[
            "minimum",
            "maximum",
            "exclusiveMinimum",
            "exclusiveMaximum",
            "multipleOf",
        ],
        JsonType::Object => &[
            "properties",
            "patternProperties",
            "additionalProperties",
            "required",
            "propertyNames",
            "minProperties",
            "maxProperties",
            "dependentRequired",
            "dependentSchemas",
        ],
        JsonType::Array => &[
            "items",
            "additionalItems",
            "contains",
            "minContains",
            "maxContains",
            "minItems",
            "maxItems",
            "uniqueItems",
        ],
        JsonType::Null | JsonType::Boolean => &[],
    }
}

fn parse_types(value: &AnnotatedNode) -> Result<Vec<JsonType>, SchemaError> {
    let parse_one = |item: &AnnotatedNode| -> Result<JsonType, SchemaError> {
        item.as_str()
            .and_then(JsonType::parse)
            .ok_or_else(|| SchemaError::invalid("type", item.location(), "expected a JSON type name"))
    };

    if let Some(items) = value.items() {
        if items.is_empty() {
            return Err(SchemaError::invalid("type", value.location(), "must not be empty"));
        }
        let mut types = Vec::new();
        for item in items {
            let parsed = parse_one(item)?;
            if !types.contains(&parsed) {
                types.push(parsed);
            }
        }
        Ok(types)
    } else {
        Ok(vec![parse_one(value)?])
    }
}

fn field<'a>(schema: &'a AnnotatedNode, keyword: &str) -> Result<&'a AnnotatedNode, SchemaError> {
    schema
        .get(keyword)
        .ok_or_else(|| SchemaError::invalid(keyword, schema.location(), "missing"))
}

fn expect_str<'a>(value: &'a AnnotatedNode, keyword: &str) -> Result<&'a str, SchemaError> {
    value
        .as_str()
        .ok_or_else(|| SchemaError::invalid(keyword, value.location(), "expected a string"))
}

fn count(value: &AnnotatedNode, keyword: &str) -> Result<u64, SchemaError> {
    value.as_count().ok_or_else(|| {
        SchemaError::invalid(keyword, value.location(), "expected a non-negative integer")
    })
}

fn number(value: &AnnotatedNode, keyword: &str) -> Result<f64, SchemaError> {
    value
        .as_number()
        .and_then(|n| n.as_f64())
        .ok_or_else(|| SchemaError::invalid(keyword, value.location(), "expected a number"))
}

fn object_entries<'a>(
    value: &'a AnnotatedNode,
    keyword: &str,
) -> Result<&'a [(String, AnnotatedNode)], SchemaError> {
    value
        .entries()
        .ok_or_else(|| SchemaError::invalid(keyword, value.location(), "expected an object"))
}

fn string_list(value: &AnnotatedNode, keyword: &str) -> Result<Vec<String>, SchemaError> {
    let items = value
        .items()
        .ok_or_else(|| SchemaError::invalid(keyword, value.location(), "expected an array of strings"))?;
    items
        .iter()
        .map(|item| expect_str(item, keyword).map(str::to_string))
        .collect()
}

fn regex(value: &AnnotatedNode, keyword: &str) -> Result<Regex, SchemaError> {
    let pattern = expect_str(value, keyword)?;
    compile_regex(pattern, keyword, value)
}

fn compile_regex(pattern: &str, keyword: &str, at: &AnnotatedNode) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|e| SchemaError::InvalidRegex {
        keyword: keyword.to_string(),
        location: at.location().to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// `^[A-Za-z][-A-Za-z0-9.:_]*$`
fn is_valid_anchor(anchor: &str) -> bool {
    let mut chars = anchor.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use serde_json::{json, Value};

    fn build(schema: Value) -> Result<(Graph, NodeId), SchemaError> {
        let mut graph = Graph::new();
        let root = BuildContext::new(&mut graph, VocabularySet::all()).build(&annotate(&schema), None)?;
        Ok((graph, root))
    }

    #[test]
    fn booleans_and_empty_object() {
        let (graph, root) = build(json!(true)).unwrap();
        assert!(matches!(graph.node(root).kind, NodeKind::AcceptAll));

        let (graph, root) = build(json!(false)).unwrap();
        assert!(matches!(graph.node(root).kind, NodeKind::RejectAll));

        let (graph, root) = build(json!({})).unwrap();
        assert!(matches!(graph.node(root).kind, NodeKind::AcceptAll));
    }

    #[test]
    fn non_schema_values_are_rejected() {
        assert!(matches!(
            build(json!(42)),
            Err(SchemaError::InvalidSchemaType { actual, .. }) if actual == "integer"
        ));
        assert!(matches!(
            build(json!({"not": "string"})),
            Err(SchemaError::InvalidSchemaType { location, .. }) if location == "/not"
        ));
    }

    #[test]
    fn unsupported_keywords_fail_fast() {
        let result = build(json!({"unevaluatedProperties": true}));
        assert!(matches!(
            result,
            Err(SchemaError::UnsupportedKeyword { keyword, .. }) if keyword == "unevaluatedProperties"
        ));

        let nested = build(json!({"items": {"unevaluatedItems": false}}));
        assert!(matches!(
            nested,
            Err(SchemaError::UnsupportedKeyword { location, .. }) if location == "/items"
        ));
    }

    #[test]
    fn shared_keys_build_one_group() {
        let (graph, root) = build(json!({
            "items": [{"type": "string"}],
            "additionalItems": false,
            "minItems": 1
        }))
        .unwrap();
        let NodeKind::Schema(children) = &graph.node(root).kind else {
            panic!("expected a schema node");
        };
        assert_eq!(children.len(), 1);
        let NodeKind::Types { declared, branches } = &graph.node(children[0]).kind else {
            panic!("expected a type group");
        };
        assert!(declared.is_none());
        assert_eq!(branches.len(), 1);
    }

    #[test]
    fn malformed_payloads_report_location() {
        let result = build(json!({"properties": {"a": {"enum": 3}}}));
        assert!(matches!(
            result,
            Err(SchemaError::InvalidKeyword { keyword, location, .. })
                if keyword == "enum" && location == "/properties/a/enum"
        ));
    }

    #[test]
    fn invalid_patterns_are_schema_errors() {
        let result = build(json!({"pattern": "(unclosed"}));
        assert!(matches!(result, Err(SchemaError::InvalidRegex { .. })));
    }

    #[test]
    fn identity_is_recorded() {
        let (graph, root) = build(json!({
            "$id": "https://example.com/root.json",
            "$anchor": "Top",
            "$recursiveAnchor": true
        }))
        .unwrap();
        let node = graph.node(root);
        assert_eq!(node.id.as_deref(), Some("https://example.com/root.json"));
        assert_eq!(node.anchor.as_deref(), Some("Top"));
        assert!(node.recursive_anchor);
    }

    #[test]
    fn id_fragments_and_bad_anchors_are_rejected() {
        assert!(build(json!({"$id": "https://example.com/a#frag"})).is_err());
        assert!(build(json!({"$id": "https://example.com/a#"})).is_ok());
        assert!(build(json!({"$anchor": "1bad"})).is_err());
    }

    #[test]
    fn recursive_ref_must_be_hash() {
        assert!(build(json!({"$recursiveRef": "#/$defs/x"})).is_err());
        assert!(build(json!({"$recursiveRef": "#"})).is_ok());
    }

    #[test]
    fn refs_are_left_unresolved() {
        let (graph, root) = build(json!({"$ref": "#/$defs/missing"})).unwrap();
        let NodeKind::Schema(children) = &graph.node(root).kind else {
            panic!("expected a schema node");
        };
        assert!(matches!(
            &graph.node(children[0]).kind,
            NodeKind::Ref { reference, slot: 0 } if reference == "#/$defs/missing"
        ));
    }

    #[test]
    fn inactive_vocabulary_keywords_are_skipped() {
        let mut graph = Graph::new();
        let schema = annotate(&json!({"minLength": 3, "$defs": {"a": true}}));
        let root = BuildContext::new(&mut graph, VocabularySet::core_only())
            .build(&schema, None)
            .unwrap();
        let NodeKind::Schema(children) = &graph.node(root).kind else {
            panic!("expected a schema node");
        };
        assert_eq!(children.len(), 1);
        assert!(matches!(graph.node(children[0]).kind, NodeKind::Defs(_)));
    }

    #[test]
    fn construction_is_deterministic() {
        let schema = json!({
            "type": ["string", "array"],
            "items": {"$ref": "#"},
            "minLength": 2,
            "anyOf": [true, {"const": 1}]
        });
        let (first, _) = build(schema.clone()).unwrap();
        let (second, _) = build(schema).unwrap();
        let locations = |g: &Graph| g.nodes.iter().map(|n| n.location.to_string()).collect::<Vec<_>>();
        assert_eq!(locations(&first), locations(&second));
    }

    #[test]
    fn anchor_names() {
        assert!(is_valid_anchor("StringWithmax20"));
        assert!(is_valid_anchor("a-b.c:d_e"));
        assert!(!is_valid_anchor(""));
        assert!(!is_valid_anchor("has space"));
    }
}
