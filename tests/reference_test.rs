//! `$ref`, `$recursiveRef` and cross-document resolution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use schemagraph::{
    construct_validator, BundledLoader, CompileOptions, LoadError, SchemaError, SchemaLoader,
};

/// Serves documents from memory and counts fetches.
struct MapLoader {
    documents: HashMap<String, Value>,
    fetches: Arc<AtomicUsize>,
}

impl MapLoader {
    fn new(documents: &[(&str, Value)]) -> Self {
        Self {
            documents: documents
                .iter()
                .map(|(uri, doc)| (uri.to_string(), doc.clone()))
                .collect(),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SchemaLoader for MapLoader {
    fn get(&self, uri: &str) -> Result<Value, LoadError> {
        match self.documents.get(uri) {
            Some(document) => {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                Ok(document.clone())
            }
            None => BundledLoader.get(uri),
        }
    }
}

fn compile_with(documents: &[(&str, Value)], schema: Value) -> Result<schemagraph::Validator, SchemaError> {
    CompileOptions::new()
        .with_loader(Box::new(MapLoader::new(documents)))
        .build(&schema)
}

mod anchors_and_pointers {
    use super::*;

    fn ope(reference: &str) -> Value {
        json!({
            "$id": "https://example.com/ope",
            "$defs": {
                "string": {"$anchor": "StringWithmax20", "maxLength": 20}
            },
            "items": {"$ref": reference}
        })
    }

    #[test]
    fn absolute_anchor_reference() {
        let validator = construct_validator(&ope("https://example.com/ope#StringWithmax20")).unwrap();
        assert!(validator.is_valid(&json!(["12345", "67890"])));
        assert!(!validator.is_valid(&json!(["12345", "this string is longer than twenty"])));
    }

    #[test]
    fn relative_pointer_reference() {
        let validator = construct_validator(&ope("#/$defs/string")).unwrap();
        assert!(validator.is_valid(&json!(["12345", "67890"])));
        assert!(!validator.is_valid(&json!(["this string is longer than twenty"])));
    }

    #[test]
    fn relative_anchor_reference() {
        let validator = construct_validator(&ope("#StringWithmax20")).unwrap();
        assert!(!validator.is_valid(&json!(["this string is longer than twenty"])));
    }

    #[test]
    fn escaped_pointer_tokens() {
        let validator = construct_validator(&json!({
            "$defs": {
                "a/b": {"type": "integer"},
                "c d": {"type": "string"},
                "e~f": {"type": "boolean"}
            },
            "properties": {
                "slash": {"$ref": "#/$defs/a~1b"},
                "space": {"$ref": "#/$defs/c%20d"},
                "tilde": {"$ref": "#/$defs/e~0f"}
            }
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"slash": 1, "space": "x", "tilde": true})));
        assert!(!validator.is_valid(&json!({"slash": "1"})));
        assert!(!validator.is_valid(&json!({"space": 1})));
        assert!(!validator.is_valid(&json!({"tilde": 0})));
    }

    #[test]
    fn embedded_resources() {
        let validator = construct_validator(&json!({
            "$id": "https://example.com/root.json",
            "$defs": {
                "inner": {
                    "$id": "inner.json",
                    "$defs": {"positive": {"minimum": 1}},
                    "$ref": "#/$defs/positive"
                }
            },
            "properties": {
                "by_id": {"$ref": "inner.json"},
                "by_resource_pointer": {"$ref": "inner.json#/$defs/positive"},
                "by_document_pointer": {"$ref": "#/$defs/inner/$defs/positive"}
            }
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"by_id": 2, "by_resource_pointer": 2, "by_document_pointer": 2})));
        for key in ["by_id", "by_resource_pointer", "by_document_pointer"] {
            assert!(!validator.is_valid(&json!({ key: 0 })), "{} should reject 0", key);
        }
    }

    #[test]
    fn references_inside_nested_ids_use_the_nested_base() {
        let validator = construct_validator(&json!({
            "$id": "https://example.com/a/root.json",
            "properties": {
                "x": {
                    "$id": "https://example.com/b/",
                    "$ref": "leaf.json"
                }
            },
            "$defs": {
                "leaf": {"$id": "https://example.com/b/leaf.json", "type": "string"}
            }
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"x": "s"})));
        assert!(!validator.is_valid(&json!({"x": 1})));
    }

    #[test]
    fn mutual_recursion_through_structure() {
        let validator = construct_validator(&json!({
            "$defs": {
                "even": {"anyOf": [{"const": []}, {"items": [true], "additionalItems": {"$ref": "#/$defs/odd"}, "minItems": 1}]},
                "odd": {"type": "array", "items": {"$ref": "#/$defs/even"}}
            },
            "$ref": "#/$defs/even"
        }))
        .unwrap();
        assert!(validator.is_valid(&json!([])));
        assert!(validator.is_valid(&json!([0, [[]]])));
    }
}

mod recursive_refs {
    use super::*;

    fn tree() -> Value {
        json!({
            "$id": "https://example.com/tree",
            "$recursiveAnchor": true,
            "type": "object",
            "properties": {
                "data": {
                    "anyOf": [
                        {"type": "string"},
                        {"type": "array", "items": {"$recursiveRef": "#"}}
                    ]
                }
            },
            "required": ["data"]
        })
    }

    #[test]
    fn nested_instances() {
        let validator = construct_validator(&tree()).unwrap();
        assert!(validator.is_valid(&json!({"data": [{"data": "inner"}]})));
        assert!(!validator.is_valid(&json!({"data": [{"data": 5}]})));
        assert!(!validator.is_valid(&json!({"data": [{"nodata": "x"}]})));
    }

    #[test]
    fn arbitrary_depth() {
        let validator = construct_validator(&tree()).unwrap();
        let mut instance = json!({"data": "leaf"});
        for _ in 0..50 {
            instance = json!({"data": [instance]});
        }
        assert!(validator.is_valid(&instance));
    }

    #[test]
    fn binds_to_the_outermost_anchor() {
        let validator = construct_validator(&json!({
            "$id": "https://example.com/strict-tree",
            "$recursiveAnchor": true,
            "$ref": "#/$defs/node",
            "required": ["name"],
            "$defs": {
                "node": {
                    "$recursiveAnchor": true,
                    "type": "object",
                    "properties": {
                        "children": {"type": "array", "items": {"$recursiveRef": "#"}}
                    }
                }
            }
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"name": "a", "children": [{"name": "b"}]})));
        assert!(!validator.is_valid(&json!({"name": "a", "children": [{"children": []}]})));
    }

    #[test]
    fn embedded_resource_without_an_anchor_recurses_into_itself() {
        let validator = construct_validator(&json!({
            "$id": "https://example.com/root",
            "$recursiveAnchor": true,
            "type": "object",
            "properties": {"inner": {"$ref": "inner"}},
            "$defs": {
                "inner": {
                    "$id": "inner",
                    "type": ["integer", "array"],
                    "items": {"$recursiveRef": "#"}
                }
            }
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"inner": [1, [2]]})));
        assert!(validator.validate(&json!({"inner": [1, [2, [3]]]})).ok);
        assert!(!validator.is_valid(&json!({"inner": [1, {"a": 2}]})));
    }

    #[test]
    fn anchored_embedded_resource_extends_the_outer_anchor() {
        let validator = construct_validator(&json!({
            "$id": "https://example.com/root",
            "$recursiveAnchor": true,
            "type": "object",
            "required": ["id"],
            "properties": {"list": {"$ref": "list"}},
            "$defs": {
                "list": {
                    "$id": "list",
                    "$recursiveAnchor": true,
                    "type": "array",
                    "items": {"$recursiveRef": "#"}
                }
            }
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"id": 1, "list": [{"id": 2}]})));
        // items bind to the root, which only accepts objects
        assert!(!validator.is_valid(&json!({"id": 1, "list": [[]]})));
        assert!(!validator.is_valid(&json!({"id": 1, "list": [{"name": "x"}]})));
    }

    #[test]
    fn without_an_anchor_acts_like_ref_to_root() {
        let validator = construct_validator(&json!({
            "type": "object",
            "properties": {"next": {"$recursiveRef": "#"}},
            "additionalProperties": false
        }))
        .unwrap();
        assert!(validator.is_valid(&json!({"next": {"next": {}}})));
        assert!(!validator.is_valid(&json!({"next": {"other": 1}})));
    }
}

mod cross_document {
    use super::*;

    #[test]
    fn loads_referenced_documents_once() {
        let loader = MapLoader::new(&[
            (
                "https://example.com/types.json",
                json!({"$defs": {"money": {"type": "integer", "minimum": 0}}}),
            ),
            (
                "https://example.com/order.json",
                json!({
                    "properties": {
                        "total": {"$ref": "types.json#/$defs/money"},
                        "tax": {"$ref": "types.json#/$defs/money"}
                    }
                }),
            ),
        ]);
        let fetches = Arc::clone(&loader.fetches);

        let validator = CompileOptions::new()
            .with_loader(Box::new(loader))
            .build(&json!({
                "$id": "https://example.com/checkout.json",
                "properties": {"order": {"$ref": "order.json"}}
            }))
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert!(validator.is_valid(&json!({"order": {"total": 10, "tax": 1}})));
        assert!(!validator.is_valid(&json!({"order": {"total": -1}})));
    }

    #[test]
    fn documents_may_reference_each_other() {
        let validator = compile_with(
            &[
                (
                    "https://example.com/a.json",
                    json!({"type": "object", "properties": {"b": {"$ref": "b.json"}}}),
                ),
                (
                    "https://example.com/b.json",
                    json!({"type": "array", "items": {"$ref": "a.json"}}),
                ),
            ],
            json!({"$ref": "https://example.com/a.json"}),
        )
        .unwrap();
        assert!(validator.is_valid(&json!({"b": [{"b": []}, {}]})));
        assert!(!validator.is_valid(&json!({"b": [{"b": {}}]})));
    }

    #[test]
    fn loaded_documents_honour_their_own_ids() {
        let validator = compile_with(
            &[(
                "https://example.com/v1/name.json",
                json!({
                    "$id": "https://example.com/v1/name.json",
                    "$defs": {"short": {"$anchor": "short", "maxLength": 3}},
                    "$ref": "#short"
                }),
            )],
            json!({"$ref": "https://example.com/v1/name.json"}),
        )
        .unwrap();
        assert!(validator.is_valid(&json!("abc")));
        assert!(!validator.is_valid(&json!("abcd")));
    }

    #[test]
    fn missing_documents_are_unresolvable() {
        let result = compile_with(&[], json!({"$ref": "https://example.com/nowhere.json#/$defs/x"}));
        assert!(matches!(
            result,
            Err(SchemaError::Unresolvable { uri, .. }) if uri == "https://example.com/nowhere.json"
        ));
    }

    #[test]
    fn loaded_document_errors_propagate() {
        let result = compile_with(
            &[("https://example.com/bad.json", json!({"type": "object", "minProperties": "two"}))],
            json!({"$ref": "https://example.com/bad.json"}),
        );
        assert!(matches!(
            result,
            Err(SchemaError::InvalidKeyword { keyword, .. }) if keyword == "minProperties"
        ));
    }
}

mod resolution_errors {
    use super::*;

    #[test]
    fn unknown_fragment_lists_known_uris() {
        let result = construct_validator(&json!({
            "$defs": {"a": true},
            "$ref": "#/$defs/b"
        }));
        match result {
            Err(SchemaError::Unresolvable { uri, location, known }) => {
                assert_eq!(uri, "json-schema:///#/$defs/b");
                assert_eq!(location, "/$ref");
                assert!(known.contains(&"json-schema:///#/$defs/a".to_string()));
            }
            other => panic!("expected Unresolvable, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_ids() {
        let result = construct_validator(&json!({
            "$defs": {
                "a": {"$id": "https://example.com/same"},
                "b": {"$id": "https://example.com/same"}
            }
        }));
        assert!(matches!(result, Err(SchemaError::DuplicateUri { .. })));
    }

    #[test]
    fn self_reference_without_progress() {
        let result = construct_validator(&json!({"$ref": "#"}));
        assert!(matches!(result, Err(SchemaError::InfiniteRecursion { .. })));

        let result = construct_validator(&json!({
            "$defs": {
                "a": {"allOf": [{"$ref": "#/$defs/b"}]},
                "b": {"not": {"$ref": "#/$defs/a"}}
            },
            "$ref": "#/$defs/a"
        }));
        assert!(matches!(result, Err(SchemaError::InfiniteRecursion { .. })));
    }

    #[test]
    fn recursion_through_structure_is_fine() {
        assert!(construct_validator(&json!({"items": {"$ref": "#"}})).is_ok());
        assert!(construct_validator(&json!({"properties": {"a": {"$ref": "#"}}})).is_ok());
    }

    #[test]
    fn fragments_in_ids_are_rejected() {
        let result = CompileOptions::new()
            .validate_schema(false)
            .build(&json!({"$id": "https://example.com/a#frag"}));
        assert!(matches!(result, Err(SchemaError::InvalidKeyword { keyword, .. }) if keyword == "$id"));
    }
}
