//! Compiled validators and their execution.

use serde_json::{Number, Value};

use crate::node::{Graph, Items, Keyword, NodeId, NodeKind};
use crate::output::ValidationResult;
use crate::pointer::InstancePath;
use crate::resolver::Resolution;
use crate::types::{json_equal, json_type_name, JsonType};

/// Operands are scaled by this factor before `multipleOf` takes a remainder.
const MULTIPLE_OF_SCALE: f64 = 100_000.0;

/// A compiled, fully resolved schema.
///
/// Every reference is bound before a `Validator` exists, and nothing in it
/// is mutated afterwards: one validator can be shared across threads and
/// used for any number of instances.
#[derive(Debug)]
pub struct Validator {
    graph: Graph,
    /// Resolved target of each `$ref`/`$recursiveRef` slot.
    targets: Vec<NodeId>,
    root: NodeId,
    known_uris: Vec<String>,
}

impl Validator {
    pub(crate) fn new(graph: Graph, resolution: Resolution, root: NodeId) -> Self {
        Self {
            graph,
            targets: resolution.targets,
            root,
            known_uris: resolution.context.known(),
        }
    }

    /// Validate `instance`, returning the full result tree.
    pub fn validate(&self, instance: &Value) -> ValidationResult {
        self.evaluate(self.root, instance, &InstancePath::Root)
    }

    /// Validate `instance`, discarding the details.
    ///
    /// Builds no result tree and renders no pointers; stops at the first
    /// failure wherever the outcome is already decided.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.check(self.root, instance)
    }

    /// Canonical base URI of the root schema.
    pub fn base_uri(&self) -> Option<&str> {
        self.graph.node(self.root).base_uri.as_ref().map(|u| u.as_str())
    }

    /// Every URI a `$ref` could have targeted, sorted.
    pub fn known_uris(&self) -> &[String] {
        &self.known_uris
    }

    fn evaluate(&self, id: NodeId, instance: &Value, path: &InstancePath<'_>) -> ValidationResult {
        let node = self.graph.node(id);
        let location = node.location.to_string();
        let here = path.to_pointer();

        match &node.kind {
            NodeKind::AcceptAll | NodeKind::Defs(_) => ValidationResult::valid(location, here),
            NodeKind::RejectAll => {
                ValidationResult::invalid(location, here, "false schema does not allow any value")
            }
            NodeKind::Schema(children) | NodeKind::AllOf(children) => {
                let results = children
                    .iter()
                    .map(|child| self.evaluate(*child, instance, path))
                    .collect();
                ValidationResult::all(location, here, results)
            }
            NodeKind::Ref { slot, .. } | NodeKind::RecursiveRef { slot } => {
                let target = self.evaluate(self.targets[*slot], instance, path);
                ValidationResult::all(location, here, vec![target])
            }
            NodeKind::Types { declared, branches } => {
                self.evaluate_types(declared.as_deref(), branches, instance, path, location, here)
            }
            NodeKind::Type {
                json_type,
                keywords,
            } => {
                if !json_type.matches(instance) {
                    return ValidationResult::invalid(
                        location,
                        here,
                        format!("expected {}, got {}", json_type, json_type_name(instance)),
                    );
                }
                let results = keywords
                    .iter()
                    .map(|child| self.evaluate(*child, instance, path))
                    .collect();
                ValidationResult::all(location, here, results)
            }
            NodeKind::Keyword(keyword) => match check_keyword(keyword, instance) {
                Some(message) => ValidationResult::invalid(location, here, message),
                None => ValidationResult::valid(location, here),
            },
            NodeKind::Properties {
                properties,
                patterns,
                additional,
            } => {
                let Some(object) = instance.as_object() else {
                    return ValidationResult::valid(location, here);
                };
                let mut results = Vec::new();
                for (key, value) in object {
                    let child_path = path.key(key);
                    let mut matched = false;
                    if let Some((_, schema)) = properties.iter().find(|(name, _)| name == key) {
                        matched = true;
                        results.push(self.evaluate(*schema, value, &child_path));
                    }
                    for (regex, schema) in patterns {
                        if regex.is_match(key) {
                            matched = true;
                            results.push(self.evaluate(*schema, value, &child_path));
                        }
                    }
                    if let (false, Some(schema)) = (matched, additional) {
                        results.push(self.evaluate(*schema, value, &child_path));
                    }
                }
                ValidationResult::all(location, here, results)
            }
            NodeKind::Items { items, additional } => {
                let Some(array) = instance.as_array() else {
                    return ValidationResult::valid(location, here);
                };
                let mut results = Vec::new();
                for (index, item) in array.iter().enumerate() {
                    let schema = match items {
                        Some(Items::Single(schema)) => Some(*schema),
                        Some(Items::Tuple(schemas)) => schemas.get(index).copied().or(*additional),
                        None => None,
                    };
                    if let Some(schema) = schema {
                        results.push(self.evaluate(schema, item, &path.index(index)));
                    }
                }
                ValidationResult::all(location, here, results)
            }
            NodeKind::Contains { schema, min, max } => {
                let Some(array) = instance.as_array() else {
                    return ValidationResult::valid(location, here);
                };
                let matches = array
                    .iter()
                    .enumerate()
                    .filter(|(index, item)| self.evaluate(*schema, item, &path.index(*index)).ok)
                    .count() as u64;
                if matches < *min {
                    ValidationResult::invalid(
                        location,
                        here,
                        format!("expected at least {} matching item(s), found {}", min, matches),
                    )
                } else {
                    match max {
                        Some(max) if matches > *max => ValidationResult::invalid(
                            location,
                            here,
                            format!("expected at most {} matching item(s), found {}", max, matches),
                        ),
                        _ => ValidationResult::valid(location, here),
                    }
                }
            }
            NodeKind::PropertyNames(schema) => {
                let Some(object) = instance.as_object() else {
                    return ValidationResult::valid(location, here);
                };
                let results = object
                    .keys()
                    .map(|key| {
                        let name = Value::String(key.clone());
                        self.evaluate(*schema, &name, &path.key(key))
                    })
                    .collect();
                ValidationResult::all(location, here, results)
            }
            NodeKind::DependentSchemas(dependents) => {
                let Some(object) = instance.as_object() else {
                    return ValidationResult::valid(location, here);
                };
                let results = dependents
                    .iter()
                    .filter(|(name, _)| object.contains_key(name))
                    .map(|(_, schema)| self.evaluate(*schema, instance, path))
                    .collect();
                ValidationResult::all(location, here, results)
            }
            NodeKind::AnyOf(children) => {
                let mut failures = Vec::new();
                for child in children {
                    let result = self.evaluate(*child, instance, path);
                    if result.ok {
                        return ValidationResult::valid(location, here);
                    }
                    failures.push(result);
                }
                ValidationResult::valid(location, here)
                    .fail_with("does not match any of the anyOf subschemas", failures)
            }
            NodeKind::OneOf(children) => {
                let results: Vec<ValidationResult> = children
                    .iter()
                    .map(|child| self.evaluate(*child, instance, path))
                    .collect();
                match results.iter().filter(|r| r.ok).count() {
                    1 => ValidationResult::valid(location, here),
                    0 => ValidationResult::valid(location, here)
                        .fail_with("does not match any of the oneOf subschemas", results),
                    n => ValidationResult::invalid(
                        location,
                        here,
                        format!("matches {} oneOf subschemas, expected exactly one", n),
                    ),
                }
            }
            NodeKind::Not(schema) => {
                if self.evaluate(*schema, instance, path).ok {
                    ValidationResult::invalid(location, here, "must not match the \"not\" subschema")
                } else {
                    ValidationResult::valid(location, here)
                }
            }
            NodeKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let branch = if self.evaluate(*condition, instance, path).ok {
                    then
                } else {
                    otherwise
                };
                let results = branch
                    .iter()
                    .map(|schema| self.evaluate(*schema, instance, path))
                    .collect();
                ValidationResult::all(location, here, results)
            }
        }
    }

    fn check(&self, id: NodeId, instance: &Value) -> bool {
        match &self.graph.node(id).kind {
            NodeKind::AcceptAll | NodeKind::Defs(_) => true,
            NodeKind::RejectAll => false,
            NodeKind::Schema(children) | NodeKind::AllOf(children) => {
                children.iter().all(|child| self.check(*child, instance))
            }
            NodeKind::Ref { slot, .. } | NodeKind::RecursiveRef { slot } => {
                self.check(self.targets[*slot], instance)
            }
            NodeKind::Types { declared, branches } => {
                let branch_type = |id: &NodeId| match &self.graph.node(*id).kind {
                    NodeKind::Type { json_type, .. } => Some(*json_type),
                    _ => None,
                };
                match declared {
                    None => {
                        let runtime = JsonType::of(instance);
                        branches
                            .iter()
                            .filter(|id| branch_type(id) == Some(runtime))
                            .all(|id| self.check(*id, instance))
                    }
                    Some(_) => branches
                        .iter()
                        .filter(|id| branch_type(id).is_some_and(|t| t.matches(instance)))
                        .any(|id| self.check(*id, instance)),
                }
            }
            NodeKind::Type {
                json_type,
                keywords,
            } => json_type.matches(instance) && keywords.iter().all(|child| self.check(*child, instance)),
            NodeKind::Keyword(keyword) => check_keyword(keyword, instance).is_none(),
            NodeKind::Properties {
                properties,
                patterns,
                additional,
            } => {
                let Some(object) = instance.as_object() else {
                    return true;
                };
                object.iter().all(|(key, value)| {
                    let mut matched = false;
                    if let Some((_, schema)) = properties.iter().find(|(name, _)| name == key) {
                        matched = true;
                        if !self.check(*schema, value) {
                            return false;
                        }
                    }
                    for (regex, schema) in patterns {
                        if regex.is_match(key) {
                            matched = true;
                            if !self.check(*schema, value) {
                                return false;
                            }
                        }
                    }
                    match (matched, additional) {
                        (false, Some(schema)) => self.check(*schema, value),
                        _ => true,
                    }
                })
            }
            NodeKind::Items { items, additional } => {
                let Some(array) = instance.as_array() else {
                    return true;
                };
                array.iter().enumerate().all(|(index, item)| {
                    let schema = match items {
                        Some(Items::Single(schema)) => Some(*schema),
                        Some(Items::Tuple(schemas)) => schemas.get(index).copied().or(*additional),
                        None => None,
                    };
                    schema.map_or(true, |schema| self.check(schema, item))
                })
            }
            NodeKind::Contains { schema, min, max } => {
                let Some(array) = instance.as_array() else {
                    return true;
                };
                let matches = array.iter().filter(|item| self.check(*schema, item)).count() as u64;
                matches >= *min && max.map_or(true, |max| matches <= max)
            }
            NodeKind::PropertyNames(schema) => {
                let Some(object) = instance.as_object() else {
                    return true;
                };
                object
                    .keys()
                    .all(|key| self.check(*schema, &Value::String(key.clone())))
            }
            NodeKind::DependentSchemas(dependents) => {
                let Some(object) = instance.as_object() else {
                    return true;
                };
                dependents
                    .iter()
                    .filter(|(name, _)| object.contains_key(name))
                    .all(|(_, schema)| self.check(*schema, instance))
            }
            NodeKind::AnyOf(children) => children.iter().any(|child| self.check(*child, instance)),
            NodeKind::OneOf(children) => {
                children
                    .iter()
                    .filter(|child| self.check(**child, instance))
                    .take(2)
                    .count()
                    == 1
            }
            NodeKind::Not(schema) => !self.check(*schema, instance),
            NodeKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let branch = if self.check(*condition, instance) {
                    then
                } else {
                    otherwise
                };
                branch.map_or(true, |schema| self.check(schema, instance))
            }
        }
    }

    fn evaluate_types(
        &self,
        declared: Option<&[JsonType]>,
        branches: &[NodeId],
        instance: &Value,
        path: &InstancePath<'_>,
        location: String,
        here: String,
    ) -> ValidationResult {
        let branch_type = |id: &NodeId| match &self.graph.node(*id).kind {
            NodeKind::Type { json_type, .. } => Some(*json_type),
            _ => None,
        };

        let Some(declared) = declared else {
            let runtime = JsonType::of(instance);
            let results = branches
                .iter()
                .filter(|id| branch_type(id) == Some(runtime))
                .map(|id| self.evaluate(*id, instance, path))
                .collect();
            return ValidationResult::all(location, here, results);
        };

        let matching: Vec<NodeId> = branches
            .iter()
            .filter(|id| branch_type(id).map(|t| t.matches(instance)).unwrap_or(false))
            .copied()
            .collect();
        if matching.is_empty() {
            let names: Vec<&str> = declared.iter().map(|t| t.name()).collect();
            return ValidationResult::invalid(
                location,
                here,
                format!("{} is not of type {}", json_type_name(instance), names.join(" or ")),
            );
        }

        let mut failures = Vec::new();
        for id in matching {
            let result = self.evaluate(id, instance, path);
            if result.ok {
                return ValidationResult::valid(location, here);
            }
            failures.push(result);
        }
        ValidationResult::all(location, here, failures)
    }
}

/// Failure message for a leaf keyword, or `None` when it holds.
fn check_keyword(keyword: &Keyword, instance: &Value) -> Option<String> {
    match (keyword, instance) {
        (Keyword::Const(expected), _) => {
            (!json_equal(expected, instance)).then(|| format!("expected {}", expected))
        }
        (Keyword::Enum(options), _) => (!options.iter().any(|o| json_equal(o, instance)))
            .then(|| format!("{} is not one of the enumerated values", instance)),
        (Keyword::MinLength(min), Value::String(s)) => {
            let length = s.chars().count() as u64;
            (length < *min).then(|| format!("{:?} is shorter than {} characters", s, min))
        }
        (Keyword::MaxLength(max), Value::String(s)) => {
            let length = s.chars().count() as u64;
            (length > *max).then(|| format!("{:?} is longer than {} characters", s, max))
        }
        (Keyword::Pattern(regex), Value::String(s)) => {
            (!regex.is_match(s)).then(|| format!("{:?} does not match {:?}", s, regex.as_str()))
        }
        (Keyword::Minimum(min), Value::Number(n)) => {
            let x = n.as_f64()?;
            (x < *min).then(|| format!("{} is less than the minimum of {}", n, min))
        }
        (Keyword::Maximum(max), Value::Number(n)) => {
            let x = n.as_f64()?;
            (x > *max).then(|| format!("{} is greater than the maximum of {}", n, max))
        }
        (Keyword::ExclusiveMinimum(min), Value::Number(n)) => {
            let x = n.as_f64()?;
            (x <= *min).then(|| format!("{} is not greater than {}", n, min))
        }
        (Keyword::ExclusiveMaximum(max), Value::Number(n)) => {
            let x = n.as_f64()?;
            (x >= *max).then(|| format!("{} is not less than {}", n, max))
        }
        (Keyword::MultipleOf(divisor), Value::Number(n)) => {
            (!is_multiple_of(n, *divisor)).then(|| format!("{} is not a multiple of {}", n, divisor))
        }
        (Keyword::MinItems(min), Value::Array(items)) => ((items.len() as u64) < *min)
            .then(|| format!("expected at least {} items, found {}", min, items.len())),
        (Keyword::MaxItems(max), Value::Array(items)) => ((items.len() as u64) > *max)
            .then(|| format!("expected at most {} items, found {}", max, items.len())),
        (Keyword::UniqueItems, Value::Array(items)) => {
            let duplicate = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| json_equal(a, b)));
            duplicate.then(|| "array items are not unique".to_string())
        }
        (Keyword::Required(names), Value::Object(object)) => {
            let missing: Vec<&str> = names
                .iter()
                .filter(|name| !object.contains_key(*name))
                .map(String::as_str)
                .collect();
            (!missing.is_empty()).then(|| format!("missing required properties: {}", missing.join(", ")))
        }
        (Keyword::MinProperties(min), Value::Object(object)) => ((object.len() as u64) < *min)
            .then(|| format!("expected at least {} properties, found {}", min, object.len())),
        (Keyword::MaxProperties(max), Value::Object(object)) => ((object.len() as u64) > *max)
            .then(|| format!("expected at most {} properties, found {}", max, object.len())),
        (Keyword::DependentRequired(dependencies), Value::Object(object)) => {
            let mut missing = Vec::new();
            for (name, required) in dependencies {
                if !object.contains_key(name) {
                    continue;
                }
                for dependency in required {
                    if !object.contains_key(dependency) {
                        missing.push(format!("{} (required by {})", dependency, name));
                    }
                }
            }
            (!missing.is_empty()).then(|| format!("missing dependent properties: {}", missing.join(", ")))
        }
        // type-specific keywords ignore other types
        _ => None,
    }
}

/// `multipleOf` on scaled operands, so `0.3` is a multiple of `0.1`.
fn is_multiple_of(value: &Number, divisor: f64) -> bool {
    if divisor.fract() == 0.0 && divisor <= i64::MAX as f64 {
        if let Some(v) = value.as_i64() {
            return v % (divisor as i64) == 0;
        }
        if let Some(v) = value.as_u64() {
            return v % (divisor as u64) == 0;
        }
    }

    let Some(x) = value.as_f64() else {
        return false;
    };
    let scaled_value = (x * MULTIPLE_OF_SCALE).round();
    let scaled_divisor = (divisor * MULTIPLE_OF_SCALE).round();
    if scaled_divisor == 0.0 || scaled_value.abs() > 2f64.powi(53) {
        let quotient = x / divisor;
        return quotient.is_finite() && quotient.fract() == 0.0;
    }
    scaled_value % scaled_divisor == 0.0
}
