//! JSON Pointer (RFC 6901) locations for schemas and instances.

use std::fmt;

/// An escaped JSON Pointer, `""` being the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPointer(String);

impl JsonPointer {
    pub fn root() -> Self {
        JsonPointer(String::new())
    }

    /// Returns a new pointer with `token` appended.
    pub fn push(&self, token: impl AsRef<str>) -> Self {
        let mut pointer = self.0.clone();
        pointer.push('/');
        pointer.push_str(&escape(token.as_ref()));
        JsonPointer(pointer)
    }

    pub fn push_index(&self, index: usize) -> Self {
        JsonPointer(format!("{}/{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part of `self` below `ancestor`, if `ancestor` is a prefix.
    pub fn relative_to(&self, ancestor: &JsonPointer) -> Option<JsonPointer> {
        let rest = self.0.strip_prefix(ancestor.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(JsonPointer(rest.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&JsonPointer> for String {
    fn from(pointer: &JsonPointer) -> Self {
        pointer.0.clone()
    }
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Instance position during validation.
///
/// Descending only borrows the parent frame. The pointer string is rendered
/// by [`InstancePath::to_pointer`] for each reported result, and never on
/// the boolean path.
#[derive(Debug, Clone, Copy)]
pub(crate) enum InstancePath<'a> {
    Root,
    Key(&'a InstancePath<'a>, &'a str),
    Index(&'a InstancePath<'a>, usize),
}

impl<'a> InstancePath<'a> {
    pub fn key(&'a self, key: &'a str) -> InstancePath<'a> {
        InstancePath::Key(self, key)
    }

    pub fn index(&'a self, index: usize) -> InstancePath<'a> {
        InstancePath::Index(self, index)
    }

    pub fn to_pointer(&self) -> String {
        match self {
            InstancePath::Root => String::new(),
            InstancePath::Key(parent, key) => format!("{}/{}", parent.to_pointer(), escape(key)),
            InstancePath::Index(parent, index) => format!("{}/{}", parent.to_pointer(), index),
        }
    }
}
