//! Dynamic view of request and response values at the interception boundary.
//!
//! The client library whose calls are intercepted is not linked against, so
//! its requests and responses cross the boundary as [`SdkObject`]s: a type
//! name plus named members. A missing member or a member of an unexpected
//! kind reads as `None`. Member names match regardless of `camelCase`,
//! `PascalCase` or `snake_case` spelling.

use std::collections::BTreeMap;

use bytes::Bytes;

/// A member value of an [`SdkObject`].
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Bytes),
    List(Vec<Member>),
    Object(SdkObject),
}

impl Member {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SdkObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Render scalar members as text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Bytes(b) => std::str::from_utf8(b).ok().map(str::to_owned),
            Self::Null | Self::List(_) | Self::Object(_) => None,
        }
    }

    /// Read as an integer, parsing text if needed.
    pub fn to_long(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read as raw bytes: bytes as-is, text as UTF-8, or a list of byte values.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            Self::Bytes(b) => Some(b.clone()),
            Self::Str(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            Self::List(items) => items
                .iter()
                .map(|item| match item {
                    Self::Int(n) => u8::try_from(*n).ok(),
                    _ => None,
                })
                .collect::<Option<Vec<u8>>>()
                .map(Bytes::from),
            _ => None,
        }
    }
}

impl From<&str> for Member {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Member {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Member {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u16> for Member {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for Member {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Bytes> for Member {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Member {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Vec<Member>> for Member {
    fn from(value: Vec<Member>) -> Self {
        Self::List(value)
    }
}

impl From<SdkObject> for Member {
    fn from(value: SdkObject) -> Self {
        Self::Object(value)
    }
}

/// An opaque request or response value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SdkObject {
    type_name: String,
    members: BTreeMap<String, Member>,
}

impl SdkObject {
    /// An object with no members.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: BTreeMap::new(),
        }
    }

    pub fn builder(type_name: impl Into<String>) -> SdkObjectBuilder {
        SdkObjectBuilder {
            inner: Self::new(type_name),
        }
    }

    /// Fully-qualified runtime type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a member by name, tolerating spelling conventions.
    pub fn get(&self, name: &str) -> Option<&Member> {
        if let Some(member) = self.members.get(name) {
            return Some(member);
        }
        let wanted = normalise(name);
        self.members
            .iter()
            .find(|(key, _)| normalise(key) == wanted)
            .map(|(_, member)| member)
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Member::to_text)
    }

    pub fn long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Member::to_long)
    }

    pub fn bytes(&self, name: &str) -> Option<Bytes> {
        self.get(name).and_then(Member::to_bytes)
    }

    pub fn object(&self, name: &str) -> Option<&SdkObject> {
        self.get(name).and_then(Member::as_object)
    }

    /// List member, or an empty slice when absent or not a list.
    pub fn list(&self, name: &str) -> &[Member] {
        match self.get(name) {
            Some(Member::List(items)) => items,
            _ => &[],
        }
    }

    /// Start an updated copy of this object.
    pub fn to_builder(&self) -> SdkObjectBuilder {
        SdkObjectBuilder {
            inner: self.clone(),
        }
    }
}

/// Builder for [`SdkObject`], also used for copy-on-write updates.
#[derive(Debug, Clone)]
pub struct SdkObjectBuilder {
    inner: SdkObject,
}

impl SdkObjectBuilder {
    /// Set a member, replacing any existing member with an equivalent name.
    #[must_use]
    pub fn set(mut self, name: &str, value: impl Into<Member>) -> Self {
        self.set_mut(name, value);
        self
    }

    /// In-place form of [`set`](Self::set), for builder-consumer callbacks.
    pub fn set_mut(&mut self, name: &str, value: impl Into<Member>) {
        let wanted = normalise(name);
        self.inner.members.retain(|key, _| normalise(key) != wanted);
        self.inner.members.insert(name.to_owned(), value.into());
    }

    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn build(self) -> SdkObject {
        self.inner
    }
}

fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
