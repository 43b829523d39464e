use chrono::{DateTime, Utc};
use opentelemetry::trace::{SpanContext, SpanKind, Status};
use opentelemetry::{Key, KeyValue, Value};

use crate::model::tracer::TracerIdentity;

/// A span reconstructed from a captured event, ready to be handed to the
/// controller exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanDescriptor {
    pub name: String,
    pub kind: SpanKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub span_context: Option<SpanContext>,
    pub parent: Option<SpanContext>,
    pub attributes: Attributes,
    pub status: Status,
    pub scope: TracerIdentity,
}

/// Ordered attribute set with unique keys; setting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<KeyValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|kv| kv.key == key) {
            Some(existing) => existing.value = value,
            None => self.entries.push(KeyValue::new(key, value)),
        }
    }

    pub fn set_opt(&mut self, key: impl Into<Key>, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<KeyValue> {
        self.entries
    }
}

impl Extend<KeyValue> for Attributes {
    fn extend<T: IntoIterator<Item = KeyValue>>(&mut self, iter: T) {
        for kv in iter {
            self.set(kv.key, kv.value);
        }
    }
}

impl FromIterator<KeyValue> for Attributes {
    fn from_iter<T: IntoIterator<Item = KeyValue>>(iter: T) -> Self {
        let mut attrs = Self::new();
        attrs.extend(iter);
        attrs
    }
}

/// Error status when `failed`, carrying `message` as the description if one
/// was captured. Anything else leaves the status unset.
pub fn status_for(failed: bool, message: Option<&str>) -> Status {
    if !failed {
        return Status::Unset;
    }
    match message.filter(|m| !m.is_empty()) {
        Some(message) => Status::error(message.to_string()),
        None => Status::error(""),
    }
}
