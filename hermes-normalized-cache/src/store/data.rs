use crate::error::StoreError;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Fields of a record, keyed by storage key.
pub type Fields = BTreeMap<String, StoreValue>;

const TYPENAME: &str = "__typename";

/// A stored field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreValue {
    /// Any JSON leaf, including `null`.
    Scalar(Value),
    /// A reference to another record by identity. Only resolved when reading.
    Ref(String),
    List(Vec<StoreValue>),
    /// An object without an identity, stored on its parent.
    Object(Fields)
}

/// Merge an incoming value over an existing one. Inline objects merge field by field, anything
/// else is replaced.
pub(crate) fn merge_value(existing: Option<&StoreValue>, incoming: StoreValue) -> StoreValue {
    match (existing, incoming) {
        (Some(StoreValue::Object(existing)), StoreValue::Object(incoming)) => {
            let mut merged = existing.clone();
            merge_fields(&mut merged, incoming);
            StoreValue::Object(merged)
        }
        (_, incoming) => incoming
    }
}

pub(crate) fn merge_fields(target: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        let merged = merge_value(target.get(&key), value);
        target.insert(key, merged);
    }
}

pub(crate) fn typename_of(fields: &Fields) -> Option<&str> {
    match fields.get(TYPENAME) {
        Some(StoreValue::Scalar(Value::String(typename))) => Some(typename),
        _ => None
    }
}

/// A normalized entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    identity: String,
    fields: Fields
}

impl EntityRecord {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field_key: &str) -> Option<&StoreValue> {
        self.fields.get(field_key)
    }

    pub fn typename(&self) -> Option<&str> {
        typename_of(&self.fields)
    }
}

/// A serializable copy of every record in a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: BTreeMap<String, Fields>
}

/// Identity-keyed record storage.
#[derive(Debug, Default)]
pub struct CacheStore {
    records: FnvHashMap<String, EntityRecord>
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, identity: &str) -> Option<&EntityRecord> {
        self.records.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Merge `fields` into the record, creating it if needed. Returns the keys whose value
    /// actually changed, so writing the same values twice returns an empty set.
    pub fn write(&mut self, identity: &str, fields: Fields) -> HashSet<String> {
        let record = self
            .records
            .entry(identity.to_string())
            .or_insert_with(|| EntityRecord {
                identity: identity.to_string(),
                fields: Fields::new()
            });

        let mut changed = HashSet::new();
        for (key, value) in fields {
            let merged = merge_value(record.fields.get(&key), value);
            if record.fields.get(&key) != Some(&merged) {
                record.fields.insert(key.clone(), merged);
                changed.insert(key);
            }
        }
        changed
    }

    /// Remove a single record. References to it are left in place and read as misses.
    pub fn evict(&mut self, identity: &str) -> Result<EntityRecord, StoreError> {
        self.records
            .remove(identity)
            .ok_or_else(|| StoreError::UnknownIdentity(identity.to_string()))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn extract(&self) -> Snapshot {
        Snapshot {
            records: self
                .records
                .iter()
                .map(|(identity, record)| (identity.clone(), record.fields.clone()))
                .collect()
        }
    }

    /// Replace the contents of the store with a snapshot.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.records = snapshot
            .records
            .into_iter()
            .map(|(identity, fields)| {
                let record = EntityRecord {
                    identity: identity.clone(),
                    fields
                };
                (identity, record)
            })
            .collect();
    }
}
