use crate::{
    document::{FieldSelector, QueryDocument},
    error::CacheMiss,
    store::data::{typename_of, CacheStore, Fields, StoreValue},
    types::Variables
};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Rebuilds a response from the store. Any missing piece fails the whole read.
pub(crate) struct Denormalizer<'a> {
    data: &'a CacheStore,
    variables: &'a Variables,
    dependencies: HashSet<String>
}

impl<'a> Denormalizer<'a> {
    pub(crate) fn new(data: &'a CacheStore, variables: &'a Variables) -> Self {
        Self {
            data,
            variables,
            dependencies: HashSet::new()
        }
    }

    /// Returns the data along with every identity that was read to produce it.
    pub(crate) fn denormalize(
        mut self,
        document: &QueryDocument
    ) -> Result<(Value, HashSet<String>), CacheMiss> {
        let root_key = document.operation_type().root_key();
        let root = self.record(root_key)?;
        let data = self.read_selection(document.selection(), root, root_key, Some(root_key))?;
        Ok((Value::Object(data), self.dependencies))
    }

    fn record(&mut self, identity: &str) -> Result<&'a Fields, CacheMiss> {
        self.dependencies.insert(identity.to_string());
        let data = self.data;
        data.read(identity)
            .map(|record| record.fields())
            .ok_or_else(|| CacheMiss::Record(identity.to_string()))
    }

    fn read_selection(
        &mut self,
        selection: &[FieldSelector],
        fields: &'a Fields,
        owner: &str,
        typename: Option<&str>
    ) -> Result<Map<String, Value>, CacheMiss> {
        let mut out = Map::new();
        self.read_into(selection, fields, owner, typename, &mut out)?;
        Ok(out)
    }

    fn read_into(
        &mut self,
        selection: &[FieldSelector],
        fields: &'a Fields,
        owner: &str,
        typename: Option<&str>,
        out: &mut Map<String, Value>
    ) -> Result<(), CacheMiss> {
        for selector in selection {
            match selector {
                FieldSelector::Scalar(field) => {
                    if !field.is_included(self.variables) {
                        continue;
                    }
                    let key = field.storage_key(self.variables);
                    match fields.get(&key) {
                        Some(StoreValue::Scalar(value)) => {
                            out.insert(field.response_key().to_string(), value.clone());
                        }
                        _ => return Err(missing(owner, key))
                    }
                }
                FieldSelector::Object(field, inner) => {
                    if !field.is_included(self.variables) {
                        continue;
                    }
                    let key = field.storage_key(self.variables);
                    let value = fields.get(&key).ok_or_else(|| missing(owner, key.clone()))?;
                    let value = self.read_value(inner, value, owner, &key)?;
                    merge_repeated_key(out, field.response_key().to_string(), value);
                }
                FieldSelector::Fragment(fragment) => {
                    if fragment.is_included(self.variables) && fragment.applies_to(typename) {
                        self.read_into(&fragment.selection, fields, owner, typename, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_value(
        &mut self,
        selection: &[FieldSelector],
        value: &'a StoreValue,
        owner: &str,
        key: &str
    ) -> Result<Value, CacheMiss> {
        match value {
            StoreValue::Scalar(Value::Null) => Ok(Value::Null),
            // A leaf where the document expects an object can't satisfy the selection
            StoreValue::Scalar(_) => Err(missing(owner, key.to_string())),
            StoreValue::Ref(identity) => {
                let record = self.record(identity)?;
                let object =
                    self.read_selection(selection, record, identity, typename_of(record))?;
                Ok(Value::Object(object))
            }
            StoreValue::List(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(self.read_value(selection, item, owner, key)?);
                }
                Ok(Value::Array(list))
            }
            StoreValue::Object(inline) => {
                let object = self.read_selection(selection, inline, owner, typename_of(inline))?;
                Ok(Value::Object(object))
            }
        }
    }
}

/// Sub-selections of a field selected more than once end up in one output object.
fn merge_repeated_key(out: &mut Map<String, Value>, key: String, incoming: Value) {
    let merged = match out.remove(&key) {
        Some(existing) => merge_repeated(existing, incoming),
        None => incoming
    };
    out.insert(key, merged);
}

fn merge_repeated(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                merge_repeated_key(&mut existing, key, value);
            }
            Value::Object(existing)
        }
        (Value::Array(existing), Value::Array(incoming)) if existing.len() == incoming.len() => {
            Value::Array(
                existing
                    .into_iter()
                    .zip(incoming)
                    .map(|(existing, incoming)| merge_repeated(existing, incoming))
                    .collect()
            )
        }
        (_, incoming) => incoming
    }
}

fn missing(identity: &str, field: String) -> CacheMiss {
    CacheMiss::Field {
        identity: identity.to_string(),
        field
    }
}
