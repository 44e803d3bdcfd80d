use crate::{
    document::{FieldSelector, QueryDocument},
    error::{NormalizationError, ResponsePath},
    store::{
        data::{merge_fields, Fields, StoreValue},
        Store
    },
    types::Variables
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Records produced by normalizing one response, not yet applied to a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    records: BTreeMap<String, Fields>
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add fields for an identity, merging with anything already in the batch.
    pub fn merge(&mut self, identity: String, fields: Fields) {
        let target = self.records.entry(identity).or_insert_with(Fields::new);
        merge_fields(target, fields);
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn into_records(self) -> impl Iterator<Item = (String, Fields)> {
        self.records.into_iter()
    }
}

/// A field selected more than once at the same level is written once with every selection
/// merged, down through inline objects and lists of them.
fn merge_repeated_field(fields: &mut Fields, key: String, incoming: StoreValue) {
    let merged = match fields.remove(&key) {
        Some(existing) => merge_repeated(existing, incoming),
        None => incoming
    };
    fields.insert(key, merged);
}

fn merge_repeated(existing: StoreValue, incoming: StoreValue) -> StoreValue {
    match (existing, incoming) {
        (StoreValue::Object(mut existing), StoreValue::Object(incoming)) => {
            for (key, value) in incoming {
                merge_repeated_field(&mut existing, key, value);
            }
            StoreValue::Object(existing)
        }
        (StoreValue::List(existing), StoreValue::List(incoming))
            if existing.len() == incoming.len() =>
        {
            StoreValue::List(
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

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object"
    }
}

/// Walks a response guided by a document's selection and splits it into records.
pub(crate) struct Normalizer<'a> {
    store: &'a Store,
    variables: &'a Variables,
    batch: WriteBatch,
    path: ResponsePath
}

impl<'a> Normalizer<'a> {
    pub(crate) fn new(store: &'a Store, variables: &'a Variables) -> Self {
        Self {
            store,
            variables,
            batch: WriteBatch::new(),
            path: ResponsePath::default()
        }
    }

    pub(crate) fn normalize(
        mut self,
        document: &QueryDocument,
        data: &Value
    ) -> Result<WriteBatch, NormalizationError> {
        let root_key = document.operation_type().root_key();
        let object = data
            .as_object()
            .ok_or_else(|| NormalizationError::ExpectedObject {
                path: ResponsePath::default(),
                found: json_type(data)
            })?;

        let fields = self.write_selection(document.selection(), object, Some(root_key))?;
        self.batch.merge(root_key.to_string(), fields);
        Ok(self.batch)
    }

    fn field_value<'v>(
        &self,
        object: &'v Map<String, Value>,
        response_key: &str
    ) -> Result<&'v Value, NormalizationError> {
        object
            .get(response_key)
            .ok_or_else(|| NormalizationError::MissingField {
                path: self.path.with_key(response_key)
            })
    }

    fn write_selection(
        &mut self,
        selection: &[FieldSelector],
        object: &Map<String, Value>,
        typename: Option<&str>
    ) -> Result<Fields, NormalizationError> {
        let mut fields = Fields::new();
        for selector in selection {
            match selector {
                FieldSelector::Scalar(field) => {
                    if !field.is_included(self.variables) {
                        continue;
                    }
                    let value = self.field_value(object, field.response_key())?;
                    merge_repeated_field(
                        &mut fields,
                        field.storage_key(self.variables),
                        StoreValue::Scalar(value.clone())
                    );
                }
                FieldSelector::Object(field, inner) => {
                    if !field.is_included(self.variables) {
                        continue;
                    }
                    let value = self.field_value(object, field.response_key())?;
                    self.path.push_key(field.response_key());
                    let stored = self.write_value(inner, value)?;
                    self.path.pop();
                    merge_repeated_field(&mut fields, field.storage_key(self.variables), stored);
                }
                FieldSelector::Fragment(fragment) => {
                    if !fragment.is_included(self.variables) || !fragment.applies_to(typename) {
                        continue;
                    }
                    let inner = self.write_selection(&fragment.selection, object, typename)?;
                    for (key, value) in inner {
                        merge_repeated_field(&mut fields, key, value);
                    }
                }
            }
        }
        Ok(fields)
    }

    fn write_value(
        &mut self,
        selection: &[FieldSelector],
        value: &Value
    ) -> Result<StoreValue, NormalizationError> {
        match value {
            Value::Null => Ok(StoreValue::Scalar(Value::Null)),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push_index(index);
                    list.push(self.write_value(selection, item)?);
                    self.path.pop();
                }
                Ok(StoreValue::List(list))
            }
            Value::Object(object) => {
                let typename = object.get("__typename").and_then(Value::as_str);
                let fields = self.write_selection(selection, object, typename)?;
                let identity =
                    typename.and_then(|typename| self.store.key_of_entity(typename, object));
                match identity {
                    Some(identity) => {
                        self.batch.merge(identity.clone(), fields);
                        Ok(StoreValue::Ref(identity))
                    }
                    None => Ok(StoreValue::Object(fields))
                }
            }
            other => Err(NormalizationError::ExpectedObject {
                path: self.path.clone(),
                found: json_type(other)
            })
        }
    }
}
