use crate::{
    document::QueryDocument,
    error::{CacheMiss, NormalizationError, StoreError},
    store::{
        data::{CacheStore, EntityRecord, Snapshot},
        denormalizer::Denormalizer,
        normalizer::{Normalizer, WriteBatch}
    },
    types::{NormalizedCacheOptions, Variables}
};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub fn is_root(typename: &str) -> bool {
    typename == "Query" || typename == "Mutation" || typename == "Subscription"
}

#[inline]
fn entity_key(typename: &str, key: &str) -> String {
    let mut s = String::with_capacity(typename.len() + key.len() + 1);
    s.push_str(typename);
    s.push(':');
    s.push_str(key);
    s
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None
    }
}

/// What applying a write batch did to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    /// Every identity the batch wrote to
    pub touched: HashSet<String>,
    /// Identities with at least one field whose value changed
    pub changed: HashSet<String>
}

/// The normalized store: records plus the rules used to identify them.
pub struct Store {
    data: CacheStore,
    options: NormalizedCacheOptions
}

impl Default for Store {
    fn default() -> Self {
        Self::new(NormalizedCacheOptions::default())
    }
}

impl Store {
    pub fn new(options: NormalizedCacheOptions) -> Self {
        Self {
            data: CacheStore::new(),
            options
        }
    }

    pub fn data(&self) -> &CacheStore {
        &self.data
    }

    /// The identity of an entity, or `None` if it should stay inline on its parent.
    ///
    /// ```
    /// # use hermes_normalized_cache::Store;
    /// # use serde_json::json;
    /// let store = Store::default();
    /// let entity = json!({ "__typename": "Recipe", "id": "1" });
    /// let key = store.key_of_entity("Recipe", entity.as_object().unwrap());
    /// assert_eq!(key.as_deref(), Some("Recipe:1"));
    /// ```
    pub fn key_of_entity(&self, typename: &str, entity: &Map<String, Value>) -> Option<String> {
        if is_root(typename) {
            return Some(typename.to_string());
        }

        let key_fields = self
            .options
            .type_policies
            .get(typename)
            .and_then(|policy| policy.key_fields.as_ref());

        match key_fields {
            None => entity
                .get("id")
                .or_else(|| entity.get("_id"))
                .and_then(id_string)
                .map(|id| entity_key(typename, &id)),
            Some(fields) if fields.is_empty() => None,
            Some(fields) if fields.len() == 1 => entity
                .get(&fields[0])
                .and_then(id_string)
                .map(|id| entity_key(typename, &id)),
            Some(fields) => {
                let mut sorted: Vec<&String> = fields.iter().collect();
                sorted.sort();
                let mut key = Map::new();
                for field in sorted {
                    let value = entity.get(field)?;
                    if value.is_null() {
                        return None;
                    }
                    key.insert(field.clone(), value.clone());
                }
                Some(entity_key(typename, &Value::Object(key).to_string()))
            }
        }
    }

    /// Split a response into records without touching the store.
    pub fn normalize(
        &self,
        document: &QueryDocument,
        variables: &Variables,
        data: &Value
    ) -> Result<WriteBatch, NormalizationError> {
        Normalizer::new(self, variables).normalize(document, data)
    }

    /// Apply a batch in full.
    pub fn apply(&mut self, batch: WriteBatch) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        for (identity, fields) in batch.into_records() {
            let changed = self.data.write(&identity, fields);
            if !changed.is_empty() {
                outcome.changed.insert(identity.clone());
            }
            outcome.touched.insert(identity);
        }
        tracing::trace!(
            touched = outcome.touched.len(),
            changed = outcome.changed.len(),
            "applied write batch"
        );
        outcome
    }

    /// Normalize a response and write it. On error nothing is written.
    pub fn write_query(
        &mut self,
        document: &QueryDocument,
        variables: &Variables,
        data: &Value
    ) -> Result<WriteOutcome, NormalizationError> {
        let batch = self.normalize(document, variables, data)?;
        Ok(self.apply(batch))
    }

    pub fn read_query(
        &self,
        document: &QueryDocument,
        variables: &Variables
    ) -> Result<Value, CacheMiss> {
        self.read_query_with_dependencies(document, variables)
            .map(|(data, _)| data)
    }

    /// Read a query along with the identities it depends on.
    pub fn read_query_with_dependencies(
        &self,
        document: &QueryDocument,
        variables: &Variables
    ) -> Result<(Value, HashSet<String>), CacheMiss> {
        Denormalizer::new(&self.data, variables).denormalize(document)
    }

    /// Run a custom update against the cached result of a query.
    ///
    /// `updater_fn` receives the current data (`None` if it can't be read) and returns the new
    /// data to write, or `None` to leave the store as it is.
    pub fn update_query<F>(
        &mut self,
        document: &QueryDocument,
        variables: &Variables,
        updater_fn: F
    ) -> Result<Option<WriteOutcome>, NormalizationError>
    where
        F: FnOnce(Option<Value>) -> Option<Value>
    {
        let current = self.read_query(document, variables).ok();
        match updater_fn(current) {
            Some(updated) => self.write_query(document, variables, &updated).map(Some),
            None => Ok(None)
        }
    }

    pub fn evict(&mut self, identity: &str) -> Result<EntityRecord, StoreError> {
        self.data.evict(identity)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn extract(&self) -> Snapshot {
        self.data.extract()
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.data.restore(snapshot);
    }
}
