use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// Variable bindings for an operation.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// How records of one type are identified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePolicy {
    /// The fields that make up the identity of an object of this type.
    /// `None` uses the default `id` / `_id` keys, an empty list keeps objects of this type
    /// inline on their parent instead of normalizing them.
    #[serde(default, alias = "keyFields")]
    pub key_fields: Option<Vec<String>>
}

impl TypePolicy {
    /// Identify objects of this type by the given fields.
    ///
    /// ```
    /// # use hermes_normalized_cache::TypePolicy;
    /// let policy = TypePolicy::key_fields(&["isbn"]);
    /// assert_eq!(policy.key_fields, Some(vec!["isbn".to_string()]));
    /// ```
    pub fn key_fields(fields: &[&str]) -> Self {
        Self {
            key_fields: Some(fields.iter().map(|field| field.to_string()).collect())
        }
    }

    /// Never normalize objects of this type.
    pub fn embedded() -> Self {
        Self {
            key_fields: Some(Vec::new())
        }
    }
}

/// Options to pass to the normalized cache.
#[derive(Debug, Clone, Default)]
pub struct NormalizedCacheOptions {
    /// Identity rules by typename. Types without a policy are identified by `id`, then `_id`.
    pub type_policies: FnvHashMap<String, TypePolicy>
}

impl NormalizedCacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_policy<S: Into<String>>(mut self, typename: S, policy: TypePolicy) -> Self {
        self.type_policies.insert(typename.into(), policy);
        self
    }
}
