//! Query documents. A document is parsed once from GraphQL source and then used as the
//! template for both normalization and denormalization.

use crate::{error::DocumentError, types::Variables};
use graphql_parser::query::{
    self as gql, Definition, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
    TypeCondition
};
use serde_json::{Number, Value};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    num::Wrapping,
    str::FromStr,
    sync::Arc
};

/// The kind of operation a document contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription
}

impl OperationType {
    /// The identity of the root record this operation reads from and writes to.
    pub fn root_key(&self) -> &'static str {
        match self {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
            OperationType::Subscription => "Subscription"
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_key())
    }
}

/// An argument value as written in the document. Variables stay unresolved until a request
/// provides them.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Variable(String),
    Value(Value),
    List(Vec<Argument>),
    Object(BTreeMap<String, Argument>)
}

impl Argument {
    /// Resolve the argument against a set of variables. Unbound variables resolve to `null`.
    pub fn resolve(&self, variables: &Variables) -> Value {
        match self {
            Argument::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
            Argument::Value(value) => value.clone(),
            Argument::List(items) => {
                Value::Array(items.iter().map(|item| item.resolve(variables)).collect())
            }
            Argument::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.resolve(variables)))
                    .collect()
            )
        }
    }
}

impl From<&gql::Value> for Argument {
    fn from(value: &gql::Value) -> Self {
        match value {
            gql::Value::Variable(name) => Argument::Variable(name.clone()),
            gql::Value::Int(number) => {
                Argument::Value(number.as_i64().map(Value::from).unwrap_or(Value::Null))
            }
            gql::Value::Float(float) => Argument::Value(
                Number::from_f64(*float)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            ),
            gql::Value::String(string) => Argument::Value(Value::String(string.clone())),
            gql::Value::Boolean(boolean) => Argument::Value(Value::Bool(*boolean)),
            gql::Value::Null => Argument::Value(Value::Null),
            gql::Value::Enum(name) => Argument::Value(Value::String(name.clone())),
            gql::Value::List(items) => Argument::List(items.iter().map(Argument::from).collect()),
            gql::Value::Object(fields) => Argument::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Argument::from(value)))
                    .collect()
            )
        }
    }
}

/// A `@skip` or `@include` directive attached to a field or fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Skip(Argument),
    Include(Argument)
}

fn is_included(conditions: &[Condition], variables: &Variables) -> bool {
    conditions.iter().all(|condition| match condition {
        Condition::Skip(arg) => arg.resolve(variables) != Value::Bool(true),
        Condition::Include(arg) => arg.resolve(variables) == Value::Bool(true)
    })
}

/// A single selected field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: BTreeMap<String, Argument>,
    pub conditions: Vec<Condition>
}

impl Field {
    /// The key this field has in a response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The key this field is stored under in an entity record. Arguments are part of the key,
    /// aliases are not.
    pub fn storage_key(&self, variables: &Variables) -> String {
        if self.arguments.is_empty() {
            return self.name.clone();
        }

        let args: serde_json::Map<String, Value> = self
            .arguments
            .iter()
            .map(|(name, arg)| (name.clone(), arg.resolve(variables)))
            .collect();
        let args = Value::Object(args).to_string();

        let mut key = String::with_capacity(self.name.len() + args.len() + 2);
        key.push_str(&self.name);
        key.push('(');
        key.push_str(&args);
        key.push(')');
        key
    }

    pub fn is_included(&self, variables: &Variables) -> bool {
        is_included(&self.conditions, variables)
    }
}

/// An inline fragment or an expanded fragment spread.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub type_condition: Option<String>,
    pub conditions: Vec<Condition>,
    pub selection: Vec<FieldSelector>
}

impl Fragment {
    /// Whether the fragment applies to an object of the given type. Objects of unknown type
    /// match every fragment.
    pub fn applies_to(&self, typename: Option<&str>) -> bool {
        match (&self.type_condition, typename) {
            (Some(condition), Some(typename)) => condition == typename,
            _ => true
        }
    }

    pub fn is_included(&self, variables: &Variables) -> bool {
        is_included(&self.conditions, variables)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldSelector {
    /// A leaf field. Its value is stored as-is, whatever JSON it contains.
    Scalar(Field),
    /// A field with a sub-selection
    Object(Field, Vec<FieldSelector>),
    Fragment(Fragment)
}

struct DocumentInner {
    source: String,
    operation_name: Option<String>,
    operation_type: OperationType,
    selection: Vec<FieldSelector>,
    key: u64
}

/// An immutable, parsed GraphQL operation. Cheap to clone.
#[derive(Clone)]
pub struct QueryDocument {
    inner: Arc<DocumentInner>
}

impl QueryDocument {
    /// Parse a document containing exactly one operation.
    ///
    /// ```
    /// # use hermes_normalized_cache::{OperationType, QueryDocument};
    /// let document = QueryDocument::parse("query Recipes { recipes { id title } }").unwrap();
    /// assert_eq!(document.operation_type(), OperationType::Query);
    /// assert_eq!(document.operation_name(), Some("Recipes"));
    /// ```
    pub fn parse<S: Into<String>>(source: S) -> Result<Self, DocumentError> {
        Self::parse_inner(source.into(), None)
    }

    /// Parse a document and select the operation with the given name.
    pub fn parse_operation<S: Into<String>>(
        source: S,
        operation_name: &str
    ) -> Result<Self, DocumentError> {
        Self::parse_inner(source.into(), Some(operation_name))
    }

    fn parse_inner(source: String, operation_name: Option<&str>) -> Result<Self, DocumentError> {
        let document =
            graphql_parser::parse_query(&source).map_err(|e| DocumentError::Parse(e.to_string()))?;

        let mut fragments = HashMap::new();
        let mut operations = Vec::new();
        for definition in &document.definitions {
            match definition {
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
                Definition::Operation(operation) => operations.push(operation)
            }
        }

        let operation = match operation_name {
            Some(name) => operations
                .into_iter()
                .find(|op| operation_name_of(op) == Some(name))
                .ok_or_else(|| DocumentError::UnknownOperation(name.to_string()))?,
            None => match operations.len() {
                0 => return Err(DocumentError::NoOperation),
                1 => operations[0],
                n => return Err(DocumentError::AmbiguousOperation(n))
            }
        };

        let (operation_type, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => (OperationType::Query, set),
            OperationDefinition::Query(query) => (OperationType::Query, &query.selection_set),
            OperationDefinition::Mutation(mutation) => {
                (OperationType::Mutation, &mutation.selection_set)
            }
            OperationDefinition::Subscription(subscription) => {
                (OperationType::Subscription, &subscription.selection_set)
            }
        };
        let operation_name = operation_name_of(operation).map(ToString::to_string);

        let builder = SelectionBuilder {
            fragments: &fragments
        };
        let selection = builder.build(selection_set, &mut Vec::new())?;
        let key = match &operation_name {
            Some(name) => hash(&[source.as_bytes(), &b"#"[..], name.as_bytes()]),
            None => hash(&[source.as_bytes()])
        };

        Ok(QueryDocument {
            inner: Arc::new(DocumentInner {
                source,
                operation_name,
                operation_type,
                selection,
                key
            })
        })
    }

    /// The source text, sent over the wire unchanged.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.inner.operation_name.as_deref()
    }

    pub fn operation_type(&self) -> OperationType {
        self.inner.operation_type
    }

    pub fn selection(&self) -> &[FieldSelector] {
        &self.inner.selection
    }

    /// A stable hash of the source text and selected operation name.
    pub fn key(&self) -> u64 {
        self.inner.key
    }
}

impl FromStr for QueryDocument {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryDocument::parse(s)
    }
}

impl PartialEq for QueryDocument {
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key && self.inner.source == other.inner.source
    }
}

impl fmt::Debug for QueryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDocument")
            .field("operation_type", &self.inner.operation_type)
            .field("operation_name", &self.inner.operation_name)
            .field("key", &self.inner.key)
            .finish()
    }
}

fn operation_name_of(operation: &OperationDefinition) -> Option<&str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref()
    }
}

fn conditions(directives: &[gql::Directive]) -> Vec<Condition> {
    directives
        .iter()
        .filter_map(|directive| {
            let arg = directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .map(|(_, value)| Argument::from(value))?;
            match directive.name.as_str() {
                "skip" => Some(Condition::Skip(arg)),
                "include" => Some(Condition::Include(arg)),
                _ => None
            }
        })
        .collect()
}

/// Turns a parsed selection set into `FieldSelector`s, expanding fragment spreads in place.
struct SelectionBuilder<'d> {
    fragments: &'d HashMap<&'d str, &'d FragmentDefinition>
}

impl<'d> SelectionBuilder<'d> {
    fn build(
        &self,
        set: &'d SelectionSet,
        expanding: &mut Vec<&'d str>
    ) -> Result<Vec<FieldSelector>, DocumentError> {
        let mut selection = Vec::with_capacity(set.items.len());
        for item in &set.items {
            let selector = match item {
                Selection::Field(field) => {
                    let arguments = field
                        .arguments
                        .iter()
                        .map(|(name, value)| (name.clone(), Argument::from(value)))
                        .collect();
                    let selected = Field {
                        name: field.name.clone(),
                        alias: field.alias.clone(),
                        arguments,
                        conditions: conditions(&field.directives)
                    };
                    if field.selection_set.items.is_empty() {
                        FieldSelector::Scalar(selected)
                    } else {
                        FieldSelector::Object(
                            selected,
                            self.build(&field.selection_set, expanding)?
                        )
                    }
                }
                Selection::InlineFragment(fragment) => FieldSelector::Fragment(Fragment {
                    type_condition: fragment
                        .type_condition
                        .as_ref()
                        .map(|TypeCondition::On(name)| name.clone()),
                    conditions: conditions(&fragment.directives),
                    selection: self.build(&fragment.selection_set, expanding)?
                }),
                Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name.as_str();
                    if expanding.contains(&name) {
                        return Err(DocumentError::CyclicFragment(name.to_string()));
                    }
                    let definition: &'d FragmentDefinition = self
                        .fragments
                        .get(name)
                        .copied()
                        .ok_or_else(|| DocumentError::UnknownFragment(name.to_string()))?;
                    let TypeCondition::On(type_condition) = &definition.type_condition;

                    expanding.push(name);
                    let inner = self.build(&definition.selection_set, expanding)?;
                    expanding.pop();

                    FieldSelector::Fragment(Fragment {
                        type_condition: Some(type_condition.clone()),
                        conditions: conditions(&spread.directives),
                        selection: inner
                    })
                }
            };
            selection.push(selector);
        }
        Ok(selection)
    }
}

/// djb2 over the document source
fn hash(parts: &[&[u8]]) -> u64 {
    let mut h = Wrapping(5381u64);
    for byte in parts.iter().flat_map(|part| part.iter()) {
        h = (h << 5) + h + Wrapping(*byte as u64)
    }
    h.0
}
