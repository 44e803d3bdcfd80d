use std::fmt;
use thiserror::Error;

/// An error while parsing a query document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("parsing error: {0}")]
    Parse(String),
    #[error("document contains no operation")]
    NoOperation,
    #[error("document contains {0} operations, an operation name is required")]
    AmbiguousOperation(usize),
    #[error("no operation named `{0}` in document")]
    UnknownOperation(String),
    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),
    #[error("fragment `{0}` spreads itself")]
    CyclicFragment(String)
}

/// One step into a response.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize)
}

/// Where in a response an error happened, e.g. `recipes.0.author`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePath(pub Vec<PathSegment>);

impl ResponsePath {
    pub(crate) fn push_key(&mut self, key: &str) {
        self.0.push(PathSegment::Key(key.to_string()));
    }

    pub(crate) fn push_index(&mut self, index: usize) {
        self.0.push(PathSegment::Index(index));
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    pub(crate) fn with_key(&self, key: &str) -> ResponsePath {
        let mut path = self.clone();
        path.push_key(key);
        path
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<data>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(key) => f.write_str(key)?,
                PathSegment::Index(index) => write!(f, "{}", index)?
            }
        }
        Ok(())
    }
}

/// The response doesn't have the shape the document asked for. Nothing from the response is
/// written when this is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("missing field `{path}` in response")]
    MissingField { path: ResponsePath },
    #[error("expected an object at `{path}`, found {found}")]
    ExpectedObject {
        path: ResponsePath,
        found: &'static str
    }
}

/// A document can't be served from the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheMiss {
    #[error("no record for `{0}`")]
    Record(String),
    #[error("missing field `{field}` on `{identity}`")]
    Field { identity: String, field: String }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no record for `{0}`")]
    UnknownIdentity(String)
}
