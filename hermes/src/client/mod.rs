use std::sync::Arc;

mod builder;
mod r#impl;
mod observable;

use crate::{
    FetchPolicy, Link, Observable, QueryError, QueryOptions, QueryState, Response
};
pub use builder::ClientBuilder;
use hermes_normalized_cache::{QueryDocument, Snapshot, StoreError, Variables};
pub use observable::Subscription;
pub use r#impl::ClientImpl;
use serde_json::Value;

/// A GraphQL client. Cheap to clone, clones share the same cache, in-flight requests and
/// observers.
#[repr(transparent)]
pub struct Client<L: Link>(pub Arc<ClientImpl<L>>);

impl<L: Link> Clone for Client<L> {
    fn clone(&self) -> Self {
        Client(self.0.clone())
    }
}

impl<L: Link> Client<L> {
    pub fn builder(link: L) -> ClientBuilder<L> {
        ClientBuilder::new(link)
    }

    /// Run a query with the client's default fetch policy.
    ///
    /// Queries are de-duplicated: while one is in flight, identical queries (same document and
    /// variables) wait for its result instead of sending another request.
    pub async fn query(
        &self,
        document: &QueryDocument,
        variables: Variables
    ) -> Result<Response, QueryError> {
        self.0.query(document, variables).await
    }

    pub async fn query_with_options(
        &self,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> Result<Response, QueryError> {
        self.0.query_with_options(document, variables, options).await
    }

    /// Run a mutation. Mutations always go to the network and are never de-duplicated. The result
    /// is written to the cache and observers of any entity it changed are notified.
    pub async fn mutate(
        &self,
        document: &QueryDocument,
        variables: Variables
    ) -> Result<Response, QueryError> {
        self.0
            .mutate_with_options(document, variables, QueryOptions::default())
            .await
    }

    pub async fn mutate_with_options(
        &self,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> Result<Response, QueryError> {
        self.0.mutate_with_options(document, variables, options).await
    }

    /// Fetch a query from the network even if it's cached.
    pub async fn refetch(
        &self,
        document: &QueryDocument,
        variables: Variables
    ) -> Result<Response, QueryError> {
        let options = QueryOptions::default().with_fetch_policy(FetchPolicy::NetworkOnly);
        self.0.query_with_options(document, variables, options).await
    }

    /// Run a query and call `callback` with its result, then again every time the cached result
    /// changes.
    ///
    /// If the first fetch fails the callback gets the error, and the first write of the query's
    /// data to the cache brings it data after that.
    ///
    /// ```no_run
    /// # tokio_test::block_on(async {
    /// # use hermes::{Client, HttpLink, QueryDocument, Variables};
    /// # let client = Client::builder(HttpLink::new("http://localhost:8080/graphql".parse().unwrap())).build();
    /// let query = QueryDocument::parse("{ recipes { __typename id title } }").unwrap();
    /// let subscription = client
    ///     .subscribe(&query, Variables::new(), |result| println!("{:?}", result))
    ///     .await;
    /// // ...
    /// subscription.dispose();
    /// # });
    /// ```
    pub async fn subscribe<F>(
        &self,
        document: &QueryDocument,
        variables: Variables,
        callback: F
    ) -> Subscription
    where
        F: Fn(Result<Response, QueryError>) + Send + Sync + 'static
    {
        self.0
            .subscribe_with_options(document, variables, QueryOptions::default(), callback)
            .await
    }

    pub async fn subscribe_with_options<F>(
        &self,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions,
        callback: F
    ) -> Subscription
    where
        F: Fn(Result<Response, QueryError>) + Send + Sync + 'static
    {
        self.0
            .subscribe_with_options(document, variables, options, callback)
            .await
    }

    /// Like [`subscribe`](#method.subscribe), as a stream.
    pub async fn watch(&self, document: &QueryDocument, variables: Variables) -> Observable {
        self.0
            .watch_with_options(document, variables, QueryOptions::default())
            .await
    }

    pub async fn watch_with_options(
        &self,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> Observable {
        self.0
            .watch_with_options(document, variables, options)
            .await
    }

    pub fn query_state(&self, document: &QueryDocument, variables: &Variables) -> QueryState {
        self.0.query_state(document, variables)
    }

    /// Read a query from the cache only.
    pub fn read_query(&self, document: &QueryDocument, variables: &Variables) -> Option<Value> {
        self.0.read_query(document, variables)
    }

    /// Write data for a query straight to the cache, as if the server had returned it.
    pub fn write_query(
        &self,
        document: &QueryDocument,
        variables: &Variables,
        data: &Value
    ) -> Result<(), QueryError> {
        self.0.write_query(document, variables, data)
    }

    /// Update the cached data of a query. Returns whether anything was written.
    pub fn update_query<F>(
        &self,
        document: &QueryDocument,
        variables: &Variables,
        updater_fn: F
    ) -> Result<bool, QueryError>
    where
        F: FnOnce(Option<Value>) -> Option<Value>
    {
        self.0.update_query(document, variables, updater_fn)
    }

    /// Remove a single record from the cache. Queries that read it will miss, observers of it
    /// are refetched.
    pub fn evict(&self, identity: &str) -> Result<(), StoreError> {
        self.0.evict(identity)
    }

    /// Clear the cache and forget all query states. Observers are not notified.
    pub fn reset_store(&self) {
        self.0.reset_store()
    }

    pub fn extract(&self) -> Snapshot {
        self.0.extract()
    }

    pub fn restore(&self, snapshot: Snapshot) {
        self.0.restore(snapshot)
    }
}
