use crate::{
    client::observable::{Observer, Observers},
    types::{Operation, OperationKey},
    utils::progressive_hash,
    DebugInfo, FetchPolicy, Link, QueryError, QueryOptions, QueryState, Request, Response
};
use futures::channel::oneshot;
use hermes_normalized_cache::{
    OperationType, QueryDocument, Snapshot, Store, StoreError, Variables, WriteBatch
};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use stable_vec::StableVec;
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc
};

pub type FetchResult = Result<Response, QueryError>;

/// A change to the store. Every change goes through the commit queue so observers are notified
/// once per change, after it was applied in full.
pub(crate) enum Commit {
    Write(WriteBatch),
    Evict(String),
    Clear,
    Restore(Snapshot)
}

#[derive(Default)]
pub(crate) struct CommitQueue {
    queue: VecDeque<Commit>,
    /// Set while a thread is applying commits and notifying observers. Commits made during that
    /// time, including from observer callbacks, are queued and applied afterwards.
    flushing: bool
}

pub(crate) fn operation_key(document: &QueryDocument, variables: &Variables) -> OperationKey {
    OperationKey::new(progressive_hash(document.key(), variables), document, variables)
}

pub struct ClientImpl<L: Link> {
    pub(crate) link: L,
    pub(crate) fetch_policy: FetchPolicy,
    pub(crate) store: Mutex<Store>,
    pub(crate) states: Mutex<HashMap<OperationKey, QueryState>>,
    pub(crate) in_flight: Mutex<HashMap<OperationKey, Vec<oneshot::Sender<FetchResult>>>>,
    pub(crate) observers: Observers,
    pub(crate) commits: ReentrantMutex<RefCell<CommitQueue>>
}

impl<L: Link> ClientImpl<L> {
    pub(crate) fn new(link: L, fetch_policy: FetchPolicy, store: Store) -> Self {
        ClientImpl {
            link,
            fetch_policy,
            store: Mutex::new(store),
            states: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            observers: Arc::new(Mutex::new(StableVec::new())),
            commits: ReentrantMutex::new(RefCell::new(CommitQueue::default()))
        }
    }

    pub(crate) fn create_operation(
        &self,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> Operation {
        Operation {
            key: operation_key(document, &variables),
            document: document.clone(),
            variables,
            options
        }
    }

    pub fn query_state(&self, document: &QueryDocument, variables: &Variables) -> QueryState {
        let key = operation_key(document, variables);
        self.states.lock().get(&key).cloned().unwrap_or_default()
    }

    fn set_state(&self, key: OperationKey, state: QueryState) {
        tracing::trace!(%key, ?state, "query state changed");
        self.states.lock().insert(key, state);
    }

    fn begin_fetch(&self, key: &OperationKey) {
        let mut states = self.states.lock();
        let state = match states.get(key) {
            Some(QueryState::Resolved) | Some(QueryState::Refetching) => QueryState::Refetching,
            _ => QueryState::Fetching
        };
        tracing::trace!(%key, ?state, "query state changed");
        states.insert(key.clone(), state);
    }

    pub async fn query(self: &Arc<Self>, document: &QueryDocument, variables: Variables) -> FetchResult {
        self.query_with_options(document, variables, QueryOptions::default())
            .await
    }

    pub async fn query_with_options(
        self: &Arc<Self>,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> FetchResult {
        if document.operation_type() == OperationType::Mutation {
            return self.mutate_with_options(document, variables, options).await;
        }

        let operation = self.create_operation(document, variables, options);
        let fetch_policy = operation.options.fetch_policy.unwrap_or(self.fetch_policy);
        if fetch_policy == FetchPolicy::CacheFirst {
            if let Some(response) = self.read_cached(&operation) {
                return Ok(response);
            }
        }
        self.fetch(operation, true).await
    }

    pub async fn mutate_with_options(
        self: &Arc<Self>,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> FetchResult {
        let operation = self.create_operation(document, variables, options);
        self.fetch(operation, false).await
    }

    fn read_cached(&self, operation: &Operation) -> Option<Response> {
        let read = self
            .store
            .lock()
            .read_query(&operation.document, &operation.variables);
        match read {
            Ok(data) => {
                tracing::debug!(key = %operation.key, "cache hit");
                let mut states = self.states.lock();
                let state = states.entry(operation.key.clone()).or_default();
                if !state.is_in_flight() {
                    *state = QueryState::Resolved;
                }
                Some(Response {
                    debug_info: Some(DebugInfo::cache()),
                    data: Some(data),
                    errors: None
                })
            }
            Err(miss) => {
                tracing::debug!(key = %operation.key, %miss, "cache miss");
                None
            }
        }
    }

    /// Run an operation over the link in a separate task. With `dedup`, callers running the same
    /// operation while it's in flight wait for the same result instead of sending a new request.
    ///
    /// The task runs to completion even if every caller goes away, so the response still ends up
    /// in the cache.
    pub(crate) async fn fetch(self: &Arc<Self>, operation: Operation, dedup: bool) -> FetchResult {
        let key = operation.key.clone();
        let (sender, receiver) = oneshot::channel();
        let mut own_sender = Some(sender);

        let is_leader = if dedup {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get_mut(&key) {
                Some(waiting) => {
                    tracing::debug!(%key, "joining in-flight request");
                    waiting.extend(own_sender.take());
                    false
                }
                None => {
                    in_flight.insert(key.clone(), own_sender.take().into_iter().collect());
                    true
                }
            }
        } else {
            true
        };

        if is_leader {
            self.begin_fetch(&key);
            let client = self.clone();
            tokio::spawn(async move {
                let result = client.execute(&operation).await;
                client.set_state(
                    key.clone(),
                    match &result {
                        Ok(_) => QueryState::Resolved,
                        Err(e) => QueryState::Failed(e.clone())
                    }
                );

                match own_sender {
                    Some(sender) => {
                        let _ = sender.send(result);
                    }
                    None => {
                        let waiting = client.in_flight.lock().remove(&key).unwrap_or_default();
                        for (i, sender) in waiting.into_iter().enumerate() {
                            let _ = sender.send(with_dedup(result.clone(), i > 0));
                        }
                    }
                }
            });
        }

        receiver.await.unwrap_or(Err(QueryError::Cancelled))
    }

    async fn execute(self: &Arc<Self>, operation: &Operation) -> FetchResult {
        let headers = operation
            .options
            .extra_headers
            .as_ref()
            .map(|header_fn| header_fn())
            .unwrap_or_default();
        let request =
            Request::new(&operation.document, operation.variables.clone()).with_headers(headers);

        let response = match self.link.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(key = %operation.key, error = %e, "transport failed");
                return Err(e.into());
            }
        };

        let data = match response.data {
            Some(ref data) if !data.is_null() => data.clone(),
            _ if response.has_errors() => {
                return Err(QueryError::GraphQL(response.errors.unwrap_or_default()));
            }
            _ => {
                return Ok(Response {
                    debug_info: Some(DebugInfo::network(false)),
                    data: None,
                    errors: response.errors
                })
            }
        };

        let batch = self
            .store
            .lock()
            .normalize(&operation.document, &operation.variables, &data);
        let batch = batch.map_err(|e| {
            tracing::warn!(key = %operation.key, error = %e, "failed to normalize response");
            QueryError::from(e)
        })?;
        self.commit(Commit::Write(batch));

        // Read back so the result reflects everything the store knows about these entities
        let read = self
            .store
            .lock()
            .read_query(&operation.document, &operation.variables);
        Ok(Response {
            debug_info: Some(DebugInfo::network(false)),
            data: Some(read.unwrap_or(data)),
            errors: response.errors
        })
    }

    pub fn read_query(&self, document: &QueryDocument, variables: &Variables) -> Option<Value> {
        self.store.lock().read_query(document, variables).ok()
    }

    pub fn write_query(
        self: &Arc<Self>,
        document: &QueryDocument,
        variables: &Variables,
        data: &Value
    ) -> Result<(), QueryError> {
        let batch = self.store.lock().normalize(document, variables, data)?;
        self.commit(Commit::Write(batch));
        Ok(())
    }

    pub fn update_query<F>(
        self: &Arc<Self>,
        document: &QueryDocument,
        variables: &Variables,
        updater_fn: F
    ) -> Result<bool, QueryError>
    where
        F: FnOnce(Option<Value>) -> Option<Value>
    {
        let current = self.read_query(document, variables);
        match updater_fn(current) {
            Some(updated) => self.write_query(document, variables, &updated).map(|_| true),
            None => Ok(false)
        }
    }

    pub fn evict(self: &Arc<Self>, identity: &str) -> Result<(), StoreError> {
        if !self.store.lock().data().contains(identity) {
            return Err(StoreError::UnknownIdentity(identity.to_string()));
        }
        self.commit(Commit::Evict(identity.to_string()));
        Ok(())
    }

    pub fn reset_store(self: &Arc<Self>) {
        self.commit(Commit::Clear);
        self.states.lock().clear();
    }

    pub fn extract(&self) -> Snapshot {
        self.store.lock().extract()
    }

    pub fn restore(self: &Arc<Self>, snapshot: Snapshot) {
        self.commit(Commit::Restore(snapshot));
    }

    pub(crate) fn commit(self: &Arc<Self>, commit: Commit) {
        let commits = self.commits.lock();
        {
            let mut pending = commits.borrow_mut();
            pending.queue.push_back(commit);
            if pending.flushing {
                tracing::trace!(queued = pending.queue.len(), "deferred commit");
                return;
            }
            pending.flushing = true;
        }
        self.flush(&commits);
    }

    /// Deliver a result to one observer as its own notification round.
    pub(crate) fn deliver(self: &Arc<Self>, observer: &Observer, result: FetchResult) {
        let commits = self.commits.lock();
        let nested = {
            let mut pending = commits.borrow_mut();
            let nested = pending.flushing;
            pending.flushing = true;
            nested
        };
        observer.notify(result);
        if !nested {
            self.flush(&commits);
        }
    }

    fn flush(self: &Arc<Self>, commits: &RefCell<CommitQueue>) {
        loop {
            let next = {
                let mut pending = commits.borrow_mut();
                let next = pending.queue.pop_front();
                if next.is_none() {
                    pending.flushing = false;
                }
                next
            };
            match next {
                Some(commit) => {
                    let changed = self.apply(commit);
                    self.broadcast(&changed);
                }
                None => break
            }
        }
    }

    /// Apply a commit and return the identities it changed.
    fn apply(&self, commit: Commit) -> HashSet<String> {
        let mut store = self.store.lock();
        match commit {
            Commit::Write(batch) => store.apply(batch).changed,
            Commit::Evict(identity) => match store.evict(&identity) {
                Ok(_) => {
                    tracing::debug!(%identity, "evicted record");
                    std::iter::once(identity).collect()
                }
                Err(_) => HashSet::new()
            },
            // Observers aren't told about a reset
            Commit::Clear => {
                store.clear();
                tracing::debug!("store reset");
                HashSet::new()
            }
            Commit::Restore(snapshot) => {
                let mut changed: HashSet<String> =
                    store.data().identities().map(ToString::to_string).collect();
                changed.extend(snapshot.records.keys().cloned());
                store.restore(snapshot);
                changed
            }
        }
    }
}

fn with_dedup(result: FetchResult, did_dedup: bool) -> FetchResult {
    result.map(|mut response| {
        if let Some(debug_info) = response.debug_info.as_mut() {
            debug_info.did_dedup = did_dedup;
        }
        response
    })
}
