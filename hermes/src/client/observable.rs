use crate::{
    client::r#impl::{operation_key, ClientImpl, FetchResult},
    types::{Observable, Operation, OperationKey},
    DebugInfo, Link, QueryOptions, Response
};
use hermes_normalized_cache::{QueryDocument, Variables};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use stable_vec::StableVec;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak
    }
};

pub(crate) type Callback = Box<dyn Fn(FetchResult) + Send + Sync>;
pub(crate) type Observers = Arc<Mutex<StableVec<Arc<Observer>>>>;

/// A callback watching the result of one query.
pub(crate) struct Observer {
    key: OperationKey,
    document: QueryDocument,
    variables: Variables,
    callback: Callback,
    active: AtomicBool,
    /// Held for the duration of every callback invocation
    gate: ReentrantMutex<()>,
    dependencies: Mutex<HashSet<String>>,
    last_data: Mutex<Option<Value>>
}

impl Observer {
    fn new(key: OperationKey, document: QueryDocument, variables: Variables, callback: Callback) -> Self {
        Observer {
            key,
            document,
            variables,
            callback,
            active: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
            dependencies: Mutex::new(HashSet::new()),
            last_data: Mutex::new(None)
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn depends_on(&self, changed: &HashSet<String>) -> bool {
        let dependencies = self.dependencies.lock();
        changed.iter().any(|identity| dependencies.contains(identity))
    }

    /// Whether the observer was ever given data.
    pub(crate) fn has_resolved(&self) -> bool {
        self.last_data.lock().is_some()
    }

    pub(crate) fn set_dependencies(&self, dependencies: HashSet<String>) {
        *self.dependencies.lock() = dependencies;
    }

    /// Call the callback unless the observer was disposed or the data didn't change since the
    /// last call. Errors are always delivered.
    pub(crate) fn notify(&self, result: FetchResult) {
        let _gate = self.gate.lock();
        if !self.is_active() {
            return;
        }
        if let Ok(Response { data: Some(data), .. }) = &result {
            let mut last_data = self.last_data.lock();
            if last_data.as_ref() == Some(data) {
                tracing::trace!(key = %self.key, "result unchanged, skipping observer");
                return;
            }
            *last_data = Some(data.clone());
        }
        (self.callback)(result);
    }

    /// Once this returns the callback is not running and won't be called again.
    fn dispose(&self) {
        self.active.store(false, Ordering::SeqCst);
        // Wait out a callback that's running on another thread
        let _gate = self.gate.lock();
    }
}

/// A registered observer. Dropping it has the same effect as calling `dispose`.
pub struct Subscription {
    observer: Arc<Observer>,
    index: usize,
    observers: Weak<Mutex<StableVec<Arc<Observer>>>>
}

impl Subscription {
    /// Unregister the observer. The callback is guaranteed not to be called after this returns,
    /// even for notifications that were already scheduled.
    pub fn dispose(self) {}

    pub fn is_active(&self) -> bool {
        self.observer.is_active()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.observer.dispose();
        if let Some(observers) = self.observers.upgrade() {
            observers.lock().remove(self.index);
        }
    }
}

impl<L: Link> ClientImpl<L> {
    pub async fn subscribe_with_options<F>(
        self: &Arc<Self>,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions,
        callback: F
    ) -> Subscription
    where
        F: Fn(FetchResult) + Send + Sync + 'static
    {
        let key = operation_key(document, &variables);
        let observer = Arc::new(Observer::new(
            key,
            document.clone(),
            variables.clone(),
            Box::new(callback)
        ));
        let index = self.observers.lock().push(observer.clone());
        let subscription = Subscription {
            observer: observer.clone(),
            index,
            observers: Arc::downgrade(&self.observers)
        };
        tracing::trace!(key = %observer.key, index, "registered observer");

        let result = self.query_with_options(document, variables, options).await;
        self.resolve(&observer, result);
        subscription
    }

    pub async fn watch_with_options(
        self: &Arc<Self>,
        document: &QueryDocument,
        variables: Variables,
        options: QueryOptions
    ) -> Observable {
        let (sender, receiver) = futures::channel::mpsc::unbounded();
        let subscription = self
            .subscribe_with_options(document, variables, options, move |result| {
                // The receiver only goes away together with the subscription
                let _ = sender.unbounded_send(result);
            })
            .await;
        Observable::new(receiver, subscription)
    }

    /// Re-read every observer depending on one of `changed` and notify it. Observers whose data
    /// can't be read from the store anymore are refetched.
    pub(crate) fn broadcast(self: &Arc<Self>, changed: &HashSet<String>) {
        if changed.is_empty() {
            return;
        }

        let affected: Vec<Arc<Observer>> = self
            .observers
            .lock()
            .values()
            .filter(|observer| observer.depends_on(changed))
            .cloned()
            .collect();
        if affected.is_empty() {
            return;
        }
        tracing::trace!(
            observers = affected.len(),
            changed = changed.len(),
            "broadcasting changes"
        );

        for observer in affected {
            if !observer.is_active() {
                continue;
            }
            let read = self
                .store
                .lock()
                .read_query_with_dependencies(&observer.document, &observer.variables);
            match read {
                Ok((data, dependencies)) => {
                    observer.set_dependencies(dependencies);
                    observer.notify(Ok(Response {
                        debug_info: Some(DebugInfo::cache()),
                        data: Some(data),
                        errors: None
                    }));
                }
                Err(miss) if observer.has_resolved() => {
                    tracing::debug!(key = %observer.key, %miss, "observed data is gone, refetching");
                    self.refetch_observer(observer);
                }
                Err(miss) => {
                    tracing::trace!(key = %observer.key, %miss, "observer still unresolved");
                }
            }
        }
    }

    fn refetch_observer(self: &Arc<Self>, observer: Arc<Observer>) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(key = %observer.key, "no runtime to refetch observer on");
                return;
            }
        };

        let client = self.clone();
        let operation = Operation {
            key: observer.key.clone(),
            document: observer.document.clone(),
            variables: observer.variables.clone(),
            options: QueryOptions::default()
        };
        runtime.spawn(async move {
            let result = client.fetch(operation, true).await;
            client.resolve(&observer, result);
        });
    }

    /// Deliver the result of a fetch made for `observer`. The data delivered and the
    /// dependencies recorded come from the same read, taken while no commit can run.
    ///
    /// Until it resolves once, an observer depends on the root of its operation, so the next
    /// write of its query gives it a result.
    fn resolve(self: &Arc<Self>, observer: &Observer, result: FetchResult) {
        let _commits = self.commits.lock();
        let read = match &result {
            Ok(_) => self
                .store
                .lock()
                .read_query_with_dependencies(&observer.document, &observer.variables)
                .ok(),
            Err(_) => None
        };
        let result = match (result, read) {
            (Ok(response), Some((data, dependencies))) => {
                observer.set_dependencies(dependencies);
                Ok(Response {
                    data: Some(data),
                    ..response
                })
            }
            (result, _) => {
                if !observer.has_resolved() {
                    observer.set_dependencies(root_of(&observer.document));
                }
                result
            }
        };
        self.deliver(observer, result);
    }
}

fn root_of(document: &QueryDocument) -> HashSet<String> {
    std::iter::once(document.operation_type().root_key().to_string()).collect()
}
