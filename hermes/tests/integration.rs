use futures::StreamExt;
use hermes::{
    Client, Error as GraphQLError, FetchPolicy, HeaderPair, QueryError, QueryOptions, QueryState,
    Response, ResultSource, TransportError, Variables
};
use hermes_test::{recipes::*, Counter, MockLink};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration
};

fn build_client(link: &MockLink) -> Client<MockLink> {
    Client::builder(link.clone()).build()
}

fn data(response: &Response) -> &Value {
    response.data.as_ref().expect("response has data")
}

fn source(response: &Response) -> ResultSource {
    response.debug_info.as_ref().unwrap().source.clone()
}

#[tokio::test]
async fn cached_queries_skip_the_network() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);

    let first = client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();
    let second = client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();

    assert_eq!(source(&first), ResultSource::Network);
    assert_eq!(source(&second), ResultSource::Cache);
    assert_eq!(data(&second), &recipe_data("1", "Soup", 2));
    assert_eq!(link.call_count(), 1, "Second query went to the network");
    assert_eq!(
        client.query_state(&recipe_query(), &recipe_variables("1")),
        QueryState::Resolved
    );
}

#[tokio::test]
async fn network_only_always_fetches() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = Client::builder(link.clone())
        .with_fetch_policy(FetchPolicy::NetworkOnly)
        .build();

    client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();
    let second = client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();

    assert_eq!(source(&second), ResultSource::Network);
    assert_eq!(link.call_count(), 2);
}

#[tokio::test]
async fn different_variables_are_different_queries() {
    let link = MockLink::new()
        .reply_data(recipe_data("1", "Soup", 2))
        .reply_data(recipe_data("2", "Stew", 4));
    let client = build_client(&link);

    client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();
    let second = client
        .query(&recipe_query(), recipe_variables("2"))
        .await
        .unwrap();

    assert_eq!(data(&second), &recipe_data("2", "Stew", 4));
    assert_eq!(link.call_count(), 2);
}

#[tokio::test]
async fn concurrent_queries_share_one_request() {
    let link = MockLink::new()
        .with_delay(Duration::from_millis(50))
        .reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let query = recipe_query();

    let (first, second) = futures::join!(
        client.query(&query, recipe_variables("1")),
        client.query(&query, recipe_variables("1"))
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(link.call_count(), 1, "Query wasn't de-duplicated");
    assert_eq!(data(&first), data(&second));
    let dedups: Vec<bool> = [&first, &second]
        .iter()
        .map(|response| response.debug_info.as_ref().unwrap().did_dedup)
        .collect();
    assert_eq!(dedups, vec![false, true]);
}

#[tokio::test]
async fn colliding_hashes_are_still_different_queries() {
    // Both variable sets hash to the same operation key bucket
    let link = MockLink::new()
        .with_delay(Duration::from_millis(50))
        .reply_data(recipe_data("1b", "Soup", 2))
        .reply_data(recipe_data("2A", "Stew", 4));
    let client = build_client(&link);
    let query = recipe_query();

    let (first, second) = futures::join!(
        client.query(&query, recipe_variables("1b")),
        client.query(&query, recipe_variables("2A"))
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(link.call_count(), 2, "Different variables were de-duplicated");
    assert_eq!(data(&first), &recipe_data("1b", "Soup", 2));
    assert_eq!(data(&second), &recipe_data("2A", "Stew", 4));
    assert!(!second.debug_info.as_ref().unwrap().did_dedup);
}

#[tokio::test]
async fn mutations_are_never_deduplicated() {
    let link = MockLink::new()
        .with_delay(Duration::from_millis(20))
        .reply_data(rename_data("1", "Stew"));
    let client = build_client(&link);
    let mutation = rename_recipe_mutation();

    let (first, second) = futures::join!(
        client.mutate(&mutation, rename_variables("1", "Stew")),
        client.mutate(&mutation, rename_variables("1", "Stew"))
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(link.call_count(), 2);
}

#[tokio::test]
async fn abandoned_queries_still_fill_the_cache() {
    let link = MockLink::new()
        .with_delay(Duration::from_millis(50))
        .reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(5),
        client.query(&recipe_query(), recipe_variables("1"))
    )
    .await;
    assert!(abandoned.is_err(), "Query should still have been in flight");

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(
        client.read_query(&recipe_query(), &recipe_variables("1")),
        Some(recipe_data("1", "Soup", 2))
    );
    assert_eq!(link.call_count(), 1);
}

#[tokio::test]
async fn soup_becomes_stew() {
    let link = MockLink::new()
        .reply_data(recipe_data("1", "Soup", 2))
        .reply_data(rename_data("1", "Stew"));
    let client = build_client(&link);

    client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();
    client
        .mutate(&rename_recipe_mutation(), rename_variables("1", "Stew"))
        .await
        .unwrap();

    let read = client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();
    assert_eq!(source(&read), ResultSource::Cache);
    assert_eq!(data(&read), &recipe_data("1", "Stew", 2));
    assert_eq!(link.call_count(), 2);
}

#[tokio::test]
async fn observers_see_mutations_without_refetching() {
    let link = MockLink::new()
        .reply_data(recipe_data("1", "Soup", 2))
        .reply_data(rename_data("1", "Stew"));
    let client = build_client(&link);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let subscription = {
        let seen = seen.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |result| {
                let title = result.unwrap().data.unwrap()["recipe"]["title"].clone();
                seen.lock().unwrap().push(title);
            })
            .await
    };
    client
        .mutate(&rename_recipe_mutation(), rename_variables("1", "Stew"))
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!("Soup"), json!("Stew")]);
    assert_eq!(link.call_count(), 2, "Observer refetched instead of reading the cache");
    subscription.dispose();
}

#[tokio::test]
async fn unrelated_writes_do_not_notify() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let counter = Counter::sync();

    let _subscription = {
        let counter = counter.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |_| {
                Counter::inc_sync(&counter)
            })
            .await
    };
    client
        .write_query(
            &recipe_query(),
            &recipe_variables("2"),
            &recipe_data("2", "Stew", 4)
        )
        .unwrap();
    // Same data again, nothing changes
    client
        .write_query(
            &recipe_query(),
            &recipe_variables("1"),
            &recipe_data("1", "Soup", 2)
        )
        .unwrap();

    assert_eq!(Counter::get_sync(&counter), 1);
}

#[tokio::test]
async fn disposed_observers_are_never_called() {
    let link = MockLink::new()
        .reply_data(recipe_data("1", "Soup", 2))
        .reply_data(rename_data("1", "Stew"));
    let client = build_client(&link);
    let kept_calls = Counter::sync();
    let disposed_calls = Counter::sync();

    let kept = {
        let counter = kept_calls.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |_| {
                Counter::inc_sync(&counter)
            })
            .await
    };
    let disposed = {
        let counter = disposed_calls.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |_| {
                Counter::inc_sync(&counter)
            })
            .await
    };
    assert!(disposed.is_active());
    disposed.dispose();

    client
        .mutate(&rename_recipe_mutation(), rename_variables("1", "Stew"))
        .await
        .unwrap();

    assert_eq!(Counter::get_sync(&kept_calls), 2);
    assert_eq!(Counter::get_sync(&disposed_calls), 1);
    assert!(kept.is_active());
}

#[tokio::test]
async fn disposing_cancels_pending_notifications() {
    let link = MockLink::new()
        .with_delay(Duration::from_millis(30))
        .reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let counter = Counter::sync();

    let subscription = {
        let counter = counter.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |_| {
                Counter::inc_sync(&counter)
            })
            .await
    };
    link.push_data(recipe_data("1", "Stew", 2));
    client.evict("Recipe:1").unwrap();

    // The refetch for the observer is in flight now
    tokio::time::sleep(Duration::from_millis(10)).await;
    subscription.dispose();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(link.call_count(), 2);
    assert_eq!(
        client.read_query(&recipe_query(), &recipe_variables("1")),
        Some(recipe_data("1", "Stew", 2))
    );
    assert_eq!(Counter::get_sync(&counter), 1);
}

#[tokio::test]
async fn failed_observers_pick_up_later_writes() {
    let link = MockLink::new().reply_error(TransportError::Timeout);
    let client = build_client(&link);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _subscription = {
        let seen = seen.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |result| {
                seen.lock().unwrap().push(result.map(|response| response.data));
            })
            .await
    };
    client
        .write_query(
            &recipe_query(),
            &recipe_variables("1"),
            &recipe_data("1", "Soup", 2)
        )
        .unwrap();
    client
        .write_query(
            &recipe_query(),
            &recipe_variables("1"),
            &recipe_data("1", "Stew", 2)
        )
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Err(QueryError::Transport(TransportError::Timeout)),
            Ok(Some(recipe_data("1", "Soup", 2))),
            Ok(Some(recipe_data("1", "Stew", 2)))
        ]
    );
    assert_eq!(link.call_count(), 1);
}

#[tokio::test]
async fn transport_failures_leave_the_store_untouched() {
    let link = MockLink::new().reply_error(TransportError::Status {
        status: 500,
        body: "Internal Server Error".to_string()
    });
    let client = build_client(&link);

    let result = client.query(&recipe_query(), recipe_variables("1")).await;

    match result {
        Err(QueryError::Transport(TransportError::Status { status, .. })) => {
            assert_eq!(status, 500)
        }
        other => panic!("expected a transport error, got {:?}", other)
    }
    assert!(client.extract().records.is_empty());
    assert!(matches!(
        client.query_state(&recipe_query(), &recipe_variables("1")),
        QueryState::Failed(QueryError::Transport(_))
    ));
}

#[tokio::test]
async fn malformed_responses_are_not_written() {
    let link = MockLink::new().reply_data(json!({
        "recipe": { "__typename": "Recipe", "id": "1", "title": "Soup" }
    }));
    let client = build_client(&link);

    let result = client.query(&recipe_query(), recipe_variables("1")).await;

    assert!(matches!(result, Err(QueryError::Normalization(_))));
    assert!(client.extract().records.is_empty());
}

#[tokio::test]
async fn errors_without_data_fail_the_query() {
    let error = GraphQLError {
        message: "not allowed".to_string(),
        locations: None,
        path: None,
        extensions: None
    };
    let link = MockLink::new().reply(Ok(Response {
        debug_info: None,
        data: None,
        errors: Some(vec![error.clone()])
    }));
    let client = build_client(&link);

    let result = client.query(&recipe_query(), recipe_variables("1")).await;

    assert_eq!(result, Err(QueryError::GraphQL(vec![error])));
}

#[tokio::test]
async fn partial_data_resolves_with_errors() {
    let partial = json!({
        "recipe": { "__typename": "Recipe", "id": "1", "title": "Soup", "servings": null }
    });
    let link = MockLink::new().reply(Ok(Response {
        debug_info: None,
        data: Some(partial.clone()),
        errors: Some(vec![GraphQLError {
            message: "servings unavailable".to_string(),
            locations: None,
            path: None,
            extensions: None
        }])
    }));
    let client = build_client(&link);

    let response = client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();

    assert_eq!(data(&response), &partial);
    assert!(response.has_errors());
    assert_eq!(
        client.query_state(&recipe_query(), &recipe_variables("1")),
        QueryState::Resolved
    );
}

#[tokio::test]
async fn writes_from_callbacks_apply_after_the_round() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let servings_seen = Arc::new(Mutex::new(Vec::new()));
    let read_inside = Arc::new(Mutex::new(None));

    let _subscription = {
        let inner = client.clone();
        let servings_seen = servings_seen.clone();
        let read_inside = read_inside.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |result| {
                let data = result.unwrap().data.unwrap();
                servings_seen
                    .lock()
                    .unwrap()
                    .push(data["recipe"]["servings"].clone());

                if data["recipe"]["title"] == json!("Stew") && read_inside.lock().unwrap().is_none()
                {
                    inner
                        .write_query(
                            &recipe_query(),
                            &recipe_variables("1"),
                            &recipe_data("1", "Stew", 4)
                        )
                        .unwrap();
                    *read_inside.lock().unwrap() =
                        inner.read_query(&recipe_query(), &recipe_variables("1"));
                }
            })
            .await
    };

    client
        .write_query(
            &recipe_query(),
            &recipe_variables("1"),
            &recipe_data("1", "Stew", 2)
        )
        .unwrap();

    assert_eq!(
        *read_inside.lock().unwrap(),
        Some(recipe_data("1", "Stew", 2)),
        "Write from a callback was applied during the notification round"
    );
    assert_eq!(*servings_seen.lock().unwrap(), vec![json!(2), json!(2), json!(4)]);
    assert_eq!(
        client.read_query(&recipe_query(), &recipe_variables("1")),
        Some(recipe_data("1", "Stew", 4))
    );
}

#[tokio::test]
async fn evicted_entities_are_refetched_for_observers() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _subscription = {
        let seen = seen.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |result| {
                seen.lock().unwrap().push(result.unwrap().data.unwrap());
            })
            .await
    };

    link.push_data(recipe_data("1", "Stew", 2));
    client.evict("Recipe:1").unwrap();
    assert!(client.evict("Recipe:1").is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(link.call_count(), 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![recipe_data("1", "Soup", 2), recipe_data("1", "Stew", 2)]
    );
    assert_eq!(
        client.query_state(&recipe_query(), &recipe_variables("1")),
        QueryState::Resolved
    );
}

#[tokio::test]
async fn refetching_a_resolved_query() {
    let link = MockLink::new()
        .with_delay(Duration::from_millis(50))
        .reply_data(recipe_data("1", "Soup", 2))
        .reply_data(recipe_data("1", "Stew", 2));
    let client = build_client(&link);
    let query = recipe_query();
    let variables = recipe_variables("1");

    assert_eq!(client.query_state(&query, &variables), QueryState::Idle);
    client.query(&query, variables.clone()).await.unwrap();

    let refetch = {
        let client = client.clone();
        let query = query.clone();
        let variables = variables.clone();
        tokio::spawn(async move { client.refetch(&query, variables).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.query_state(&query, &variables), QueryState::Refetching);

    let response = refetch.await.unwrap().unwrap();
    assert_eq!(data(&response), &recipe_data("1", "Stew", 2));
    assert_eq!(client.query_state(&query, &variables), QueryState::Resolved);
}

#[tokio::test]
async fn watched_queries_stream_updates() {
    let link = MockLink::new()
        .reply_data(recipe_data("1", "Soup", 2))
        .reply_data(rename_data("1", "Stew"));
    let client = build_client(&link);

    let mut observable = client.watch(&recipe_query(), recipe_variables("1")).await;
    let first = observable.next().await.unwrap().unwrap();
    assert_eq!(data(&first), &recipe_data("1", "Soup", 2));

    client
        .mutate(&rename_recipe_mutation(), rename_variables("1", "Stew"))
        .await
        .unwrap();
    let second = observable.next().await.unwrap().unwrap();
    assert_eq!(data(&second), &recipe_data("1", "Stew", 2));
    assert_eq!(source(&second), ResultSource::Cache);
}

#[tokio::test]
async fn reset_store_forgets_everything() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();

    client.reset_store();

    assert_eq!(
        client.query_state(&recipe_query(), &recipe_variables("1")),
        QueryState::Idle
    );
    assert_eq!(
        client.read_query(&recipe_query(), &recipe_variables("1")),
        None
    );
    client
        .query(&recipe_query(), recipe_variables("1"))
        .await
        .unwrap();
    assert_eq!(link.call_count(), 2);
}

#[tokio::test]
async fn snapshots_move_between_clients() {
    let link = MockLink::new().reply_data(recipes_data(5));
    let client = build_client(&link);
    client
        .query(&recipes_query(), Variables::new())
        .await
        .unwrap();

    let other_link = MockLink::new();
    let other = build_client(&other_link);
    other.restore(client.extract());

    let response = other
        .query(&recipes_query(), Variables::new())
        .await
        .unwrap();
    assert_eq!(source(&response), ResultSource::Cache);
    assert_eq!(data(&response), &recipes_data(5));
    assert_eq!(other_link.call_count(), 0);
}

#[tokio::test]
async fn update_query_notifies_observers() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let counter = Counter::sync();
    let _subscription = {
        let counter = counter.clone();
        client
            .subscribe(&recipe_query(), recipe_variables("1"), move |_| {
                Counter::inc_sync(&counter)
            })
            .await
    };

    let updated = client
        .update_query(&recipe_query(), &recipe_variables("1"), |current| {
            let mut data = current?;
            data["recipe"]["servings"] = json!(6);
            Some(data)
        })
        .unwrap();

    assert!(updated);
    assert_eq!(Counter::get_sync(&counter), 2);
    assert_eq!(
        client.read_query(&recipe_query(), &recipe_variables("1")),
        Some(recipe_data("1", "Soup", 6))
    );
}

#[tokio::test]
async fn per_request_headers_reach_the_link() {
    let link = MockLink::new().reply_data(recipe_data("1", "Soup", 2));
    let client = build_client(&link);
    let options = QueryOptions::default()
        .with_extra_headers(|| vec![HeaderPair::from(("x-admin-secret", "secret"))]);

    client
        .query_with_options(&recipe_query(), recipe_variables("1"), options)
        .await
        .unwrap();

    let requests = link.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].headers,
        vec![HeaderPair("x-admin-secret".to_string(), "secret".to_string())]
    );
    assert_eq!(requests[0].operation_name.as_deref(), Some("Recipe"));
}
