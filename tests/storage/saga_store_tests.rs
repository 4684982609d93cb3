//! SagaStorage interface tests.
//!
//! These tests verify the contract of the SagaStorage trait.
//! Each storage implementation should run these tests.

use saga_persistence::saga::{CorrelationProperty, ID_PROPERTY};
use saga_persistence::storage::{SagaStorage, SagaStorageExt, StorageError};
use uuid::Uuid;

use super::fixtures::{by_order_id, unique_order_id, OrderSaga, ShipmentSaga};

async fn find_order<S: SagaStorage>(store: &S, order_id: &str) -> Option<OrderSaga> {
    store
        .find_typed::<OrderSaga>("OrderId", Some(order_id))
        .await
        .expect("find should succeed")
}

async fn find_order_by_customer<S: SagaStorage>(store: &S, customer: &str) -> Option<OrderSaga> {
    store
        .find_typed::<OrderSaga>("Customer", Some(customer))
        .await
        .expect("find should succeed")
}

fn by_order_id_and_customer() -> Vec<CorrelationProperty> {
    vec![
        CorrelationProperty::new("OrderId"),
        CorrelationProperty::new("Customer"),
    ]
}

async fn find_order_by_id<S: SagaStorage>(store: &S, id: Uuid) -> Option<OrderSaga> {
    store
        .find_typed::<OrderSaga>(ID_PROPERTY, Some(&id.to_string()))
        .await
        .expect("find should succeed")
}

// =============================================================================
// SagaStorage::ensure_schema tests
// =============================================================================

pub async fn test_ensure_schema_is_idempotent<S: SagaStorage>(store: &S) {
    store
        .ensure_schema()
        .await
        .expect("first ensure_schema should succeed");
    store
        .ensure_schema()
        .await
        .expect("second ensure_schema should succeed");
}

// =============================================================================
// SagaStorage::find tests
// =============================================================================

pub async fn test_find_nonexistent<S: SagaStorage>(store: &S) {
    assert!(find_order(store, &unique_order_id("missing")).await.is_none());
    assert!(find_order_by_id(store, Uuid::new_v4()).await.is_none());
}

pub async fn test_find_by_malformed_id<S: SagaStorage>(store: &S) {
    let err = store
        .find("OrderSaga", ID_PROPERTY, Some("not-a-uuid"))
        .await
        .expect_err("malformed id should fail");
    assert!(
        matches!(err, StorageError::InvalidId { ref value } if value == "not-a-uuid"),
        "unexpected error: {err:?}"
    );
}

pub async fn test_find_other_saga_type<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("mismatch");
    let saga = OrderSaga::new(&order_id);
    store.insert(&saga, &by_order_id()).await.unwrap();

    let by_id = store
        .find_typed::<ShipmentSaga>(ID_PROPERTY, Some(&saga.id.to_string()))
        .await
        .unwrap();
    assert!(by_id.is_none(), "id lookup must not cross saga types");

    let by_key = store
        .find_typed::<ShipmentSaga>("OrderId", Some(&order_id))
        .await
        .unwrap();
    assert!(by_key.is_none(), "index lookup must not cross saga types");
}

pub async fn test_find_none_value_matches_empty_string<S: SagaStorage>(store: &S) {
    let mut saga = OrderSaga::new(&unique_order_id("empty"));
    saga.customer = Some(String::new());
    let customer = vec![CorrelationProperty::new("Customer")];

    // Only one saga may own the empty customer value; clear any earlier owner.
    if let Some(mut previous) = store
        .find_typed::<OrderSaga>("Customer", None)
        .await
        .unwrap()
    {
        store.delete(&mut previous).await.unwrap();
    }

    store.insert(&saga, &customer).await.unwrap();

    let found = store
        .find_typed::<OrderSaga>("Customer", None)
        .await
        .unwrap()
        .expect("None should match the empty string");
    assert_eq!(found.id, saga.id);
}

// =============================================================================
// SagaStorage::insert tests
// =============================================================================

pub async fn test_insert_and_find<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("insert");
    let customer = unique_order_id("customer");
    let mut saga = OrderSaga::new(&order_id);
    saga.customer = Some(customer.clone());
    saga.total_cents = 4200;

    store
        .insert(&saga, &by_order_id_and_customer())
        .await
        .expect("insert should succeed");

    let by_key = find_order(store, &order_id).await.expect("indexed saga");
    assert_eq!(by_key, saga);

    let by_customer = find_order_by_customer(store, &customer)
        .await
        .expect("every declared property is indexed");
    assert_eq!(by_customer.id, saga.id);

    let by_id = find_order_by_id(store, saga.id).await.expect("stored saga");
    assert_eq!(by_id, saga);
    assert_eq!(by_id.revision, 0);
}

pub async fn test_insert_skips_absent_correlation_values<S: SagaStorage>(store: &S) {
    let saga = OrderSaga::new(&unique_order_id("absent"));
    let properties = vec![
        CorrelationProperty::new("OrderId"),
        CorrelationProperty::new("Customer"),
        CorrelationProperty::new(ID_PROPERTY),
        CorrelationProperty::new("OrderId"),
    ];

    store
        .insert(&saga, &properties)
        .await
        .expect("absent values, the id property and duplicates are skipped");

    assert!(find_order_by_id(store, saga.id).await.is_some());
    let order_key = saga.order_id.as_deref().unwrap_or_default();
    assert_eq!(find_order(store, order_key).await.unwrap().id, saga.id);

    // An absent customer has no entry, so not even the empty value finds it.
    let by_empty_customer = store
        .find_typed::<OrderSaga>("Customer", None)
        .await
        .unwrap();
    assert_ne!(by_empty_customer.map(|s| s.id), Some(saga.id));
}

pub async fn test_insert_duplicate_id<S: SagaStorage>(store: &S) {
    let saga = OrderSaga::new(&unique_order_id("dup"));
    store.insert(&saga, &by_order_id()).await.unwrap();

    let mut twin = saga.clone();
    twin.order_id = Some(unique_order_id("dup-twin"));
    let err = store
        .insert(&twin, &by_order_id())
        .await
        .expect_err("duplicate id should conflict");
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");

    let twin_key = twin.order_id.as_deref().unwrap_or_default();
    assert!(
        find_order(store, twin_key).await.is_none(),
        "failed insert must not leave index entries"
    );
}

pub async fn test_insert_correlation_collision<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("collide");
    let first = OrderSaga::new(&order_id);
    store.insert(&first, &by_order_id()).await.unwrap();

    let second = OrderSaga::new(&order_id);
    let err = store
        .insert(&second, &by_order_id())
        .await
        .expect_err("shared correlation value should conflict");
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");

    assert!(
        find_order_by_id(store, second.id).await.is_none(),
        "colliding insert must be rolled back"
    );
    assert_eq!(find_order(store, &order_id).await.unwrap().id, first.id);
}

pub async fn test_same_value_across_saga_types<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("shared");
    let order = OrderSaga::new(&order_id);
    let shipment = ShipmentSaga::new(&order_id);

    store.insert(&order, &by_order_id()).await.unwrap();
    store
        .insert(&shipment, &by_order_id())
        .await
        .expect("different saga types may share a correlation value");

    let found = store
        .find_typed::<ShipmentSaga>("OrderId", Some(&order_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, shipment.id);
    assert_eq!(find_order(store, &order_id).await.unwrap().id, order.id);
}

pub async fn test_insert_contract_violations<S: SagaStorage>(store: &S) {
    let mut nil = OrderSaga::new(&unique_order_id("nil"));
    nil.id = Uuid::nil();
    let err = store.insert(&nil, &by_order_id()).await.unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)), "{err:?}");

    let mut revised = OrderSaga::new(&unique_order_id("revised"));
    revised.revision = 3;
    let err = store.insert(&revised, &by_order_id()).await.unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)), "{err:?}");
    assert!(find_order_by_id(store, revised.id).await.is_none());
}

// =============================================================================
// SagaStorage::update tests
// =============================================================================

pub async fn test_update_increments_revision<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("update");
    let mut saga = OrderSaga::new(&order_id);
    store.insert(&saga, &by_order_id()).await.unwrap();

    saga.total_cents = 100;
    store.update(&mut saga, &by_order_id()).await.unwrap();
    assert_eq!(saga.revision, 1);

    saga.total_cents = 250;
    store.update(&mut saga, &by_order_id()).await.unwrap();
    assert_eq!(saga.revision, 2);

    let stored = find_order(store, &order_id).await.unwrap();
    assert_eq!(stored.revision, 2);
    assert_eq!(stored.total_cents, 250);
}

pub async fn test_update_replaces_index_entries<S: SagaStorage>(store: &S) {
    let old_key = unique_order_id("rekey-old");
    let new_key = unique_order_id("rekey-new");
    let mut saga = OrderSaga::new(&old_key);
    store.insert(&saga, &by_order_id()).await.unwrap();

    saga.order_id = Some(new_key.clone());
    store.update(&mut saga, &by_order_id()).await.unwrap();

    assert!(find_order(store, &old_key).await.is_none());
    assert_eq!(find_order(store, &new_key).await.unwrap().id, saga.id);

    // The released value is free for another saga.
    let newcomer = OrderSaga::new(&old_key);
    store.insert(&newcomer, &by_order_id()).await.unwrap();
}

pub async fn test_update_removes_cleared_entries<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("clear");
    let customer = unique_order_id("clear-customer");
    let mut saga = OrderSaga::new(&order_id);
    saga.customer = Some(customer.clone());
    store.insert(&saga, &by_order_id_and_customer()).await.unwrap();
    assert!(find_order_by_customer(store, &customer).await.is_some());

    saga.customer = None;
    store
        .update(&mut saga, &by_order_id_and_customer())
        .await
        .expect("update should succeed");

    assert!(
        find_order_by_customer(store, &customer).await.is_none(),
        "cleared property must lose its index entry"
    );
    assert_eq!(find_order(store, &order_id).await.unwrap().revision, 1);

    // The freed value is available to another saga.
    let mut newcomer = OrderSaga::new(&unique_order_id("clear-newcomer"));
    newcomer.customer = Some(customer.clone());
    store
        .insert(&newcomer, &by_order_id_and_customer())
        .await
        .expect("freed customer value should be insertable");
    assert_eq!(
        find_order_by_customer(store, &customer).await.unwrap().id,
        newcomer.id
    );
}

pub async fn test_update_stale_revision<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("stale");
    let mut saga = OrderSaga::new(&order_id);
    store.insert(&saga, &by_order_id()).await.unwrap();

    let mut stale = saga.clone();
    saga.total_cents = 10;
    store.update(&mut saga, &by_order_id()).await.unwrap();

    let moved_key = unique_order_id("stale-moved");
    stale.order_id = Some(moved_key.clone());
    stale.total_cents = 99;
    let err = store
        .update(&mut stale, &by_order_id())
        .await
        .expect_err("stale revision should conflict");
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");
    assert_eq!(stale.revision, 0, "failed update keeps the caller's revision");

    let stored = find_order(store, &order_id)
        .await
        .expect("index must be untouched by the failed update");
    assert_eq!(stored.revision, 1);
    assert_eq!(stored.total_cents, 10);
    assert!(find_order(store, &moved_key).await.is_none());
}

pub async fn test_update_correlation_collision<S: SagaStorage>(store: &S) {
    let taken = unique_order_id("taken");
    let own = unique_order_id("own");
    store
        .insert(&OrderSaga::new(&taken), &by_order_id())
        .await
        .unwrap();
    let mut saga = OrderSaga::new(&own);
    store.insert(&saga, &by_order_id()).await.unwrap();

    saga.order_id = Some(taken.clone());
    let err = store
        .update(&mut saga, &by_order_id())
        .await
        .expect_err("taking another saga's value should conflict");
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");
    assert_eq!(saga.revision, 0);

    let stored = find_order(store, &own)
        .await
        .expect("rolled-back update keeps the old index entry");
    assert_eq!(stored.revision, 0);
}

pub async fn test_update_deleted_saga<S: SagaStorage>(store: &S) {
    let mut saga = OrderSaga::new(&unique_order_id("gone"));
    store.insert(&saga, &by_order_id()).await.unwrap();

    let mut copy = saga.clone();
    store.delete(&mut saga).await.unwrap();

    let err = store.update(&mut copy, &by_order_id()).await.unwrap_err();
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");
}

pub async fn test_concurrent_updates_one_wins<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("race");
    let saga = OrderSaga::new(&order_id);
    store.insert(&saga, &by_order_id()).await.unwrap();

    let mut left = saga.clone();
    left.total_cents = 1;
    let mut right = saga.clone();
    right.total_cents = 2;

    let properties = by_order_id();
    let (left_result, right_result) = tokio::join!(
        store.update(&mut left, &properties),
        store.update(&mut right, &properties)
    );

    let outcomes = [&left_result, &right_result];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_concurrency_conflict()))
        .count();
    assert_eq!((wins, conflicts), (1, 1), "{left_result:?} / {right_result:?}");

    let stored = find_order(store, &order_id).await.unwrap();
    assert_eq!(stored.revision, 1);
    let winner = if left_result.is_ok() { &left } else { &right };
    assert_eq!(stored.total_cents, winner.total_cents);
}

// =============================================================================
// SagaStorage::delete tests
// =============================================================================

pub async fn test_delete_removes_saga_and_index<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("delete");
    let mut saga = OrderSaga::new(&order_id);
    store.insert(&saga, &by_order_id()).await.unwrap();

    store.delete(&mut saga).await.expect("delete should succeed");
    assert_eq!(saga.revision, 1, "delete marks the in-memory copy stale");

    assert!(find_order(store, &order_id).await.is_none());
    assert!(find_order_by_id(store, saga.id).await.is_none());

    // The released value is free for another saga.
    store
        .insert(&OrderSaga::new(&order_id), &by_order_id())
        .await
        .unwrap();
}

pub async fn test_delete_stale_revision<S: SagaStorage>(store: &S) {
    let order_id = unique_order_id("delete-stale");
    let mut saga = OrderSaga::new(&order_id);
    store.insert(&saga, &by_order_id()).await.unwrap();

    let mut stale = saga.clone();
    store.update(&mut saga, &by_order_id()).await.unwrap();

    let err = store
        .delete(&mut stale)
        .await
        .expect_err("stale delete should conflict");
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");
    assert_eq!(stale.revision, 0);
    assert!(find_order(store, &order_id).await.is_some());
}

pub async fn test_delete_twice<S: SagaStorage>(store: &S) {
    let mut saga = OrderSaga::new(&unique_order_id("twice"));
    store.insert(&saga, &by_order_id()).await.unwrap();

    let mut copy = saga.clone();
    store.delete(&mut saga).await.unwrap();

    let err = store.delete(&mut copy).await.unwrap_err();
    assert!(err.is_concurrency_conflict(), "unexpected error: {err:?}");
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all SagaStorage interface tests against a store implementation.
#[macro_export]
macro_rules! run_saga_storage_tests {
    ($store:expr) => {
        use $crate::storage::saga_store_tests::*;

        // ensure_schema tests
        test_ensure_schema_is_idempotent($store).await;
        println!("  test_ensure_schema_is_idempotent: PASSED");

        // find tests
        test_find_nonexistent($store).await;
        println!("  test_find_nonexistent: PASSED");

        test_find_by_malformed_id($store).await;
        println!("  test_find_by_malformed_id: PASSED");

        test_find_other_saga_type($store).await;
        println!("  test_find_other_saga_type: PASSED");

        test_find_none_value_matches_empty_string($store).await;
        println!("  test_find_none_value_matches_empty_string: PASSED");

        // insert tests
        test_insert_and_find($store).await;
        println!("  test_insert_and_find: PASSED");

        test_insert_skips_absent_correlation_values($store).await;
        println!("  test_insert_skips_absent_correlation_values: PASSED");

        test_insert_duplicate_id($store).await;
        println!("  test_insert_duplicate_id: PASSED");

        test_insert_correlation_collision($store).await;
        println!("  test_insert_correlation_collision: PASSED");

        test_same_value_across_saga_types($store).await;
        println!("  test_same_value_across_saga_types: PASSED");

        test_insert_contract_violations($store).await;
        println!("  test_insert_contract_violations: PASSED");

        // update tests
        test_update_increments_revision($store).await;
        println!("  test_update_increments_revision: PASSED");

        test_update_replaces_index_entries($store).await;
        println!("  test_update_replaces_index_entries: PASSED");

        test_update_removes_cleared_entries($store).await;
        println!("  test_update_removes_cleared_entries: PASSED");

        test_update_stale_revision($store).await;
        println!("  test_update_stale_revision: PASSED");

        test_update_correlation_collision($store).await;
        println!("  test_update_correlation_collision: PASSED");

        test_update_deleted_saga($store).await;
        println!("  test_update_deleted_saga: PASSED");

        test_concurrent_updates_one_wins($store).await;
        println!("  test_concurrent_updates_one_wins: PASSED");

        // delete tests
        test_delete_removes_saga_and_index($store).await;
        println!("  test_delete_removes_saga_and_index: PASSED");

        test_delete_stale_revision($store).await;
        println!("  test_delete_stale_revision: PASSED");

        test_delete_twice($store).await;
        println!("  test_delete_twice: PASSED");
    };
}
