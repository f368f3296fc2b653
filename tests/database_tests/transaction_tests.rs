//! Transaction semantics through the raw collection API

use std::time::Duration;

use rosterdb::friends::FRIENDS;
use rosterdb::{
    CollectionOptions, Database, Friend, RosterError, TransactionMode, VersionChange,
};
use tempfile::TempDir;
use tokio::time::timeout;

use super::{config_for, open_roster};

const WAIT: Duration = Duration::from_secs(5);

fn friend_with_id(id: u64, name: &str) -> Friend {
    let mut friend = Friend::new(name, 30);
    friend.id = Some(id);
    friend
}

#[tokio::test]
async fn test_staged_writes_visible_inside_transaction() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    let connection = database.connection().unwrap();

    let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadWrite).unwrap();
    let (added, count, all) = {
        let friends = tx.object_store(FRIENDS).unwrap();
        (
            friends.add(Friend::new("Anna", 25)),
            friends.count(),
            friends.get_all::<Friend>(),
        )
    };

    let id = added.await.unwrap();
    assert_eq!(count.await.unwrap(), 1);
    assert_eq!(all.await.unwrap()[0].id, Some(id));
    tx.done().await.unwrap();

    assert_eq!(store.read_all().unwrap().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_request_aborts_whole_transaction() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    let connection = database.connection().unwrap();

    let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadWrite).unwrap();
    let (first, duplicate, after) = {
        let friends = tx.object_store(FRIENDS).unwrap();
        (
            friends.add(friend_with_id(5, "Anna")),
            friends.add(friend_with_id(5, "Ivan")),
            friends.add(Friend::new("Olga", 41)),
        )
    };

    assert_eq!(first.await.unwrap(), 5);
    assert!(matches!(duplicate.await, Err(RosterError::ConstraintError(_))));
    assert!(matches!(after.await, Err(RosterError::TransactionAborted)));
    assert!(matches!(tx.done().await, Err(RosterError::TransactionAborted)));

    assert!(store.read_all().unwrap().await.unwrap().is_empty());
    // The generator advance was rolled back too
    assert_eq!(store.insert("Anna", 25).unwrap().await.unwrap(), 1);
}

#[tokio::test]
async fn test_readonly_transaction_rejects_writes() {
    let temp = TempDir::new().unwrap();
    let (database, _store) = open_roster(temp.path()).await;
    let connection = database.connection().unwrap();

    let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadOnly).unwrap();
    let (add, delete) = {
        let friends = tx.object_store(FRIENDS).unwrap();
        (friends.add(Friend::new("Anna", 25)), friends.delete(1))
    };

    assert!(matches!(add.await, Err(RosterError::ReadOnly(_))));
    assert!(matches!(delete.await, Err(RosterError::TransactionAborted)));
    assert_eq!(tx.mode(), TransactionMode::ReadOnly);
}

#[tokio::test]
async fn test_explicit_keys_advance_generator() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    let connection = database.connection().unwrap();

    let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadWrite).unwrap();
    let put = tx.object_store(FRIENDS).unwrap().put(friend_with_id(10, "Anna"));
    assert_eq!(put.await.unwrap(), 10);
    tx.done().await.unwrap();

    assert_eq!(store.insert("Ivan", 30).unwrap().await.unwrap(), 11);
}

#[tokio::test]
async fn test_put_replaces_record() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    let id = store.insert("Anna", 25).unwrap().await.unwrap();
    let connection = database.connection().unwrap();

    let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadWrite).unwrap();
    let mut older = friend_with_id(id, "Anna");
    older.age = 26;
    let put = tx.object_store(FRIENDS).unwrap().put(older);
    put.await.unwrap();
    tx.done().await.unwrap();

    let stored = store.read_by_key(id).unwrap().await.unwrap().unwrap();
    assert_eq!(stored.age, 26);
    assert_eq!(store.read_all().unwrap().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scope_is_enforced() {
    let temp = TempDir::new().unwrap();
    let database = Database::new();
    let connection = database
        .open(config_for(temp.path()), 1, |change: &mut VersionChange| {
            change.create_collection(FRIENDS, CollectionOptions::auto_increment("id"))?;
            change.create_collection("notes", CollectionOptions::auto_increment("id"))
        })
        .await
        .unwrap();

    assert!(matches!(
        connection.transaction(&["missing"], TransactionMode::ReadOnly),
        Err(RosterError::CollectionNotFound(_))
    ));
    assert!(connection.transaction(&[], TransactionMode::ReadOnly).is_err());

    let tx = connection
        .transaction(&["notes", FRIENDS, "notes"], TransactionMode::ReadOnly)
        .unwrap();
    assert_eq!(tx.scope(), ["friends".to_string(), "notes".to_string()]);

    let narrow = connection.transaction(&["notes"], TransactionMode::ReadOnly).unwrap();
    assert!(matches!(
        narrow.object_store(FRIENDS),
        Err(RosterError::CollectionNotFound(_))
    ));
}

#[tokio::test]
async fn test_dropped_transaction_still_commits() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    let connection = database.connection().unwrap();

    let added = {
        let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadWrite).unwrap();
        let request = tx.object_store(FRIENDS).unwrap().add(Friend::new("Anna", 25));
        request
    };
    let id = added.await.unwrap();

    // The read waits on the collection lock until the first commit lands
    let found = store.read_by_key(id).unwrap().await.unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn test_transaction_completes_while_handle_held() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    let connection = database.connection().unwrap();

    let tx = connection.transaction(&[FRIENDS], TransactionMode::ReadWrite).unwrap();
    let id = tx
        .object_store(FRIENDS)
        .unwrap()
        .add(Friend::new("Anna", 25))
        .await
        .unwrap();

    // `tx` is still alive; its requests are done, so the lock is free
    let found = timeout(WAIT, store.read_by_key(id).unwrap())
        .await
        .expect("reader blocked by a finished transaction")
        .unwrap();
    assert_eq!(found.map(|f| f.name), Some("Anna".to_string()));

    assert!(matches!(
        tx.object_store(FRIENDS),
        Err(RosterError::TransactionInactive)
    ));
    tx.done().await.unwrap();
}

#[tokio::test]
async fn test_unawaited_insert_does_not_block_readers() {
    let temp = TempDir::new().unwrap();
    let (_database, store) = open_roster(temp.path()).await;

    let insert = store.insert("Anna", 25).unwrap();
    let all = timeout(WAIT, store.read_all().unwrap())
        .await
        .expect("reader blocked by a pending insert")
        .unwrap();
    assert!(all.len() <= 1);

    assert_eq!(insert.await.unwrap(), 1);
    assert_eq!(store.read_all().unwrap().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_readonly_transactions_overlap() {
    let temp = TempDir::new().unwrap();
    let (database, store) = open_roster(temp.path()).await;
    store.insert("Anna", 25).unwrap().await.unwrap();
    let connection = database.connection().unwrap();

    let held = connection.transaction(&[FRIENDS], TransactionMode::ReadOnly).unwrap();
    let friends = held.object_store(FRIENDS).unwrap();
    // Resolving means the worker holds its shared lock
    assert_eq!(friends.count().await.unwrap(), 1);

    let all = timeout(WAIT, store.read_all().unwrap())
        .await
        .expect("second read-only transaction blocked")
        .unwrap();
    assert_eq!(all.len(), 1);

    drop(friends);
    held.done().await.unwrap();
}
