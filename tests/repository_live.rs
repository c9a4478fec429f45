mod common;

use common::{test_repo, test_store_with_dir};
use lijo::live::SharedState;
use lijo::prefs::ThemeManager;
use lijo::repository::TaskRepository;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn list_counts_follow_item_writes() {
    let (repo, clock) = test_repo();
    clock.set(10);
    let list = repo.create_list("Groceries", None, None).await.unwrap();

    let mut lists = repo.lists();
    let first = lists.next().await.unwrap();
    assert_eq!(first[0].item_count, 0);

    clock.set(100);
    repo.add_item(list, "Milk").await.unwrap();
    let second = timeout(WAIT, lists.next()).await.unwrap().unwrap();
    assert_eq!(second[0].item_count, 1);
}

#[tokio::test]
async fn toggling_moves_item_below_open_ones() {
    let (repo, clock) = test_repo();
    let list = repo.create_list("Groceries", None, None).await.unwrap();
    clock.set(100);
    let milk = repo.add_item(list, "Milk").await.unwrap();
    clock.set(200);
    repo.add_item(list, "Eggs").await.unwrap();

    let mut items = repo.items(list);
    let before = items.next().await.unwrap();
    assert_eq!(before[0].title, "Eggs");
    assert_eq!(before[1].title, "Milk");

    clock.set(300);
    let milk_item = repo.get_item(milk).await.unwrap().unwrap();
    let toggled = repo.toggle_item_completion(&milk_item).await.unwrap();
    assert_eq!(toggled.completed_at, Some(300));

    let after = timeout(WAIT, items.next()).await.unwrap().unwrap();
    assert_eq!(after[0].title, "Eggs");
    assert!(after[1].is_completed);
    assert_eq!(after[1].completed_at, Some(300));

    clock.set(400);
    repo.toggle_item_completion(&after[1]).await.unwrap();
    let reopened = timeout(WAIT, items.next()).await.unwrap().unwrap();
    assert_eq!(reopened[0].title, "Eggs", "newest open item first");
    assert_eq!(reopened[1].title, "Milk");
    assert_eq!(reopened[1].completed_at, None);
}

#[tokio::test]
async fn reorder_emits_final_order() {
    let (repo, clock) = test_repo();
    for (at, name) in [(3, "A"), (2, "B"), (1, "C")] {
        clock.set(at);
        repo.create_list(name, None, None).await.unwrap();
    }
    let mut lists = repo.lists();
    let initial = lists.next().await.unwrap();
    let names: Vec<&str> = initial.iter().map(|l| l.list.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);

    let current = repo.all_lists().await.unwrap();
    let ordered = vec![current[2].clone(), current[0].clone(), current[1].clone()];
    repo.reorder_lists(&ordered).await.unwrap();

    let reordered = timeout(WAIT, lists.next()).await.unwrap().unwrap();
    let summary: Vec<(&str, i32)> = reordered
        .iter()
        .map(|l| (l.list.name.as_str(), l.list.position))
        .collect();
    assert_eq!(summary, [("C", 0), ("A", 1), ("B", 2)]);
}

#[tokio::test]
async fn deleting_list_empties_its_item_view() {
    let (repo, _clock) = test_repo();
    let list_id = repo.create_list("Chores", None, None).await.unwrap();
    repo.add_item(list_id, "Sweep").await.unwrap();

    let mut items = repo.items(list_id);
    assert_eq!(items.next().await.unwrap().len(), 1);

    let list = repo.get_list(list_id).await.unwrap().unwrap();
    repo.delete_list(&list).await.unwrap();
    assert!(timeout(WAIT, items.next()).await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn shared_lists_reach_every_subscriber() {
    let (repo, _clock) = test_repo();
    let source = repo.clone();
    let shared = SharedState::new("lists", Vec::new(), Duration::from_millis(100), move || {
        source.lists()
    })
    .unwrap();

    let mut first = shared.subscribe();
    let mut second = shared.subscribe();
    assert_eq!(shared.subscriber_count(), 2);

    repo.create_list("Shared", None, None).await.unwrap();
    for sub in [&mut first, &mut second] {
        let lists = timeout(WAIT, sub.wait_for(|lists| !lists.is_empty()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lists[0].list.name, "Shared");
    }

    drop(first);
    drop(second);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!shared.is_active());
    assert_eq!(shared.value()[0].list.name, "Shared", "last value is kept");
}

#[tokio::test]
async fn data_survives_reopen() {
    let (store, dir) = test_store_with_dir();
    let repo = TaskRepository::new(store);
    let list = repo.create_list("Durable", Some(0xFF21_96F3), None).await.unwrap();
    repo.add_item(list, "Persist me").await.unwrap();
    drop(repo);

    let reopened = TaskRepository::new(
        lijo::storage::SqliteStore::open(&dir.path().join("data").join("lijo.db")).unwrap(),
    );
    let lists = reopened.lists().next().await.unwrap();
    assert_eq!(lists[0].list.name, "Durable");
    assert_eq!(lists[0].list.color, Some(0xFF21_96F3));
    assert_eq!(lists[0].item_count, 1);
}

#[tokio::test]
async fn theme_preference_is_shared_through_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preferences.json");

    let writer = ThemeManager::open(&path).unwrap();
    let mut watch = writer.watch_dark_mode();
    assert!(!watch.current());

    writer.set_dark_mode(true).unwrap();
    assert!(timeout(WAIT, watch.changed()).await.unwrap().unwrap());
    assert!(ThemeManager::open(&path).unwrap().is_dark_mode());
}
