mod common;

use std::sync::Arc;

use chef_common::error::ChefError;
use chef_common::model::InstallKind;
use chef_common::{ChefEvent, CheckStatus};
use chef_core::{InstallOutcome, Recipe, UpdateOptions};
use common::{BrokenDesktop, Kitchen, Output, TestRecipe};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn all() -> UpdateOptions {
    UpdateOptions::default()
}

#[tokio::test]
async fn hello_installs_then_uninstalls() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let hello = TestRecipe::new("hello", Some("1.0.0"), Output::Exe);
    let chef = kitchen.chef(vec![hello.clone() as Arc<dyn Recipe>]);
    let token = CancellationToken::new();

    let report = chef.update(&all(), &token).await.unwrap();
    assert_eq!((report.updated, report.failed), (1, 0));
    assert_eq!(kitchen.store_json(), json!({"hello": {"version": "1.0.0"}}));
    let binary = kitchen.config.binary_path("hello");
    assert!(binary.is_file());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&binary).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }

    chef.uninstall("hello", &token).await.unwrap();
    assert!(!binary.exists());
    assert_eq!(kitchen.store_json(), json!({}));
}

#[tokio::test]
async fn second_update_leaves_store_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let a = TestRecipe::new("a", Some("1"), Output::Exe);
    let b = TestRecipe::new("b", Some("2"), Output::Dir);
    let chef = kitchen.chef(vec![a.clone() as Arc<dyn Recipe>, b.clone()]);
    let token = CancellationToken::new();

    chef.update(&all(), &token).await.unwrap();
    let first = kitchen.store_bytes().unwrap();

    let report = chef.update(&all(), &token).await.unwrap();
    assert_eq!(report.updated, 0);
    assert!(report.rows.iter().all(|r| r.status == CheckStatus::UpToDate));
    assert_eq!(kitchen.store_bytes().unwrap(), first);
    assert_eq!((a.download_count(), b.download_count()), (1, 1));
}

#[tokio::test]
async fn kind_changes_leave_exactly_one_marker() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let tool = TestRecipe::new("tool", Some("1"), Output::Dir);
    let chef = kitchen.chef(vec![tool.clone() as Arc<dyn Recipe>]);
    let token = CancellationToken::new();

    chef.update(&all(), &token).await.unwrap();
    assert_eq!(kitchen.store_json(), json!({"tool": {"version": "1", "dir": "tool"}}));
    assert!(kitchen.config.app_dir_path("tool").is_dir());

    tool.set_latest("2");
    tool.set_output(Output::Extern("tool-cli".into()));
    chef.update(&all(), &token).await.unwrap();
    assert_eq!(
        kitchen.store_json(),
        json!({"tool": {"version": "2", "extern": "tool-cli"}})
    );
    assert!(!kitchen.config.app_dir_path("tool").exists());
    assert!(kitchen.config.binary_path("tool").symlink_metadata().is_err());

    tool.set_latest("3");
    tool.set_output(Output::Exe);
    chef.update(&all(), &token).await.unwrap();
    let entry = chef.store().get_entry("tool").await.unwrap().unwrap();
    assert_eq!(entry.kind, InstallKind::File);
    assert_eq!(kitchen.store_json(), json!({"tool": {"version": "3"}}));
}

#[tokio::test]
async fn one_failing_download_does_not_block_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let good1 = TestRecipe::new("good1", Some("1"), Output::Exe);
    let bad = TestRecipe::new("bad", Some("5"), Output::Fail);
    let good2 = TestRecipe::new("good2", Some("1"), Output::Exe);
    let chef = kitchen.chef(vec![
        good1.clone() as Arc<dyn Recipe>,
        bad.clone(),
        good2.clone(),
    ]);
    let token = CancellationToken::new();
    chef.store()
        .set_entry("bad", chef_common::StoreEntry::file("4"))
        .await
        .unwrap();

    let report = chef.update(&all(), &token).await.unwrap();
    assert_eq!((report.updated, report.failed), (2, 1));
    let bad_row = report.rows.iter().find(|r| r.name == "bad").unwrap();
    assert!(matches!(bad_row.outcome, Some(InstallOutcome::Failed(_))));
    assert_eq!(
        kitchen.store_json(),
        json!({"bad": {"version": "4"}, "good1": {"version": "1"}, "good2": {"version": "1"}})
    );
}

#[tokio::test]
async fn failing_launcher_entry_still_records_the_install() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let hello = TestRecipe::new("hello", Some("1.0.0"), Output::Exe);
    hello.set_desktop(chef_common::model::DesktopFile::default());
    let desktop = Arc::new(BrokenDesktop::default());
    let chef = kitchen.chef_with_desktop(vec![hello.clone() as Arc<dyn Recipe>], desktop.clone());

    let report = chef.update(&all(), &CancellationToken::new()).await.unwrap();
    assert_eq!((report.updated, report.failed), (1, 0));
    assert_eq!(desktop.attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(kitchen.store_json(), json!({"hello": {"version": "1.0.0"}}));
    assert!(kitchen.config.binary_path("hello").exists());
}

#[tokio::test]
async fn failing_post_install_keeps_the_previous_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let hello = TestRecipe::new("hello", Some("1.0.0"), Output::Exe);
    let chef = kitchen.chef(vec![hello.clone() as Arc<dyn Recipe>]);
    let token = CancellationToken::new();
    chef.update(&all(), &token).await.unwrap();
    let before = kitchen.store_bytes();

    hello.set_latest("2.0.0");
    hello.set_post_install_fails(true);
    let report = chef.update(&all(), &token).await.unwrap();

    assert_eq!((report.updated, report.failed), (0, 1));
    let row = report.rows.iter().find(|r| r.name == "hello").unwrap();
    assert!(matches!(row.outcome, Some(InstallOutcome::Failed(ref reason)) if reason.contains("post-install")));
    assert_eq!(kitchen.store_bytes(), before);
    assert_eq!(kitchen.store_json(), json!({"hello": {"version": "1.0.0"}}));
}

#[tokio::test]
async fn extern_installs_skip_the_post_install_hook() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let local = TestRecipe::new("local", Some("1"), Output::Exe);
    let remote = TestRecipe::new("remote", Some("1"), Output::Extern("remote-cli".into()));
    let chef = kitchen.chef(vec![local.clone() as Arc<dyn Recipe>, remote.clone()]);

    let report = chef.update(&all(), &CancellationToken::new()).await.unwrap();
    assert_eq!((report.updated, report.failed), (2, 0));
    assert_eq!(local.post_install_count(), 1);
    assert_eq!(remote.post_install_count(), 0);
    assert_eq!(
        kitchen.store_json()["remote"],
        json!({"version": "1", "extern": "remote-cli"})
    );
}

#[tokio::test]
async fn stale_entries_are_hidden_without_crashing() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    std::fs::create_dir_all(kitchen.config.chef_root()).unwrap();
    std::fs::write(
        kitchen.config.store_path(),
        json!({"gone": {"version": "1"}, "hello": "0.9", "_settings": {"editor": "vi"}}).to_string(),
    )
    .unwrap();
    let chef = kitchen.chef(vec![TestRecipe::new("hello", Some("1"), Output::Exe) as Arc<dyn Recipe>]);

    let entries = chef.store().read_all().await.unwrap();
    assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["hello"]);
    assert_eq!(chef.get_setting("editor").await.unwrap().as_deref(), Some("vi"));
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let hello = TestRecipe::new("hello", Some("2"), Output::Exe);
    let chef = kitchen.chef(vec![hello.clone() as Arc<dyn Recipe>]);
    chef.store()
        .set_entry("hello", chef_common::StoreEntry::file("1"))
        .await
        .unwrap();
    let before = kitchen.store_bytes().unwrap();

    let options = UpdateOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = chef.update(&options, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.pending().count(), 1);
    assert_eq!(hello.download_count(), 0);
    assert_eq!(kitchen.store_bytes().unwrap(), before);
}

#[tokio::test]
async fn cancelling_after_first_install_stops_the_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let token = CancellationToken::new();
    let first = TestRecipe::cancelling("first", "1", token.clone());
    let second = TestRecipe::new("second", Some("1"), Output::Exe);
    let third = TestRecipe::new("third", Some("1"), Output::Exe);
    let chef = kitchen.chef(vec![
        first.clone() as Arc<dyn Recipe>,
        second.clone(),
        third.clone(),
    ]);
    let mut events = chef.subscribe();

    let report = chef.update(&all(), &token).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.updated, 1);
    assert_eq!((second.download_count(), third.download_count()), (0, 0));
    assert_eq!(kitchen.store_json(), json!({"first": {"version": "1"}}));
    assert!(report
        .rows
        .iter()
        .filter(|r| r.name != "first")
        .all(|r| r.outcome == Some(InstallOutcome::NotStarted)));

    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ChefEvent::InstallFinished { .. }) {
            finished += 1;
        }
    }
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn typo_in_targets_aborts_before_any_download() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    let hello = TestRecipe::new("hello", Some("1"), Output::Exe);
    let chef = kitchen.chef(vec![hello.clone() as Arc<dyn Recipe>]);
    let options = UpdateOptions {
        targets: vec!["hello".into(), "helo".into()],
        ..Default::default()
    };

    let err = chef.update(&options, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ChefError::UnknownRecipe(_)));
    assert_eq!(hello.download_count(), 0);
    assert!(kitchen.store_bytes().is_none());
}

#[tokio::test]
async fn corrupt_store_aborts_update() {
    let tmp = tempfile::tempdir().unwrap();
    let kitchen = Kitchen::new(tmp.path());
    std::fs::create_dir_all(kitchen.config.chef_root()).unwrap();
    std::fs::write(kitchen.config.store_path(), b"{ not json").unwrap();
    let hello = TestRecipe::new("hello", Some("1"), Output::Exe);
    let chef = kitchen.chef(vec![hello.clone() as Arc<dyn Recipe>]);

    let err = chef.update(&all(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ChefError::StoreCorrupt { .. }));
    assert_eq!(hello.download_count(), 0);
    assert_eq!(kitchen.store_bytes().unwrap(), b"{ not json");
}
