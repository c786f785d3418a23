use std::fs;

use chrono::{Duration, TimeZone, Utc};
use filebind::trash::DeletionLedger;
use filebind::Error;
use tempfile::tempdir;

#[test]
fn records_persist_and_reload() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let vault = tmp.path().canonicalize()?.join(".binding_trash");
    let ledger_path = vault.join("trash_info.json");

    let mut ledger = DeletionLedger::load(&ledger_path)?;
    let id = ledger.record_deletion(
        &tmp.path().join("alias/fig1.png"),
        &tmp.path().join("report_img/fig1.png"),
        "tok",
        &vault.join("tok/report_img/fig1.png"),
    )?;

    let reloaded = DeletionLedger::load(&ledger_path)?;
    let entry = reloaded.get(&id).expect("entry persisted");
    assert_eq!(id, entry.id);
    assert_eq!("tok", entry.trash_token);
    assert_eq!(vault.join("tok/report_img/fig1.png"), entry.trash_path);
    Ok(())
}

#[test]
fn find_by_deleted_path_prefers_highest_id() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let vault = tmp.path().canonicalize()?.join(".binding_trash");
    let mut ledger = DeletionLedger::load(vault.join("trash_info.json"))?;
    let deleted = tmp.path().join("alias/fig1.png");
    let bound = tmp.path().join("report_img/fig1.png");

    let old_at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    let older = ledger.record_deletion_at(&deleted, &bound, "a", &vault.join("a/x"), old_at)?;
    let newer = ledger.record_deletion_at(
        &deleted,
        &bound,
        "b",
        &vault.join("b/x"),
        old_at + Duration::seconds(5),
    )?;

    assert!(newer > older);
    let found = ledger.find_by_deleted_path(&deleted).expect("entry");
    assert_eq!(newer, found.id);
    assert_eq!(newer, ledger.find_by_bound_path(&bound).unwrap().id);
    assert!(ledger.find_by_deleted_path(&bound).is_none());

    let ids: Vec<_> = ledger.entries_newest_first().map(|e| e.id.clone()).collect();
    assert_eq!(vec![newer.clone(), older.clone()], ids);

    ledger.remove(&newer)?;
    assert_eq!(older, ledger.find_by_deleted_path(&deleted).unwrap().id);
    assert!(ledger.remove(&newer)?.is_none());
    Ok(())
}

#[test]
fn created_before_uses_strict_cutoff() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let vault = tmp.path().canonicalize()?.join(".binding_trash");
    let mut ledger = DeletionLedger::load(vault.join("trash_info.json"))?;
    let at = Utc.with_ymd_and_hms(2026, 5, 5, 0, 0, 0).unwrap();
    let id = ledger.record_deletion_at(
        &tmp.path().join("a"),
        &tmp.path().join("b"),
        "t",
        &vault.join("t/b"),
        at,
    )?;

    assert!(ledger.created_before(at).is_empty());
    let due = ledger.created_before(at + Duration::seconds(1));
    assert_eq!(1, due.len());
    assert_eq!(id, due[0].id);
    Ok(())
}

#[test]
fn load_rejects_malformed_ledger() {
    let tmp = tempdir().unwrap();
    let vault = tmp.path().join(".binding_trash");
    fs::create_dir_all(&vault).unwrap();
    let path = vault.join("trash_info.json");

    fs::write(&path, b"[1, 2, 3]").unwrap();
    let err = DeletionLedger::load(&path).expect_err("wrong shape must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation { .. })));

    let entry = serde_json::json!({
        "id": "20260101_000000_000000",
        "deleted_file": "/w/alias/a.png",
        "bound_file": "/w/img/a.png",
        "trash_token": "t",
        "trash_path": "/elsewhere/t/img/a.png",
        "created_at": "2026-01-01T00:00:00Z"
    });
    fs::write(
        &path,
        serde_json::to_vec(&serde_json::json!({
            "version": 1,
            "entries": { "20260101_000000_000000": entry }
        }))
        .unwrap(),
    )
    .unwrap();
    let err = DeletionLedger::load(&path).expect_err("trash outside vault must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation { .. })));

    fs::write(
        &path,
        serde_json::to_vec(&serde_json::json!({
            "version": 1,
            "entries": { "other-key": entry }
        }))
        .unwrap(),
    )
    .unwrap();
    let err = DeletionLedger::load(&path).expect_err("mismatched key must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation { .. })));
}

#[test]
fn superseded_entries_leave_lookups_and_persist() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let vault = tmp.path().canonicalize()?.join(".binding_trash");
    let ledger_path = vault.join("trash_info.json");
    let mut ledger = DeletionLedger::load(&ledger_path)?;
    let deleted = tmp.path().join("alias/fig1.png");
    let bound = tmp.path().join("report_img/fig1.png");

    let id = ledger.record_deletion(&deleted, &bound, "a", &vault.join("a/x"))?;
    assert!(ledger.is_pending(&bound));

    assert!(ledger.supersede(&id)?);
    assert!(!ledger.supersede(&id)?);
    assert!(!ledger.supersede("unknown")?);
    assert!(ledger.find_by_deleted_path(&deleted).is_none());
    assert!(ledger.find_by_bound_path(&bound).is_none());
    assert!(!ledger.is_pending(&deleted));
    assert_eq!(0, ledger.live_entries().count());

    let reloaded = DeletionLedger::load(&ledger_path)?;
    assert_eq!(1, reloaded.len());
    assert!(!reloaded.get(&id).expect("entry persisted").is_live());
    assert!(reloaded.find_by_deleted_path(&deleted).is_none());
    Ok(())
}
