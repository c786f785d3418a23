//! CLI contract tests for filebind argument handling and error mapping.

use std::fs;

use filebind::config::Config;
use filebind::coordinator::BindingCoordinator;
use filebind::watch::FsEvent;
use filebind::Error;
use tempfile::tempdir;

fn expect_error(args: &[&str]) -> anyhow::Error {
    filebind::run(args.iter().copied()).expect_err("command should fail")
}

#[test]
fn clap_definition_is_consistent() {
    let cmd = filebind::cli::clap_command();
    cmd.clone().debug_assert();
    let names: Vec<_> = cmd.get_subcommands().map(|s| s.get_name().to_string()).collect();
    for expected in ["watch", "restore", "prune", "bindings"] {
        assert!(names.iter().any(|n| n == expected), "missing subcommand {expected}");
    }
}

#[test]
fn missing_root_is_a_cli_error() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let err = expect_error(&["filebind", "restore", "--root", missing.to_str().unwrap()]);
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Cli(_))));
}

#[test]
fn restore_lists_and_rejects_unknown_ids() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().to_str().unwrap();

    filebind::run(["filebind", "restore", "--root", root]).expect("listing an empty ledger");

    let err = expect_error(&["filebind", "restore", "20000101_000000_000000", "--root", root]);
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
}

#[test]
fn restore_by_id_brings_partner_back() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let config = Config::new(tmp.path())?;
    let source = config.root.join("report_img/fig1.png");
    fs::create_dir_all(source.parent().unwrap())?;
    fs::write(&source, b"png")?;

    let id = {
        let mut coord = BindingCoordinator::open(&config)?;
        let alias = coord.bind(&source, &config.alias_dir.join("fig1.png"))?;
        fs::remove_file(&alias)?;
        coord.handle(&FsEvent::removed(&alias));
        let newest = coord
            .ledger()
            .entries_newest_first()
            .next()
            .expect("entry recorded")
            .id
            .clone();
        newest
    };
    assert!(!source.exists());

    let listing = filebind::cli::restore::format_listing(BindingCoordinator::open(&config)?.ledger());
    assert!(listing.contains(&id));
    assert!(listing.contains("fig1.png"));

    filebind::run(["filebind", "restore", id.as_str(), "--root", config.root.to_str().unwrap()])?;
    assert!(source.exists());
    Ok(())
}

#[test]
fn corrupt_documents_fail_startup_with_validation_error() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("file_bindings.json"), b"not json").unwrap();
    let root = tmp.path().to_str().unwrap();

    let err = expect_error(&["filebind", "bindings", "--root", root]);
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation { .. })));

    let err = expect_error(&["filebind", "prune", "--root", root]);
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation { .. })));
}

#[test]
fn prune_with_zero_days_purges_everything() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let config = Config::new(tmp.path())?;
    let source = config.root.join("deck_tables/t.csv");
    fs::create_dir_all(source.parent().unwrap())?;
    fs::write(&source, b"a,b")?;

    {
        let mut coord = BindingCoordinator::open(&config)?;
        let alias = coord.bind(&source, &config.alias_dir.join("t.csv"))?;
        fs::remove_file(&alias)?;
        coord.handle(&FsEvent::removed(&alias));
        assert_eq!(1, coord.ledger().len());
    }

    filebind::run([
        "filebind",
        "prune",
        "--days",
        "0",
        "--root",
        config.root.to_str().unwrap(),
    ])?;

    let coord = BindingCoordinator::open(&config)?;
    assert!(coord.ledger().is_empty());
    assert!(coord.bindings().is_empty());
    assert!(!source.exists());
    Ok(())
}
