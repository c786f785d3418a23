use std::fs;
use std::path::Path;

use filebind::trash::TrashVault;
use filebind::Error;
use tempfile::tempdir;

fn write(path: &Path, body: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn soft_delete_keeps_relative_layout_under_token() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().canonicalize()?;
    let file = root.join("report_img/fig1.png");
    write(&file, b"png");

    let vault = TrashVault::open(&root, root.join(".binding_trash"))?;
    let trashed = vault.soft_delete(&file)?;

    assert!(!file.exists());
    assert_eq!(
        root.join(".binding_trash")
            .join(&trashed.token)
            .join("report_img/fig1.png"),
        trashed.trash_path
    );
    assert_eq!(b"png".to_vec(), fs::read(&trashed.trash_path)?);
    assert!(vault.contains(&trashed.trash_path));
    Ok(())
}

#[test]
fn tokens_are_unique_for_back_to_back_deletes() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().canonicalize()?;
    let vault = TrashVault::open(&root, root.join(".binding_trash"))?;

    let mut tokens = Vec::new();
    for i in 0..5 {
        let file = root.join(format!("f{i}.txt"));
        write(&file, b"x");
        tokens.push(vault.soft_delete(&file)?.token);
    }
    let mut sorted = tokens.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(tokens.len(), sorted.len());
    Ok(())
}

#[test]
fn soft_delete_of_missing_file_is_io_error() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let vault = TrashVault::open(&root, root.join(".binding_trash")).unwrap();

    let err = vault
        .soft_delete(&root.join("gone.png"))
        .expect_err("missing source must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Io(_))));
    assert!(filebind::is_not_found(&err));
    assert_eq!(
        0,
        fs::read_dir(root.join(".binding_trash")).unwrap().count()
    );
}

#[test]
fn restore_moves_back_and_clears_token_dir() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().canonicalize()?;
    let file = root.join("report_img/fig1.png");
    write(&file, b"png");
    let vault = TrashVault::open(&root, root.join(".binding_trash"))?;
    let trashed = vault.soft_delete(&file)?;
    fs::remove_dir(root.join("report_img"))?;

    vault.restore(&trashed.trash_path, &file)?;

    assert_eq!(b"png".to_vec(), fs::read(&file)?);
    assert!(!root.join(".binding_trash").join(&trashed.token).exists());
    assert!(root.join(".binding_trash").exists());
    Ok(())
}

#[test]
fn restore_never_overwrites() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().canonicalize()?;
    let file = root.join("a.txt");
    write(&file, b"old");
    let vault = TrashVault::open(&root, root.join(".binding_trash"))?;
    let trashed = vault.soft_delete(&file)?;
    write(&file, b"new");

    let err = vault
        .restore(&trashed.trash_path, &file)
        .expect_err("occupied target must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Race(_))));
    assert_eq!(b"new".to_vec(), fs::read(&file)?);
    assert!(trashed.trash_path.exists());
    Ok(())
}

#[test]
fn restore_of_missing_trash_file_is_not_found() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().canonicalize()?;
    let vault = TrashVault::open(&root, root.join(".binding_trash"))?;

    let err = vault
        .restore(&root.join(".binding_trash/t/a.txt"), &root.join("a.txt"))
        .expect_err("missing trash file must fail");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
    Ok(())
}

#[test]
fn purge_tolerates_missing_files_and_refuses_outside_paths() -> filebind::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().canonicalize()?;
    let file = root.join("a.txt");
    write(&file, b"x");
    let vault = TrashVault::open(&root, root.join(".binding_trash"))?;
    let trashed = vault.soft_delete(&file)?;

    vault.purge(&trashed.trash_path)?;
    assert!(!trashed.trash_path.exists());
    assert!(!root.join(".binding_trash").join(&trashed.token).exists());
    vault.purge(&trashed.trash_path)?;

    write(&file, b"keep");
    let err = vault.purge(&file).expect_err("outside path must be refused");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Race(_))));
    assert!(file.exists());
    Ok(())
}
