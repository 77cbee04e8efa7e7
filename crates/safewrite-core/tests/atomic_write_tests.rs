//! Integration tests for atomic writes on the host filesystem

use safewrite_core::config::DEFAULT_STAGING_PREFIX;
use safewrite_core::io::{AtomicWriter, WriteError, WriteErrorKind, verify_parent_safe, write_atomic};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a temp dir whose path contains no symlinks
fn canonical_temp() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    (temp_dir, root)
}

/// Helper to list staging files left in a directory
fn staging_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(DEFAULT_STAGING_PREFIX))
        .collect()
}

#[cfg(unix)]
fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[test]
fn test_fresh_write_then_overwrite() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("out.txt");

    write_atomic(&dest, b"hello\n", 0o640, true).unwrap();
    assert_eq!(fs::read(&dest).unwrap(), b"hello\n");

    write_atomic(&dest, b"changed", 0o600, true).unwrap();
    assert_eq!(fs::read(&dest).unwrap(), b"changed");

    #[cfg(unix)]
    assert_eq!(mode_of(&dest), 0o600);

    assert!(staging_files(&root).is_empty());
}

#[test]
fn test_no_overwrite_keeps_existing_content() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("exists.txt");
    fs::write(&dest, b"OLD").unwrap();

    let err = write_atomic(&dest, b"SHOULD-NOT-WRITE", 0o600, false).unwrap_err();

    assert!(err.is_already_exists());
    assert_eq!(err.path(), dest.as_path());
    assert_eq!(fs::read(&dest).unwrap(), b"OLD");
    assert!(staging_files(&root).is_empty());
}

#[test]
fn test_directory_destination_is_rejected_both_ways() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("adir");
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("inner.txt"), b"inner").unwrap();

    for overwrite in [true, false] {
        let err = write_atomic(&dest, b"x", 0o600, overwrite).unwrap_err();
        assert_eq!(err.kind(), WriteErrorKind::DestinationIsDirectory);
        assert!(err.to_string().contains("directory"));
    }

    assert!(dest.is_dir());
    assert_eq!(fs::read(dest.join("inner.txt")).unwrap(), b"inner");
    assert!(staging_files(&root).is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlinked_parent_is_rejected_without_side_effects() {
    let (_temp_dir, root) = canonical_temp();
    let real = root.join("real");
    fs::create_dir(&real).unwrap();
    let link = root.join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let err = write_atomic(link.join("x.txt"), b"nope", 0o600, true).unwrap_err();

    match &err {
        WriteError::SymlinkInParent { component, .. } => assert_eq!(component, &link),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("symlink path component"));
    assert!(!real.join("x.txt").exists());
    assert!(fs::read_dir(&real).unwrap().next().is_none());
}

#[cfg(unix)]
#[test]
fn test_symlink_deep_in_chain_is_rejected() {
    let (_temp_dir, root) = canonical_temp();
    let real = root.join("real");
    fs::create_dir_all(real.join("a").join("b")).unwrap();
    let link = root.join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let dest = link.join("a").join("b").join("x.txt");
    let err = verify_parent_safe(&dest).unwrap_err();
    assert_eq!(err.kind(), WriteErrorKind::SymlinkInParent);

    assert!(write_atomic(&dest, b"nope", 0o600, false).is_err());
    assert!(!real.join("a").join("b").join("x.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_symlink_destination_is_replaced_not_followed() {
    let (_temp_dir, root) = canonical_temp();
    let target = root.join("target.txt");
    fs::write(&target, b"TARGET").unwrap();
    let dest = root.join("alias.txt");
    std::os::unix::fs::symlink(&target, &dest).unwrap();

    write_atomic(&dest, b"replaced", 0o644, true).unwrap();

    assert!(!fs::symlink_metadata(&dest).unwrap().file_type().is_symlink());
    assert_eq!(fs::read(&dest).unwrap(), b"replaced");
    assert_eq!(fs::read(&target).unwrap(), b"TARGET");
}

#[cfg(unix)]
#[test]
fn test_symlink_destination_counts_as_existing() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("dangling.txt");
    std::os::unix::fs::symlink(root.join("nowhere"), &dest).unwrap();

    let err = write_atomic(&dest, b"x", 0o600, false).unwrap_err();

    assert!(err.is_already_exists());
    assert!(!root.join("nowhere").exists());
}

#[cfg(unix)]
#[test]
fn test_fifo_destination_is_invalid_type() {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("pipe");
    let c_path = CString::new(dest.as_os_str().as_bytes()).unwrap();
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    assert_eq!(rc, 0);

    for overwrite in [true, false] {
        let err = write_atomic(&dest, b"x", 0o600, overwrite).unwrap_err();
        assert_eq!(err.kind(), WriteErrorKind::InvalidDestinationType);
    }
    assert!(staging_files(&root).is_empty());
}

#[test]
fn test_no_overwrite_creates_with_full_content() {
    let (_temp_dir, root) = canonical_temp();
    let payloads: [&[u8]; 4] = [b"", b"a", b"line one\nline two\n", &[0u8, 255, 10, 13, 0]];

    for (i, payload) in payloads.iter().enumerate() {
        let dest = root.join(format!("file-{i}.bin"));
        write_atomic(&dest, payload, 0o600, false).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), *payload);
    }

    let large: Vec<u8> = (0..(3 * 1024 * 1024)).map(|i| (i % 251) as u8).collect();
    let dest = root.join("large.bin");
    write_atomic(&dest, &large, 0o600, false).unwrap();
    assert_eq!(fs::read(&dest).unwrap(), large);

    assert!(staging_files(&root).is_empty());
}

#[test]
fn test_repeated_overwrite_is_idempotent() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("same.txt");

    write_atomic(&dest, b"stable", 0o640, true).unwrap();
    let first = fs::read(&dest).unwrap();
    #[cfg(unix)]
    let first_mode = mode_of(&dest);

    write_atomic(&dest, b"stable", 0o640, true).unwrap();

    assert_eq!(fs::read(&dest).unwrap(), first);
    #[cfg(unix)]
    assert_eq!(mode_of(&dest), first_mode);
}

#[cfg(unix)]
#[test]
fn test_mode_applies_to_new_file_through_hard_link() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("private.txt");

    write_atomic(&dest, b"secret", 0o600, false).unwrap();

    assert_eq!(mode_of(&dest), 0o600);
}

#[test]
fn test_missing_parent_directory_fails_cleanly() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("missing").join("deeper").join("x.txt");

    let err = write_atomic(&dest, b"x", 0o600, true).unwrap_err();

    assert_eq!(err.kind(), WriteErrorKind::Io);
    assert!(!root.join("missing").exists());
}

#[test]
fn test_invalid_paths_are_rejected() {
    for bad in ["", "   ", "bad\0name"] {
        let err = write_atomic(bad, b"x", 0o600, true).unwrap_err();
        assert_eq!(err.kind(), WriteErrorKind::InvalidPath, "path {bad:?}");
    }
}

#[test]
fn test_write_error_converts_to_io_error() {
    let (_temp_dir, root) = canonical_temp();
    let dest = root.join("exists.txt");
    fs::write(&dest, b"OLD").unwrap();

    let err: std::io::Error = write_atomic(&dest, b"new", 0o600, false)
        .unwrap_err()
        .into();

    assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
}

#[test]
fn test_writer_without_dir_sync_still_commits() {
    let (_temp_dir, root) = canonical_temp();
    let config = safewrite_core::CommitConfig {
        sync_parent_dir: false,
        ..Default::default()
    };
    let writer = AtomicWriter::new().with_config(config).unwrap();
    let dest = root.join("nosync.txt");

    writer.write(&dest, b"ok", 0o644, true).unwrap();

    assert_eq!(fs::read(&dest).unwrap(), b"ok");
}
