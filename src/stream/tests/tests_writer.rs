//! Output stream tests: create/truncate, buffered writes, durable close.

use std::fs;
use std::io::Write;

use tempfile::TempDir;

use crate::stream::FileOutputStream;

#[test]
fn write_flush_close_commits_bytes() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.bin");

    let mut out = FileOutputStream::create(&path).unwrap();
    out.write_all(b"hello ").unwrap();
    out.write_all(b"world").unwrap();
    out.flush().unwrap();
    out.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"hello world");
}

#[test]
fn create_truncates_existing_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.bin");
    fs::write(&path, b"previous generation content").unwrap();

    let mut out = FileOutputStream::create(&path).unwrap();
    out.write_all(b"new").unwrap();
    out.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"new");
}
