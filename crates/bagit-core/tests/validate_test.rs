//! Loading and validating bags, including tampered ones.

use bagit_core::{
    make_bag, Bag, BagError, BuildOptions, ContentSource, ErrorKind, LocalSource,
    StructureViolation, ValidateOptions,
};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

async fn built_bag(algorithms: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", "hello");
    write(dir.path(), "b/b.txt", "world!");
    write(dir.path(), "c/d/e.txt", "more payload");
    let options = BuildOptions {
        algorithms: algorithms.iter().map(|s| s.to_string()).collect(),
        ..BuildOptions::default()
    };
    make_bag(dir.path(), &options).await.unwrap();
    dir
}

/// A bag written by hand, without going through the builder.
fn hand_made_bag(bagit: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bagit.txt", bagit);
    write(dir.path(), "data/a.txt", "hello");
    write(
        dir.path(),
        "manifest-md5.txt",
        "5d41402abc4b2a76b9719d911017c592  data/a.txt\n",
    );
    dir
}

#[tokio::test]
async fn built_bag_validates_sequentially_and_in_parallel() {
    let dir = built_bag(&["md5", "sha1"]).await;
    let bag = Bag::open(dir.path()).unwrap();
    bag.validate().unwrap();
    bag.validate_parallel(&ValidateOptions { processes: 3 })
        .await
        .unwrap();
    assert_eq!(bag.compare_manifests_with_fs().unwrap(), (vec![], vec![]));
}

#[tokio::test]
async fn missing_payload_dir_fails_structure() {
    let dir = built_bag(&["md5"]).await;
    fs::remove_dir_all(dir.path().join("data")).unwrap();
    let err = Bag::open(dir.path()).unwrap().validate().unwrap_err();
    assert_eq!(
        err.structure_violation(),
        Some(&StructureViolation::MissingPayloadDirectory)
    );
}

#[tokio::test]
async fn unrecognized_root_file_fails_until_removed() {
    let dir = built_bag(&["md5"]).await;
    write(dir.path(), "notes.txt", "stray");

    let err = Bag::open(dir.path()).unwrap().validate().unwrap_err();
    assert_eq!(
        err.structure_violation(),
        Some(&StructureViolation::ExtraTagFile("notes.txt".into()))
    );

    fs::remove_file(dir.path().join("notes.txt")).unwrap();
    Bag::open(dir.path()).unwrap().validate().unwrap();
}

#[tokio::test]
async fn extra_directory_and_tagmanifest() {
    let dir = built_bag(&["md5"]).await;
    write(dir.path(), "tagmanifest-md5.txt", "");
    Bag::open(dir.path()).unwrap().validate_structure().unwrap();

    fs::create_dir(dir.path().join("extras")).unwrap();
    let err = Bag::open(dir.path()).unwrap().validate().unwrap_err();
    assert_eq!(
        err.structure_violation(),
        Some(&StructureViolation::ExtraDirectory("extras".into()))
    );
}

#[tokio::test]
async fn one_mutated_byte_names_exactly_that_file_and_algorithm() {
    let dir = built_bag(&["sha256"]).await;
    // Same length, so the Oxum check still passes and the hash check runs.
    write(dir.path(), "data/b/b.txt", "world?");

    let err = Bag::open(dir.path()).unwrap().validate().unwrap_err();
    match err {
        BagError::ChecksumMismatch(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].path, "data/b/b.txt");
            assert_eq!(list[0].algorithm, "sha256");
        }
        other => panic!("expected checksum mismatch, got {other}"),
    }
}

#[tokio::test]
async fn every_mismatch_is_reported_together() {
    let dir = built_bag(&["md5", "sha1"]).await;
    write(dir.path(), "data/a.txt", "HELLO");
    write(dir.path(), "data/c/d/e.txt", "MORE PAYLOAD");

    let bag = Bag::open(dir.path()).unwrap();
    let err = bag
        .validate_parallel(&ValidateOptions { processes: 2 })
        .await
        .unwrap_err();
    match err {
        BagError::ChecksumMismatch(list) => {
            let pairs: Vec<_> = list
                .iter()
                .map(|m| (m.path.as_str(), m.algorithm.as_str()))
                .collect();
            assert_eq!(
                pairs,
                vec![
                    ("data/a.txt", "md5"),
                    ("data/a.txt", "sha1"),
                    ("data/c/d/e.txt", "md5"),
                    ("data/c/d/e.txt", "sha1"),
                ]
            );
        }
        other => panic!("expected checksum mismatch, got {other}"),
    }
}

#[tokio::test]
async fn oxum_mismatch_is_fatal() {
    let dir = built_bag(&["md5"]).await;
    write(dir.path(), "data/extra.txt", "undeclared");
    let bag = Bag::open(dir.path()).unwrap();
    let err = bag.validate().unwrap_err();
    assert!(matches!(
        err.structure_violation(),
        Some(StructureViolation::OxumMismatch { .. })
    ));
    assert_eq!(
        bag.compare_manifests_with_fs().unwrap(),
        (vec![], vec!["data/extra.txt".to_string()])
    );
}

#[tokio::test]
async fn deleted_payload_file_is_missing_payload() {
    let dir = built_bag(&["md5"]).await;
    // Drop the Oxum so the hash check is what notices.
    let info = fs::read_to_string(dir.path().join("bag-info.txt")).unwrap();
    let info: String = info
        .lines()
        .filter(|l| !l.starts_with("Payload-Oxum"))
        .map(|l| format!("{l}\n"))
        .collect();
    fs::write(dir.path().join("bag-info.txt"), info).unwrap();
    fs::remove_file(dir.path().join("data/a.txt")).unwrap();

    let bag = Bag::open(dir.path()).unwrap();
    assert!(!bag.has_oxum());
    let err = bag.validate().unwrap_err();
    assert!(matches!(err, BagError::MissingPayload(ref p) if p == "data/a.txt"));
    assert_eq!(err.kind(), ErrorKind::MissingPayload);
}

#[test]
fn only_unsupported_manifest_algorithm_fails() {
    let dir = hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: UTF-8\n");
    fs::rename(
        dir.path().join("manifest-md5.txt"),
        dir.path().join("manifest-whirlpool.txt"),
    )
    .unwrap();

    let bag = Bag::open(dir.path()).unwrap();
    assert!(bag.algorithms().contains("whirlpool"));
    bag.validate_structure().unwrap();
    let err = bag.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
}

#[test]
fn hand_made_bag_with_star_and_duplicates_loads() {
    let dir = hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: utf-8\n");
    write(
        dir.path(),
        "manifest-md5.txt",
        "ffffffffffffffffffffffffffffffff  data/a.txt\n\
         garbage\n\
         5D41402ABC4B2A76B9719D911017C592 *data/./a.txt\n",
    );
    let bag = Bag::open(dir.path()).unwrap();
    assert_eq!(bag.entries().len(), 1);
    assert_eq!(
        bag.entries()["data/a.txt"]["md5"],
        "5d41402abc4b2a76b9719d911017c592"
    );
    assert!(bag.info().is_empty());
    bag.validate().unwrap();
}

#[test]
fn declaration_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    assert_eq!(Bag::open(dir.path()).unwrap_err().kind(), ErrorKind::Format);

    let missing_encoding = hand_made_bag("BagIt-Version: 0.96\n");
    let err = Bag::open(missing_encoding.path()).unwrap_err();
    assert!(err.to_string().contains("Tag-File-Character-Encoding"));

    let bad_version =
        hand_made_bag("BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n");
    assert_eq!(Bag::open(bad_version.path()).unwrap_err().kind(), ErrorKind::Format);

    let bad_encoding =
        hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: ISO-8859-1\n");
    assert_eq!(Bag::open(bad_encoding.path()).unwrap_err().kind(), ErrorKind::Format);

    let not_a_dir = dir.path().join("data/file.txt");
    fs::write(&not_a_dir, "x").unwrap();
    assert_eq!(
        Bag::open(&not_a_dir).unwrap_err().kind(),
        ErrorKind::Configuration
    );
}

#[test]
fn malformed_oxum_is_format_error() {
    let dir = hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: UTF-8\n");
    write(dir.path(), "bag-info.txt", "Payload-Oxum: five.1\n");
    let err = Bag::open(dir.path()).unwrap().validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn folded_and_repeated_info_tags() {
    let dir = hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: UTF-8\n");
    write(
        dir.path(),
        "bag-info.txt",
        "External-Description: a long\n  description\nContact-Name: A\nContact-Name: B\n",
    );
    let bag = Bag::open(dir.path()).unwrap();
    assert_eq!(bag.info().get("External-Description"), Some("a long description"));
    assert_eq!(bag.info().get("Contact-Name"), Some("B"));
}

#[test]
fn fetch_entries_and_pending_files() {
    let dir = hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: UTF-8\n");
    write(
        dir.path(),
        "fetch.txt",
        "http://example.org/a.txt 5 data/a.txt\n\
         http://example.org/big%20file.bin - data/big file.bin\n",
    );
    let bag = Bag::open(dir.path()).unwrap();
    let entries = bag.fetch_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].size, None);
    assert_eq!(
        bag.urls_to_be_fetched().unwrap(),
        vec![
            "http://example.org/a.txt".to_string(),
            "http://example.org/big%20file.bin".to_string()
        ]
    );
    assert_eq!(
        bag.compare_fetch_with_fs().unwrap(),
        vec!["data/big file.bin".to_string()]
    );
    bag.validate().unwrap();
}

#[test]
fn manifest_paths_cannot_leave_the_bag() {
    let outer = tempfile::tempdir().unwrap();
    write(outer.path(), "secret.txt", "hello");
    let root = outer.path().join("bag");
    write(
        &root,
        "bagit.txt",
        "BagIt-Version: 0.96\nTag-File-Character-Encoding: UTF-8\n",
    );
    write(&root, "data/a.txt", "hello");
    write(
        &root,
        "manifest-md5.txt",
        "5d41402abc4b2a76b9719d911017c592  data/a.txt\n\
         5d41402abc4b2a76b9719d911017c592  data/../../secret.txt\n\
         5d41402abc4b2a76b9719d911017c592  /etc/passwd\n",
    );

    let bag = Bag::open(&root).unwrap();
    let paths: Vec<&String> = bag.entries().keys().collect();
    assert_eq!(paths, vec!["data/a.txt"]);
    bag.validate().unwrap();
}

#[test]
fn manifest_line_that_is_not_utf8_is_skipped() {
    let dir = hand_made_bag("BagIt-Version: 0.96\nTag-File-Character-Encoding: UTF-8\n");
    fs::write(
        dir.path().join("manifest-md5.txt"),
        b"5d41402abc4b2a76b9719d911017c592  data/a.txt\ngarbage \xff\xfe\n",
    )
    .unwrap();
    let bag = Bag::open(dir.path()).unwrap();
    assert_eq!(bag.entries().len(), 1);
    bag.validate().unwrap();
}

/// Records every path read through it.
#[derive(Debug)]
struct RecordingSource {
    inner: LocalSource,
    opened: Mutex<Vec<String>>,
}

impl ContentSource for RecordingSource {
    fn open(&self, rel_path: &str) -> io::Result<Box<dyn Read + Send>> {
        self.opened.lock().unwrap().push(rel_path.to_string());
        self.inner.open(rel_path)
    }

    fn is_file(&self, rel_path: &str) -> bool {
        self.inner.is_file(rel_path)
    }

    fn describe(&self, rel_path: &str) -> PathBuf {
        self.inner.describe(rel_path)
    }
}

#[tokio::test]
async fn content_is_read_through_the_given_source() {
    let dir = built_bag(&["md5"]).await;
    let source = Arc::new(RecordingSource {
        inner: LocalSource::new(dir.path()),
        opened: Mutex::new(Vec::new()),
    });
    let bag = Bag::open_with(dir.path(), source.clone()).unwrap();
    bag.validate_parallel(&ValidateOptions { processes: 2 })
        .await
        .unwrap();

    let opened = source.opened.lock().unwrap().clone();
    for rel in ["bagit.txt", "manifest-md5.txt", "data/a.txt", "data/b/b.txt", "data/c/d/e.txt"] {
        assert!(opened.iter().any(|p| p == rel), "{rel} not read: {opened:?}");
    }
}
