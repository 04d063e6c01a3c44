mod support;

use std::fs;
use std::io::Write;

use assert_matches::assert_matches;
use zip::write::SimpleFileOptions;

use reshake::archive::{expand_gzip, extract_zip, find_files, validate_zip};
use reshake::domain::Outcome;
use reshake::error::ReshakeError;

use support::{RecordingSink, gzip};

#[test]
fn gzip_expands_next_to_archive() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("PRIDE_Exp_Complete_Ac_1.xml.gz");
    let destination = temp.path().join("PRIDE_Exp_Complete_Ac_1.xml");
    let content = b"<ExperimentCollection/>".repeat(200);
    fs::write(&archive, gzip(&content)).unwrap();
    let sink = RecordingSink::new();

    let outcome = expand_gzip(&archive, &destination, &sink).unwrap();

    assert_eq!(outcome, Outcome::Done(destination.clone()));
    assert_eq!(fs::read(&destination).unwrap(), content);
    let total = content.len() as u64;
    assert_eq!(
        sink.progress.lock().unwrap().last(),
        Some(&(total, Some(total)))
    );
}

#[test]
fn gzip_overwrites_stale_output() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("a.mgf.gz");
    let destination = temp.path().join("a.mgf");
    fs::write(&destination, "stale and much longer than the new content").unwrap();
    fs::write(&archive, gzip(b"fresh")).unwrap();

    expand_gzip(&archive, &destination, &RecordingSink::new()).unwrap();

    assert_eq!(fs::read_to_string(&destination).unwrap(), "fresh");
}

#[test]
fn canceled_gzip_removes_partial_output() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("big.xml.gz");
    let destination = temp.path().join("big.xml");
    fs::write(&archive, gzip(&vec![b'z'; 64 * 1024])).unwrap();

    let outcome = expand_gzip(
        &archive,
        &destination,
        &RecordingSink::canceling_after(1),
    )
    .unwrap();

    assert_eq!(outcome, Outcome::Canceled);
    assert!(!destination.exists());
}

#[test]
fn corrupt_gzip_is_archive_error() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("broken.xml.gz");
    let destination = temp.path().join("broken.xml");
    fs::write(&archive, b"definitely not gzip").unwrap();

    let err = expand_gzip(&archive, &destination, &RecordingSink::new()).unwrap_err();

    assert_matches!(err, ReshakeError::Archive(_));
    assert!(!destination.exists());
}

#[test]
fn zip_entries_extract_and_are_found() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("peaks.zip");
    {
        let file = fs::File::create(&archive).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer.add_directory("run1/", options).unwrap();
        writer.start_file("run1/b.mgf", options).unwrap();
        writer.write_all(b"BEGIN IONS\nEND IONS\n").unwrap();
        writer.start_file("a.mgf", options).unwrap();
        writer.write_all(b"BEGIN IONS\nEND IONS\n").unwrap();
        writer.start_file("readme.txt", options).unwrap();
        writer.write_all(b"notes").unwrap();
        writer.finish().unwrap();
    }
    let target = temp.path().join("peaks_extracted");

    assert_eq!(validate_zip(&archive).unwrap(), 3);
    extract_zip(&archive, &target).unwrap();

    let found = find_files(&target, |name| name.ends_with(".mgf"));
    assert_eq!(found, vec![target.join("a.mgf"), target.join("run1/b.mgf")]);
}

#[test]
fn invalid_zip_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("broken.zip");
    fs::write(&archive, b"PK not really").unwrap();

    assert_matches!(validate_zip(&archive), Err(ReshakeError::Archive(_)));
}
