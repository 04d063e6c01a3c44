mod support;

use assert_matches::assert_matches;

use reshake::domain::{Credentials, Outcome};
use reshake::download::download;
use reshake::error::ReshakeError;
use reshake::remote::{normalize_url, resolve};

use support::{MockClient, RecordingSink};

const BASE: &str = "https://ftp.pride.ebi.ac.uk/pride/data/archive/2010/05/PRD000001";

#[test]
fn compressed_name_falls_back_to_uncompressed() {
    let plain = format!("{BASE}/PRIDE_Exp_Complete_Ac_1.xml");
    let client = MockClient::new().serve(&plain, b"<xml/>".to_vec());

    let resolution = resolve(&client, &format!("{plain}.gz"), None);

    assert!(resolution.reachable);
    assert_eq!(resolution.effective_url, plain);
    assert_eq!(client.probes.lock().unwrap().len(), 2);
}

#[test]
fn reachable_url_resolves_to_itself() {
    let url = format!("{BASE}/PRIDE_Exp_Complete_Ac_1.xml.gz");
    let client = MockClient::new().serve(&url, vec![0x1f, 0x8b]);

    let first = resolve(&client, &url, None);
    let second = resolve(&client, &first.effective_url, None);

    assert!(first.reachable);
    assert_eq!(first, second);
    assert_eq!(second.effective_url, url);
}

#[test]
fn unreachable_after_single_fallback() {
    let client = MockClient::new();
    let url = format!("{BASE}/missing.mgf.zip");

    let resolution = resolve(&client, &url, None);

    assert!(!resolution.reachable);
    assert_eq!(
        *client.probes.lock().unwrap(),
        vec![url, format!("{BASE}/missing.mgf")]
    );
}

#[test]
fn uncompressed_name_has_no_fallback() {
    let client = MockClient::new();
    let resolution = resolve(&client, &format!("{BASE}/search.mzid"), None);
    assert!(!resolution.reachable);
    assert_eq!(client.probes.lock().unwrap().len(), 1);
}

#[test]
fn ftp_mirror_is_fetched_over_https() {
    assert_eq!(
        normalize_url("ftp://ftp.pride.ebi.ac.uk/pride/data/archive/x.xml"),
        "https://ftp.pride.ebi.ac.uk/pride/data/archive/x.xml"
    );
    assert_eq!(normalize_url("https://example.org/a"), "https://example.org/a");
}

#[test]
fn download_writes_body_and_reports_progress() {
    let temp = tempfile::tempdir().unwrap();
    let url = format!("{BASE}/run.mgf");
    let body = vec![b'x'; 5000];
    let client = MockClient::new().serve(&url, body.clone());
    let sink = RecordingSink::new();
    let destination = temp.path().join("downloads").join("run.mgf");

    let outcome = download(&client, &url, &destination, None, None, &sink).unwrap();

    assert_eq!(outcome, Outcome::Done(destination.clone()));
    assert_eq!(std::fs::read(&destination).unwrap(), body);
    let progress = sink.progress.lock().unwrap();
    assert_eq!(progress.last(), Some(&(5000, Some(5000))));
}

#[test]
fn declared_size_stands_in_for_missing_content_length() {
    let temp = tempfile::tempdir().unwrap();
    let url = format!("{BASE}/run.mgf");
    let mut client = MockClient::new().serve(&url, vec![b'y'; 300]);
    client.report_length = false;
    let sink = RecordingSink::new();

    download(
        &client,
        &url,
        &temp.path().join("run.mgf"),
        Some(300),
        None,
        &sink,
    )
    .unwrap();

    assert_eq!(sink.progress.lock().unwrap().last(), Some(&(300, Some(300))));
}

#[test]
fn canceled_download_leaves_no_file() {
    let temp = tempfile::tempdir().unwrap();
    let url = format!("{BASE}/big.xml");
    let client = MockClient::new().serve(&url, vec![0u8; 10 * 1024]);
    let sink = RecordingSink::canceling_after(3);
    let destination = temp.path().join("big.xml");

    let outcome = download(&client, &url, &destination, None, None, &sink).unwrap();

    assert_eq!(outcome, Outcome::Canceled);
    assert!(!destination.exists());
}

#[test]
fn credentials_reach_the_client() {
    let url = format!("{BASE}/private.xml");
    let client = MockClient::new().serve(&url, Vec::new());
    let credentials = Credentials {
        username: "reviewer01".to_string(),
        password: "s3cret".to_string(),
    };

    resolve(&client, &url, Some(&credentials));

    assert_eq!(
        *client.credentials_seen.lock().unwrap(),
        vec![Some(credentials.clone())]
    );
    assert!(!format!("{credentials:?}").contains("s3cret"));
}

#[test]
fn missing_remote_body_is_http_status() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockClient::new();
    let destination = temp.path().join("gone.xml");

    let err = download(
        &client,
        &format!("{BASE}/gone.xml"),
        &destination,
        None,
        None,
        &RecordingSink::new(),
    )
    .unwrap_err();

    assert_matches!(err, ReshakeError::HttpStatus { status: 404, .. });
    assert!(!destination.exists());
}
