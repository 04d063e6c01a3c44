use assert_matches::assert_matches;

use reshake::domain::{
    ChargeRange, Compression, DownloadTask, FileFormat, FileRole, RemoteFile, file_name_from_url,
};
use reshake::error::ReshakeError;

#[test]
fn remote_file_shorthand_infers_role() {
    let spectrum: RemoteFile = "https://ftp.pride.ebi.ac.uk/pride/data/archive/2010/05/PRD000001/PRIDE_Exp_Complete_Ac_1.xml.gz"
        .parse()
        .unwrap();
    assert_eq!(spectrum.role, FileRole::Spectrum);
    assert_eq!(spectrum.logical_name, "PRIDE_Exp_Complete_Ac_1.xml.gz");

    let metadata: RemoteFile = "https://example.org/results/search.mzid?download=1"
        .parse()
        .unwrap();
    assert_eq!(metadata.role, FileRole::Metadata);
    assert_eq!(metadata.logical_name, "search.mzid");
}

#[test]
fn remote_file_requires_a_file_name() {
    let err = "https://example.org".parse::<RemoteFile>().unwrap_err();
    assert_matches!(err, ReshakeError::InvalidRemoteFile(_));
}

#[test]
fn file_names_from_urls() {
    assert_eq!(
        file_name_from_url("ftp://ftp.pride.ebi.ac.uk/pride/a/b.mgf#frag").as_deref(),
        Some("b.mgf")
    );
    assert_eq!(
        file_name_from_url("https://example.org/dir/").as_deref(),
        Some("dir")
    );
    assert_eq!(file_name_from_url("https://example.org"), None);
}

#[test]
fn compression_and_format_by_name() {
    assert_eq!(Compression::from_name("A.XML.GZ"), Compression::Gzip);
    assert_eq!(Compression::from_name("peaks.zip"), Compression::Zip);
    assert_eq!(Compression::from_name("run.mgf"), Compression::None);
    assert_eq!(Compression::strip_suffix("run.mgf.gz"), "run.mgf");

    assert_eq!(FileFormat::from_name("a.xml.gz"), FileFormat::PrideXml);
    assert_eq!(FileFormat::from_name("run.MGF"), FileFormat::Mgf);
    assert_eq!(FileFormat::from_name("run.raw.zip"), FileFormat::Raw);
    assert_eq!(FileFormat::from_name("search.mzid"), FileFormat::MzIdentMl);
    assert_eq!(FileFormat::from_name("readme"), FileFormat::Unknown);
}

#[test]
fn download_task_working_path_prefers_expanded() {
    let remote = RemoteFile::new("https://example.org/a.xml.gz", FileRole::Spectrum).unwrap();
    let mut task = DownloadTask::new(remote, "/work/downloads/a.xml.gz".into());
    assert_eq!(task.compression, Compression::Gzip);
    assert_eq!(task.working_path().to_str(), Some("/work/downloads/a.xml.gz"));

    task.unzipped_path = Some("/work/downloads/a.xml".into());
    assert_eq!(task.working_path().to_str(), Some("/work/downloads/a.xml"));
}

#[test]
fn charge_range_merge_and_observe() {
    let mut range = ChargeRange::new();
    assert!(range.is_empty());
    range.observe(3);
    range.observe(2);

    let mut other = ChargeRange::new();
    other.observe(5);
    range.merge(&other);
    range.merge(&ChargeRange::new());

    assert_eq!((range.min(), range.max()), (Some(2), Some(5)));
}
