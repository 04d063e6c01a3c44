use std::fs;

use camino::Utf8PathBuf;

use reshake::store::{PARAMETERS_FILE, REPORT_FILE, Store};

fn store(root: &std::path::Path) -> Store {
    Store::new_with_paths(
        Utf8PathBuf::from_path_buf(root.join("work")).unwrap(),
        Utf8PathBuf::from_path_buf(root.join("cache")).unwrap(),
    )
}

#[test]
fn layout_paths() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(temp.path());

    assert!(
        store
            .download_path("PRIDE_Exp_Complete_Ac_1.xml.gz")
            .ends_with("work/downloads/PRIDE_Exp_Complete_Ac_1.xml.gz")
    );
    assert!(
        store
            .mgf_path("PRIDE_Exp_Complete_Ac_1.xml.gz")
            .ends_with("work/mgf/PRIDE_Exp_Complete_Ac_1.mgf")
    );
    assert!(store.mgf_path("run1.mgf").ends_with("work/mgf/run1.mgf"));
    assert!(store.raw_output_dir("run0.raw").ends_with("work/raw/run0.raw"));
    assert!(store.cache_path("run1.mgf").starts_with(store.cache_root()));
    assert!(store.parameters_path().ends_with(PARAMETERS_FILE));
    assert!(store.report_path().ends_with(REPORT_FILE));
}

#[test]
fn cached_copy_accepts_expanded_name() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(temp.path());
    store.ensure_cache_root().unwrap();
    assert_eq!(store.cached_copy("a.xml.gz"), None);

    fs::write(store.cache_path("a.xml").as_std_path(), "<xml/>").unwrap();
    assert_eq!(store.cached_copy("a.xml.gz"), Some(store.cache_path("a.xml")));

    fs::write(store.cache_path("a.xml.gz").as_std_path(), [0x1f, 0x8b]).unwrap();
    assert_eq!(
        store.cached_copy("a.xml.gz"),
        Some(store.cache_path("a.xml.gz"))
    );
    assert_eq!(store.cached_copy("b.mgf"), None);
}

#[test]
fn atomic_writes_replace_content() {
    let temp = tempfile::tempdir().unwrap();
    let store = store(temp.path());
    let report = store.report_path();

    Store::write_bytes_atomic(&report, b"first").unwrap();
    Store::write_bytes_atomic(&report, b"second").unwrap();
    assert_eq!(fs::read_to_string(report.as_std_path()).unwrap(), "second");
    assert!(!Utf8PathBuf::from(format!("{report}.tmp")).as_std_path().exists());

    let copy = store.download_path("report-copy.txt");
    Store::copy_file_atomic(&report, &copy).unwrap();
    assert_eq!(fs::read_to_string(copy.as_std_path()).unwrap(), "second");
}
