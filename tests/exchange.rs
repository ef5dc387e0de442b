//! CSV export/import through the record store.

use std::fs;

use mouse_records_manager::{read_csv, Collection, Outcome, Record, RecordStore, StoreConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const HEADER: &str = "identifier,cage_number,mouseline,genotype,gender,dob,available,health,username,user_manipulations,status,comments";

fn create_test_store() -> (TempDir, RecordStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = RecordStore::open(StoreConfig::at(temp_dir.path().join("mice.sqlite"))).unwrap();
    (temp_dir, store)
}

fn mouse(identifier: &str, cage: &str, comments: &str) -> Record {
    let mut record = Record::new(identifier);
    record.cage_number = cage.to_string();
    record.mouseline = "C57".to_string();
    record.comments = comments.to_string();
    record
}

#[test]
fn empty_collection_exports_header_only() {
    let (_dir, store) = create_test_store();
    let bytes = store.export(Collection::Deceased).unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), format!("{HEADER}\n"));
}

#[test]
fn export_then_import_restores_the_collection() {
    let (dir, store) = create_test_store();
    let records = vec![
        mouse("M001", "12", "quiet"),
        mouse("M002", "", "bit the handler, twice"),
        mouse("M003", "7", "line one\nline two"),
    ];
    for record in &records {
        store.insert(Collection::Live, record).unwrap();
    }

    let path = dir.path().join("out/live.csv");
    assert_eq!(store.export_to_path(Collection::Live, &path).unwrap(), 3);

    let other = RecordStore::open(StoreConfig::at(dir.path().join("other.sqlite"))).unwrap();
    assert_eq!(other.import_from_path(Collection::Live, &path).unwrap(), 3);
    assert_eq!(other.fetch(Collection::Live).unwrap(), records);
}

#[test]
fn import_replaces_previous_contents() {
    let (_dir, store) = create_test_store();
    store
        .insert(Collection::Live, &mouse("OLD1", "1", ""))
        .unwrap();

    let csv = format!("{HEADER}\nNEW1,4,BALB,,,,,,,,,\n");
    assert_eq!(store.import(Collection::Live, csv.as_bytes()).unwrap(), 1);

    let records = store.fetch(Collection::Live).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identifier, "NEW1");
    assert_eq!(records[0].mouseline, "BALB");
}

#[test]
fn import_accepts_legacy_snapshot_headers() {
    let (_dir, store) = create_test_store();
    let csv = "INDEX_ID,id,cage_number,mouseline,genotype\n\
               1,M010,12,C57,WT\n\
               2,M011,3,BALB,KO\n";

    assert_eq!(store.import(Collection::Live, csv.as_bytes()).unwrap(), 2);

    let records = store.fetch(Collection::Live).unwrap();
    assert_eq!(records[0].identifier, "M010");
    assert_eq!(records[0].cage_number, "12");
    assert_eq!(records[0].genotype, "WT");
    assert_eq!(records[0].comments, "");
    assert_eq!(records[1].identifier, "M011");
}

#[test]
fn import_keeps_duplicate_identifiers_from_snapshot() {
    let (_dir, store) = create_test_store();
    assert_eq!(import_duplicates(&store), 2);
    assert_eq!(store.count(Collection::Live).unwrap(), 2);
}

fn import_duplicates(store: &RecordStore) -> usize {
    let csv = format!("{HEADER}\nM001,1,A,,,,,,,,,\nM001,2,B,,,,,,,,,\n");
    store.import(Collection::Live, csv.as_bytes()).unwrap()
}

fn cages(store: &RecordStore, collection: Collection) -> Vec<String> {
    store
        .fetch(collection)
        .unwrap()
        .into_iter()
        .map(|record| record.cage_number)
        .collect()
}

#[test]
fn delete_with_duplicates_removes_first_stored_row() {
    let (_dir, store) = create_test_store();
    import_duplicates(&store);

    assert_eq!(store.delete("M001", Collection::Live).unwrap(), Outcome::Applied);
    assert_eq!(cages(&store, Collection::Live), ["2"]);
}

#[test]
fn update_with_duplicates_changes_first_stored_row() {
    let (_dir, store) = create_test_store();
    import_duplicates(&store);

    let mut changed = Record::new("M001");
    changed.cage_number = "9".to_string();
    assert_eq!(
        store.update("M001", Collection::Live, &changed).unwrap(),
        Outcome::Applied
    );

    let records = store.fetch(Collection::Live).unwrap();
    assert_eq!(records[0].cage_number, "9");
    assert_eq!(records[0].mouseline, "");
    assert_eq!(records[1].cage_number, "2");
    assert_eq!(records[1].mouseline, "B");
}

#[test]
fn migrate_with_duplicates_copies_first_stored_row() {
    let (_dir, store) = create_test_store();
    import_duplicates(&store);

    assert_eq!(store.migrate("M001").unwrap(), Outcome::Applied);
    assert_eq!(cages(&store, Collection::Deceased), ["1"]);
    assert_eq!(cages(&store, Collection::Live), ["1", "2"]);
}

#[test]
fn malformed_import_leaves_collection_untouched() {
    let (_dir, store) = create_test_store();
    store
        .insert(Collection::Live, &mouse("KEEP", "1", ""))
        .unwrap();

    let invalid_utf8: &[u8] = b"identifier,cage_number\nM001,\xff\xfe\n";
    assert!(store.import(Collection::Live, invalid_utf8).is_err());

    assert_eq!(
        store.fetch(Collection::Live).unwrap(),
        vec![mouse("KEEP", "1", "")]
    );
}

#[test]
fn import_from_missing_file_is_io_error() {
    let (dir, store) = create_test_store();
    let err = store
        .import_from_path(Collection::Live, &dir.path().join("absent.csv"))
        .unwrap_err();
    assert!(matches!(
        err,
        mouse_records_manager::error::StoreError::Io { .. }
    ));
}

#[test]
fn exported_file_parses_with_read_csv() {
    let (dir, store) = create_test_store();
    store
        .insert(Collection::Deceased, &mouse("D001", "9", "found, 2024"))
        .unwrap();

    let path = dir.path().join("deceased.csv");
    store.export_to_path(Collection::Deceased, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(HEADER));

    let parsed = read_csv(text.as_bytes()).unwrap();
    assert_eq!(parsed, vec![mouse("D001", "9", "found, 2024")]);
}
