use notebox_core::{
    FileNoteRepository, ListOrder, Note, NoteName, NoteRepository, RepoError, StorageOp,
    StoreConfig,
};
use std::fs;
use std::io::ErrorKind;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> FileNoteRepository {
    FileNoteRepository::open(&StoreConfig::new(dir.path().join("notes"))).unwrap()
}

fn name(value: &str) -> NoteName {
    NoteName::parse(value).unwrap()
}

#[test]
fn open_creates_missing_notes_directory() {
    let dir = TempDir::new().unwrap();
    let notes_dir = dir.path().join("nested").join("notes");
    assert!(!notes_dir.exists());

    let store = FileNoteRepository::open(&StoreConfig::new(&notes_dir)).unwrap();
    assert!(notes_dir.is_dir());
    assert_eq!(store.notes_dir(), notes_dir.as_path());
}

#[test]
fn empty_store_lists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn save_then_list_returns_same_name_and_content() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.save(&Note::try_new("a.txt", "hello").unwrap()).unwrap();

    let notes = store.list_all().unwrap();
    assert_eq!(notes, vec![Note::try_new("a.txt", "hello").unwrap()]);
    assert_eq!(
        fs::read_to_string(store.notes_dir().join("a.txt")).unwrap(),
        "hello"
    );
}

#[test]
fn save_preserves_empty_and_multiline_unicode_content() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let body = "line one\nlínea dos 🚀\r\n\ttabbed";

    store.save(&Note::try_new("empty.txt", "").unwrap()).unwrap();
    store.save(&Note::try_new("multi.txt", body).unwrap()).unwrap();

    assert_eq!(store.read(&name("empty.txt")).unwrap().content, "");
    assert_eq!(store.read(&name("multi.txt")).unwrap().content, body);
}

#[test]
fn saving_same_name_twice_keeps_one_file_with_latest_content() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.save(&Note::try_new("a.txt", "hello").unwrap()).unwrap();
    store.save(&Note::try_new("a.txt", "world").unwrap()).unwrap();

    let notes = store.list_all().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].name.as_str(), "a.txt");
    assert_eq!(notes[0].content, "world");
}

#[test]
fn overwrite_with_shorter_content_truncates() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store
        .save(&Note::try_new("a.txt", "a much longer body").unwrap())
        .unwrap();
    store.save(&Note::try_new("a.txt", "short").unwrap()).unwrap();

    assert_eq!(store.read(&name("a.txt")).unwrap().content, "short");
}

#[test]
fn delete_removes_only_the_named_note() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.save(&Note::try_new("a.txt", "x").unwrap()).unwrap();
    store.save(&Note::try_new("b.txt", "y").unwrap()).unwrap();

    store.delete(&name("a.txt")).unwrap();

    let notes = store.list_all().unwrap();
    assert_eq!(notes, vec![Note::try_new("b.txt", "y").unwrap()]);
}

#[test]
fn save_then_delete_leaves_store_empty() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.save(&Note::try_new("a.txt", "x").unwrap()).unwrap();

    store.delete(&name("a.txt")).unwrap();

    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn delete_missing_note_is_reported_storage_failure() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.save(&Note::try_new("keep.txt", "x").unwrap()).unwrap();

    let err = store.delete(&name("missing.txt")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Storage {
            op: StorageOp::Delete,
            ..
        }
    ));
    assert_eq!(err.io_kind(), Some(ErrorKind::NotFound));
    assert_eq!(store.list_all().unwrap().len(), 1);
}

#[test]
fn path_separator_name_is_rejected_before_touching_disk() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let err: RepoError = Note::try_new("../escape.txt", "x").unwrap_err().into();
    assert!(matches!(err, RepoError::InvalidName(_)));
    let err: RepoError = Note::try_new("sub/inner.txt", "x").unwrap_err().into();
    assert_eq!(err.code(), "invalid_name");

    assert!(store.list_all().unwrap().is_empty());
    assert!(!dir.path().join("escape.txt").exists());
    assert!(!store.notes_dir().join("sub").exists());
}

#[test]
fn listing_skips_directories_hidden_files_and_invalid_names() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.save(&Note::try_new("real.txt", "x").unwrap()).unwrap();
    fs::create_dir(store.notes_dir().join("folder")).unwrap();
    fs::write(store.notes_dir().join(".notebox-stale.tmp"), "partial").unwrap();
    fs::write(store.notes_dir().join("bad?name"), "x").unwrap_or(());

    let names: Vec<String> = store
        .list_all()
        .unwrap()
        .into_iter()
        .map(|note| note.name.into_inner())
        .collect();
    assert_eq!(names, vec!["real.txt".to_string()]);
}

#[test]
fn non_utf8_file_fails_the_whole_listing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.save(&Note::try_new("good.txt", "x").unwrap()).unwrap();
    fs::write(store.notes_dir().join("binary.bin"), [0xff_u8, 0xfe, 0x00]).unwrap();

    let err = store.list_all().unwrap_err();
    assert!(matches!(
        err,
        RepoError::Storage {
            op: StorageOp::Read,
            ..
        }
    ));
    assert_eq!(err.io_kind(), Some(ErrorKind::InvalidData));
}

#[test]
fn listing_is_sorted_by_name_by_default() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for value in ["note_3.txt", "note_1.txt", "note_2.txt"] {
        store.save(&Note::try_new(value, value).unwrap()).unwrap();
    }

    let names: Vec<String> = store
        .list_all()
        .unwrap()
        .into_iter()
        .map(|note| note.name.into_inner())
        .collect();
    assert_eq!(names, vec!["note_1.txt", "note_2.txt", "note_3.txt"]);
}

#[test]
fn modified_desc_order_lists_newest_first() {
    let dir = TempDir::new().unwrap();
    let config =
        StoreConfig::new(dir.path().join("notes")).with_list_order(ListOrder::ModifiedDesc);
    let store = FileNoteRepository::open(&config).unwrap();

    store.save(&Note::try_new("b.txt", "older").unwrap()).unwrap();
    thread::sleep(Duration::from_millis(50));
    store.save(&Note::try_new("a.txt", "newer").unwrap()).unwrap();

    let notes = store.list_all().unwrap();
    assert_eq!(notes[0].name.as_str(), "a.txt");
    assert_eq!(notes[1].name.as_str(), "b.txt");
}

#[test]
fn listing_fails_when_directory_disappears() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    fs::remove_dir_all(store.notes_dir()).unwrap();

    let err = store.list_all().unwrap_err();
    assert!(matches!(
        err,
        RepoError::Storage {
            op: StorageOp::List,
            ..
        }
    ));
}

#[test]
fn read_and_exists_reflect_disk_state() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let target = name("a.txt");
    assert!(!store.exists(&target).unwrap());

    store.save(&Note::new(target.clone(), "body")).unwrap();
    assert!(store.exists(&target).unwrap());
    assert_eq!(store.read(&target).unwrap().content, "body");

    store.delete(&target).unwrap();
    let err = store.read(&target).unwrap_err();
    assert_eq!(err.io_kind(), Some(ErrorKind::NotFound));
}

#[test]
fn concurrent_writes_to_different_names_all_land() {
    let dir = TempDir::new().unwrap();
    let store = std::sync::Arc::new(open_store(&dir));

    let handles: Vec<_> = (0..16)
        .map(|idx| {
            let store = std::sync::Arc::clone(&store);
            thread::spawn(move || {
                let note = Note::try_new(format!("note_{idx:02}.txt"), format!("body {idx}"))
                    .unwrap();
                store.save(&note).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let notes = store.list_all().unwrap();
    assert_eq!(notes.len(), 16);
    for (idx, note) in notes.iter().enumerate() {
        assert_eq!(note.content, format!("body {idx}"));
    }
}
