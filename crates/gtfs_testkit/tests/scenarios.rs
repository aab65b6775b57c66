//! End-to-end scenarios: instance lifecycles, crash recovery, and the
//! durability contract.

use gtfs_core::{GtfsError, LOG_FILE_NAME};
use gtfs_storage::FileBackend;
use gtfs_testkit::{CrashableBackend, TestStore};
use std::fs;

#[test]
fn write_then_read_across_instances() {
    let mut store = TestStore::new();

    // Writer instance.
    {
        let fs = store.gtfs();
        let file = fs.open_file("t1", 100).unwrap();
        let write = fs.write(&file, 10, b"Hi, I'm the writer.\n").unwrap();
        assert_eq!(fs.sync(&write).unwrap(), 20);
        fs.close_file(&file).unwrap();
    }
    store.shutdown();

    // Reader instance on the same directory.
    store.reopen();
    let fs = store.gtfs();
    let file = fs.open_file("t1", 100).unwrap();
    assert_eq!(fs.read(&file, 10, 20).unwrap(), b"Hi, I'm the writer.\n");
}

#[test]
fn abort_restores_original_content() {
    let mut store = TestStore::new();
    let fs = store.gtfs();

    let file = fs.open_file("t2", 100).unwrap();

    let kept = fs.write(&file, 0, b"Testing string.\n").unwrap();
    fs.sync(&kept).unwrap();

    let dropped = fs.write(&file, 20, b"Testing string.\n").unwrap();
    fs.abort(&dropped).unwrap();

    assert_eq!(fs.read(&file, 0, 16).unwrap(), b"Testing string.\n");
    assert_eq!(fs.read(&file, 20, 16).unwrap(), vec![0u8; 16]);
}

#[test]
fn clean_truncates_the_log() {
    let mut store = TestStore::new();

    {
        let fs = store.gtfs();
        let file = fs.open_file("t3", 64).unwrap();
        for (offset, data) in [(0u64, b"first".as_slice()), (32, b"second")] {
            let write = fs.write(&file, offset, data).unwrap();
            fs.sync(&write).unwrap();
        }
    }

    assert!(!store.log_bytes().is_empty());
    store.shutdown();

    assert_eq!(store.log_bytes().len(), 0);
    // Committed data is untouched by the truncation.
    assert_eq!(&store.data_bytes("t3")[0..5], b"first");
    assert_eq!(&store.data_bytes("t3")[32..38], b"second");
}

#[test]
fn partial_sync_commits_a_prefix() {
    let mut store = TestStore::new();
    let fs = store.gtfs();

    let file = fs.open_file("t4", 100).unwrap();
    let write = fs.write(&file, 0, b"Testing 5 string.\n").unwrap();

    assert_eq!(fs.sync_n_bytes(&write, 5).unwrap(), 5);

    let on_disk = store.data_bytes("t4");
    assert_eq!(&on_disk[0..5], b"Testi");
    // Bytes 5..17 keep their prior content: zeros on a fresh file.
    assert_eq!(&on_disk[5..18], &[0u8; 13][..]);
}

#[test]
fn crash_during_sync_is_recovered() {
    let mut store = TestStore::new();

    {
        let fs = store.gtfs();
        let file = fs.open_file("t5", 60).unwrap();
        let first = fs.write(&file, 0, b"committed bytes").unwrap();
        fs.write(&file, 30, b"never synced").unwrap();
        fs.sync(&first).unwrap();
    }
    store.crash();

    // Wipe the data file to prove replay re-applies the committed write.
    fs::write(store.path().join("t5"), vec![0u8; 60]).unwrap();

    store.reopen();
    let fs = store.gtfs();
    assert_eq!(fs.replay_stats().synced, 1);

    let file = fs.open_file("t5", 60).unwrap();
    assert_eq!(fs.read(&file, 0, 15).unwrap(), b"committed bytes");
    assert_eq!(fs.read(&file, 30, 12).unwrap(), vec![0u8; 12]);
}

#[test]
fn remove_enforcement() {
    let mut store = TestStore::new();
    let fs = store.gtfs();

    let file = fs.open_file("t10", 100).unwrap();

    // Removing an open file is refused.
    assert!(matches!(
        fs.remove_file(&file),
        Err(GtfsError::AlreadyOpen { .. })
    ));

    fs.close_file(&file).unwrap();
    fs.remove_file(&file).unwrap();

    assert!(!store.path().join("t10").exists());
}

#[test]
fn torn_log_append_is_discarded_on_reopen() {
    let mut store = TestStore::new();

    // Commit one write through a normal instance.
    {
        let fs = store.gtfs();
        let file = fs.open_file("t6", 40).unwrap();
        let write = fs.write(&file, 0, b"durable").unwrap();
        fs.sync(&write).unwrap();
    }
    store.crash();

    // Reopen through a crash-injecting backend and tear the next append.
    let inner = FileBackend::open(&store.path().join(LOG_FILE_NAME)).unwrap();
    let (backend, ctrl) = CrashableBackend::new(Box::new(inner));
    store.reopen_with_log_backend(Box::new(backend));

    {
        let fs = store.gtfs();
        let file = fs.open_file("t6", 40).unwrap();
        ctrl.crash_after(5);
        let result = fs.write(&file, 10, b"this append will tear");
        assert!(matches!(result, Err(GtfsError::Storage(_))));
    }
    store.crash();

    // The torn record is a clean end-of-log; nothing of it survives.
    store.reopen();
    let fs = store.gtfs();
    assert_eq!(fs.replay_stats().staged, 0);

    let file = fs.open_file("t6", 40).unwrap();
    assert_eq!(fs.read(&file, 0, 7).unwrap(), b"durable");
    assert_eq!(fs.read(&file, 10, 21).unwrap(), vec![0u8; 21]);
}

#[test]
fn failed_sync_flush_is_completed_by_recovery() {
    let mut store = TestStore::new();
    store.crash();

    let inner = FileBackend::open(&store.path().join(LOG_FILE_NAME)).unwrap();
    let (backend, ctrl) = CrashableBackend::new(Box::new(inner));
    store.reopen_with_log_backend(Box::new(backend));

    {
        let fs = store.gtfs();
        let file = fs.open_file("t7", 30).unwrap();
        let write = fs.write(&file, 0, b"promised").unwrap();

        // The S record reaches the backend but the flush reports failure;
        // the caller sees an error and the write stays pending.
        ctrl.set_fail_on_flush(true);
        assert!(fs.sync(&write).is_err());
        assert_eq!(fs.pending_writes(&file).unwrap(), 1);
    }
    store.crash();

    // Replay finds the S record and completes the commit.
    store.reopen();
    let fs = store.gtfs();
    assert_eq!(fs.replay_stats().synced, 1);

    let file = fs.open_file("t7", 30).unwrap();
    assert_eq!(fs.read(&file, 0, 8).unwrap(), b"promised");
}

#[test]
fn unsynced_writes_do_not_survive_crash() {
    let mut store = TestStore::new();

    {
        let fs = store.gtfs();
        let file = fs.open_file("t8", 20).unwrap();
        fs.write(&file, 0, b"ephemeral").unwrap();
    }
    store.crash();
    store.reopen();

    let fs = store.gtfs();
    let file = fs.open_file("t8", 20).unwrap();
    assert_eq!(fs.read(&file, 0, 9).unwrap(), vec![0u8; 9]);
}

#[test]
fn removed_file_stays_removed_after_crash() {
    let mut store = TestStore::new();

    {
        let fs = store.gtfs();
        let file = fs.open_file("t9", 16).unwrap();
        let write = fs.write(&file, 0, b"bytes").unwrap();
        fs.sync(&write).unwrap();
        fs.close_file(&file).unwrap();
        fs.remove_file(&file).unwrap();
    }
    store.crash();
    store.reopen();

    assert!(!store.path().join("t9").exists());
    // The directory can host a fresh file under the same name.
    let fs = store.gtfs();
    let file = fs.open_file("t9", 16).unwrap();
    assert_eq!(fs.read(&file, 0, 5).unwrap(), vec![0u8; 5]);
}
