//! Property checks: codec binary-safety and read/commit semantics
//! against a naive model.

use gtfs_core::{LogManager, LogRecord, WriteId};
use gtfs_storage::InMemoryBackend;
use gtfs_testkit::TestStore;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any payload bytes - including SP, LF, and NUL - survive a log
    /// round trip verbatim.
    #[test]
    fn codec_round_trips_arbitrary_payloads(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..200), 1..16),
    ) {
        let log = LogManager::new(Box::new(InMemoryBackend::new()), false);

        let mut expected = Vec::new();
        for (i, payload) in payloads.iter().enumerate() {
            let record = LogRecord::write(
                WriteId::new(i as u64 + 1),
                "file",
                (i as u64) * 256,
                payload,
            );
            log.append(&record).unwrap();
            expected.push(record);
        }

        let decoded: Vec<_> = log.iter().unwrap().map(|r| r.unwrap().1).collect();
        prop_assert_eq!(decoded, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Reads merge staged writes over persisted bytes in insertion
    /// order, matching a naive overlay model.
    #[test]
    fn read_matches_overlay_model(
        ops in prop::collection::vec(
            (0u64..64, prop::collection::vec(any::<u8>(), 1..32)),
            1..10,
        ),
    ) {
        const LEN: u64 = 96;
        let mut store = TestStore::new();
        let fs = store.gtfs();
        let file = fs.open_file("model", LEN).unwrap();

        let mut model = vec![0u8; LEN as usize];
        for (offset, data) in &ops {
            fs.write(&file, *offset, data).unwrap();
            model[*offset as usize..*offset as usize + data.len()].copy_from_slice(data);
        }

        prop_assert_eq!(fs.read(&file, 0, LEN).unwrap(), model);
    }

    /// After a crash, exactly the synced writes are visible; staged and
    /// aborted writes leave no trace.
    #[test]
    fn recovery_matches_commit_model(
        ops in prop::collection::vec(
            (0u64..64, prop::collection::vec(any::<u8>(), 1..32), 0u8..3),
            1..10,
        ),
    ) {
        const LEN: u64 = 96;
        let mut store = TestStore::new();

        let mut committed = vec![0u8; LEN as usize];
        {
            let fs = store.gtfs();
            let file = fs.open_file("model", LEN).unwrap();

            for (offset, data, fate) in &ops {
                let write = fs.write(&file, *offset, data).unwrap();
                match fate {
                    0 => {} // left pending; the crash discards it
                    1 => {
                        fs.sync(&write).unwrap();
                        committed[*offset as usize..*offset as usize + data.len()]
                            .copy_from_slice(data);
                    }
                    _ => {
                        fs.abort(&write).unwrap();
                    }
                }
            }
        }

        store.crash();
        store.reopen();

        let fs = store.gtfs();
        let file = fs.open_file("model", LEN).unwrap();
        prop_assert_eq!(fs.read(&file, 0, LEN).unwrap(), committed);
    }
}
