#[cfg(test)]
mod tests {
    use crate::*;
    use std::ffi::OsStr;
    use std::fs;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn entry(size: u64, secs: u64, mode: u32) -> EntrySnapshot {
        EntrySnapshot {
            size,
            mtime: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            mode,
        }
    }

    fn state(entries: &[(&str, EntrySnapshot)]) -> DirectorySnapshot {
        entries
            .iter()
            .map(|(name, e)| (name.to_string(), *e))
            .collect()
    }

    fn kinds(events: &[ChangeEvent]) -> Vec<(ChangeKind, &str)> {
        events
            .iter()
            .map(|e| (e.kind, e.name.to_str().unwrap()))
            .collect()
    }

    fn quiet_watcher(dir: &Path, log: &Path) -> DirectoryWatcher {
        DirectoryWatcher::new(WatchConfig {
            directory: dir.to_path_buf(),
            interval: Duration::from_millis(20),
            event_log: log.to_path_buf(),
            create_directory: false,
        })
        .with_console(io::sink())
    }

    #[test]
    fn test_identical_snapshots_produce_no_events() {
        let d = state(&[
            ("a.txt", entry(10, 1, 0o100644)),
            ("dir", entry(0, 2, 0o040755)),
        ]);
        assert!(diff(&d, &d).is_empty());
        assert!(diff(&DirectorySnapshot::new(), &DirectorySnapshot::new()).is_empty());
    }

    #[test]
    fn test_from_and_to_empty() {
        let d = state(&[
            ("b", entry(1, 1, 0o100644)),
            ("a", entry(2, 1, 0o100644)),
            ("c", entry(3, 1, 0o100644)),
        ]);
        let empty = DirectorySnapshot::new();

        let created = diff(&empty, &d);
        assert_eq!(
            kinds(&created),
            vec![
                (ChangeKind::Created, "a"),
                (ChangeKind::Created, "b"),
                (ChangeKind::Created, "c"),
            ]
        );

        let deleted = diff(&d, &empty);
        assert_eq!(deleted.len(), 3);
        assert!(deleted.iter().all(|e| e.kind == ChangeKind::Deleted));
    }

    #[test]
    fn test_rename_is_delete_plus_create() {
        let x = entry(10, 5, 0o100644);
        let events = diff(&state(&[("a", x)]), &state(&[("b", x)]));
        assert_eq!(
            kinds(&events),
            vec![(ChangeKind::Created, "b"), (ChangeKind::Deleted, "a")]
        );
    }

    #[test]
    fn test_modification_detail_precedence() {
        let before = state(&[("f", entry(10, 5, 0o100644))]);

        let grown = diff(&before, &state(&[("f", entry(20, 5, 0o100644))]));
        assert_eq!(grown.len(), 1);
        assert_eq!(grown[0].kind, ChangeKind::Modified);
        assert!(grown[0].detail.to_string().contains("10->20"));

        let chmod = diff(&before, &state(&[("f", entry(10, 5, 0o100600))]));
        assert_eq!(
            chmod[0].detail,
            ChangeDetail::Permissions {
                old_mode: 0o100644,
                new_mode: 0o100600
            }
        );
        assert!(chmod[0].detail.to_string().starts_with("Permissions changed"));

        let touched = diff(&before, &state(&[("f", entry(10, 9, 0o100644))]));
        assert_eq!(
            touched[0].detail,
            ChangeDetail::Touched {
                mtime: SystemTime::UNIX_EPOCH + Duration::from_secs(9)
            }
        );
        assert!(touched[0].detail.to_string().starts_with("Modified at: "));
    }

    #[test]
    fn test_unchanged_directory_snapshots_compare_equal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let first = snapshot(dir.path()).unwrap();
        let second = snapshot(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.names().collect::<Vec<_>>(), vec!["a.txt", "sub"]);
    }

    #[test]
    fn test_missing_directory_is_an_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot(&dir.path().join("not-there")).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn test_snapshot_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing-target"), dir.path().join("link"))
            .unwrap();

        let snap = snapshot(dir.path()).unwrap();
        let link = snap.get("link").expect("dangling symlink is still an entry");
        assert_eq!(FileKind::from_mode(link.mode), FileKind::Symlink);

        let record = extract_metadata(&dir.path().join("link")).unwrap().unwrap();
        assert_eq!(record.file_type, FileKind::Symlink);
        assert!(record.permissions.starts_with('l'));
    }

    #[test]
    fn test_metadata_of_deleted_path_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        fs::write(&path, b"x").unwrap();
        fs::remove_file(&path).unwrap();

        assert!(extract_metadata(&path).unwrap().is_none());
    }

    #[test]
    fn test_metadata_for_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, vec![0u8; 42]).unwrap();

        let record = extract_metadata(&path).unwrap().unwrap();
        assert_eq!(record.filename, "data.bin");
        assert_eq!(record.file_type, FileKind::RegularFile);
        assert_eq!(record.size, 42);
        assert!(!record.owner.is_empty());
        assert!(!record.group.is_empty());
        assert!(record.permissions.starts_with('-'));
        assert!(record.modified.is_some());
        assert!(record.summary().starts_with("regular file, 42 bytes, Owner: "));
    }

    #[test]
    fn test_name_reuse_looks_like_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, vec![b'a'; 10]).unwrap();
        let before = snapshot(dir.path()).unwrap();

        fs::remove_file(&path).unwrap();
        fs::write(&path, vec![b'b'; 5]).unwrap();
        let after = snapshot(dir.path()).unwrap();

        assert_eq!(kinds(&diff(&before, &after)), vec![(ChangeKind::Modified, "a.txt")]);
    }

    #[test]
    fn test_create_grow_delete_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().join("watched");
        fs::create_dir(&watched).unwrap();
        let log = dir.path().join("file_monitor_log.csv");
        let mut watcher = quiet_watcher(&watched, &log);

        let previous = watcher.baseline();
        assert!(previous.as_ref().unwrap().is_empty());

        let file = watched.join("a.txt");
        fs::write(&file, vec![b'x'; 10]).unwrap();
        let outcome = watcher.cycle(previous);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event.kind, ChangeKind::Created);
        assert!(matches!(
            outcome.events[0].metadata,
            Some(MetadataOutcome::Available(_))
        ));

        fs::write(&file, vec![b'x'; 20]).unwrap();
        let outcome = watcher.cycle(outcome.retained);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event.kind, ChangeKind::Modified);
        assert!(outcome.events[0].details().contains("10->20"));

        fs::remove_file(&file).unwrap();
        let outcome = watcher.cycle(outcome.retained);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event.kind, ChangeKind::Deleted);
        assert!(outcome.events[0].metadata.is_none());

        let table = csv_log::CsvTable::read(&log).unwrap();
        assert_eq!(table.header, EVENT_LOG_HEADER);
        let rows: Vec<(&str, &str)> = table
            .rows
            .iter()
            .map(|r| (r[1].as_str(), r[2].as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![("created", "a.txt"), ("modified", "a.txt"), ("deleted", "a.txt")]
        );
        assert!(table.rows[0][3].starts_with("regular file, 10 bytes"));
        assert!(table.rows[1][3].contains("10->20"));

        let summary = watcher.summary();
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.events, 3);
        assert_eq!(summary.failed_cycles, 0);
    }

    #[test]
    fn test_non_utf8_names_stay_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().join("watched");
        fs::create_dir(&watched).unwrap();
        let log = dir.path().join("events.csv");
        let mut watcher = quiet_watcher(&watched, &log);

        let previous = watcher.baseline();
        let first = OsStr::from_bytes(b"a\xff");
        let second = OsStr::from_bytes(b"a\xfe");
        fs::write(watched.join(first), b"1").unwrap();
        fs::write(watched.join(second), b"22").unwrap();

        let outcome = watcher.cycle(previous);
        let retained = outcome.retained.unwrap();
        assert_eq!(retained.len(), 2);
        assert!(retained.contains(first));
        assert!(retained.contains(second));

        assert_eq!(outcome.events.len(), 2);
        let mut sizes = Vec::new();
        for reported in &outcome.events {
            assert_eq!(reported.event.kind, ChangeKind::Created);
            assert_eq!(reported.event.display_name(), "a\u{FFFD}");
            match &reported.metadata {
                Some(MetadataOutcome::Available(record)) => sizes.push(record.size),
                other => panic!("metadata missing for existing file: {other:?}"),
            }
        }
        sizes.sort();
        assert_eq!(sizes, vec![1, 2]);

        let table = csv_log::CsvTable::read(&log).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|r| r[2] == "a\u{FFFD}"));
    }

    #[test]
    fn test_header_is_written_once_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let event = ReportedEvent {
            event: ChangeEvent {
                timestamp: chrono::Local::now(),
                kind: ChangeKind::Deleted,
                name: "x, y".into(),
                detail: ChangeDetail::None,
            },
            metadata: None,
        };

        EventLogger::new(&path).append(&event).unwrap();
        EventLogger::new(&path).append(&event).unwrap();
        EventLogger::new(&path).append_all(&[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,event_type,filename,details");
        assert!(lines[1].ends_with(",deleted,\"x, y\","));
    }

    #[test]
    fn test_listing_failure_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected makes listing fail.
        let not_a_dir = dir.path().join("plain-file");
        fs::write(&not_a_dir, b"x").unwrap();
        let mut watcher = quiet_watcher(&not_a_dir, &dir.path().join("log.csv"));

        let previous = state(&[("kept", entry(1, 1, 0o100644))]);
        let outcome = watcher.cycle(Some(previous.clone()));

        assert_eq!(outcome.retained, Some(previous));
        assert!(outcome.events.is_empty());
        let err = outcome.snapshot_error.expect("listing should fail");
        assert_eq!(err.class(), ErrorClass::Transient);
        assert_eq!(watcher.summary().failed_cycles, 1);
    }

    #[test]
    fn test_log_failure_does_not_stall_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().join("watched");
        fs::create_dir(&watched).unwrap();
        // The log path is a directory, so appending fails.
        let log = dir.path().join("log-dir");
        fs::create_dir(&log).unwrap();
        let mut watcher = quiet_watcher(&watched, &log);

        let previous = watcher.baseline();
        fs::write(watched.join("new.txt"), b"abc").unwrap();
        let outcome = watcher.cycle(previous);

        assert_eq!(outcome.events.len(), 1);
        assert!(outcome.retained.unwrap().contains("new.txt"));
        assert_eq!(outcome.log_error.unwrap().class(), ErrorClass::Transient);
    }

    struct BrokenConsole;

    impl io::Write for BrokenConsole {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "console closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "console closed"))
        }
    }

    #[test]
    fn test_console_failure_still_logs_events() {
        let dir = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        let log = logs.path().join("log.csv");
        let mut watcher = quiet_watcher(dir.path(), &log).with_console(BrokenConsole);

        let previous = watcher.baseline();
        fs::write(dir.path().join("new.txt"), b"abc").unwrap();
        let outcome = watcher.cycle(previous);

        assert_eq!(outcome.events.len(), 1);
        assert!(outcome.log_error.is_none());
        assert_eq!(watcher.summary().events, 1);
        let content = fs::read_to_string(&log).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains(",created,new.txt,"));
    }

    #[test]
    fn test_first_successful_snapshot_becomes_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("existing.txt"), b"x").unwrap();
        let mut watcher = quiet_watcher(dir.path(), &logs.path().join("log.csv"));

        let outcome = watcher.cycle(None);
        assert!(outcome.events.is_empty());
        assert!(outcome.retained.unwrap().contains("existing.txt"));
    }

    #[test]
    fn test_console_lines() {
        let event = ReportedEvent {
            event: ChangeEvent {
                timestamp: chrono::Local::now(),
                kind: ChangeKind::Created,
                name: "a.txt".into(),
                detail: ChangeDetail::None,
            },
            metadata: Some(MetadataOutcome::Unavailable("permission denied".to_string())),
        };
        let lines = event.console_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] [CREATED] a.txt"));
        assert_eq!(lines[1], "   Details: unavailable");
        assert_eq!(event.details(), "details unavailable: permission denied");

        let modified = ReportedEvent {
            event: ChangeEvent {
                kind: ChangeKind::Modified,
                detail: ChangeDetail::Size { old: 1, new: 2 },
                ..event.event.clone()
            },
            metadata: None,
        };
        assert_eq!(modified.console_lines()[1], "   -> Size change: 1->2 bytes");
    }

    #[test]
    fn test_error_classes() {
        let io_err = || io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let metadata = WatchError::Metadata {
            path: "x".into(),
            source: io_err(),
        };
        let listing = WatchError::ListDirectory {
            path: "d".into(),
            source: io_err(),
        };
        assert_eq!(metadata.class(), ErrorClass::PerEntry);
        assert_eq!(listing.class(), ErrorClass::Transient);
        assert_eq!(listing.path(), Path::new("d"));
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().join("watched");
        let mut watcher = DirectoryWatcher::new(WatchConfig {
            directory: watched.clone(),
            interval: Duration::from_millis(20),
            event_log: dir.path().join("events.csv"),
            create_directory: true,
        })
        .with_console(io::sink());

        let summary = watcher.run(std::future::ready(())).await;

        assert_eq!(watcher.state(), WatcherState::Stopped);
        assert_eq!(summary, WatchSummary::default());
        assert!(!watched.exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let watched = dir.path().join("watched");
        let log = dir.path().join("events.csv");
        let mut watcher = DirectoryWatcher::new(WatchConfig {
            directory: watched.clone(),
            interval: Duration::from_millis(20),
            event_log: log.clone(),
            create_directory: true,
        })
        .with_console(io::sink());

        let writer = tokio::spawn({
            let watched = watched.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                fs::write(watched.join("late.txt"), b"hello").unwrap();
            }
        });

        let summary = watcher
            .run(tokio::time::sleep(Duration::from_millis(300)))
            .await;
        writer.await.unwrap();

        assert_eq!(watcher.state(), WatcherState::Stopped);
        assert!(summary.cycles >= 3);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.failed_cycles, 0);

        let table = csv_log::CsvTable::read(&log).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], "created");
        assert_eq!(table.rows[0][2], "late.txt");
    }
}
