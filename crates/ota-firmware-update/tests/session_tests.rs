//! Integration tests for the firmware update session lifecycle

use std::time::Duration;

use ota_firmware_update::prelude::*;
use ota_test_helpers::prelude::*;
use tracing_test::traced_test;

fn handler(host: &RecordingHost) -> (OtaHandler<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    (OtaHandler::with_clock(host.callbacks(), clock.clone()), clock)
}

fn deliver_all(handler: &mut OtaHandler<ManualClock>, fixture: &UpdateFixture) {
    for index in 0..fixture.total_chunks() {
        handler.process_chunk(index, fixture.chunk(index));
    }
}

#[test]
#[traced_test]
fn test_exact_multiple_image_downloads_in_three_chunks() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));
    assert_eq!(handler.total_chunks(), Some(3));
    deliver_all(&mut handler, &fixture);

    assert_eq!(host.requests(), vec![0, 1, 2]);
    assert_eq!(host.completions(), vec![true]);
    assert_eq!(host.finish_count(), 1);
    assert_eq!(
        host.statuses(),
        vec![
            FirmwareState::Downloading,
            FirmwareState::Downloading,
            FirmwareState::Downloading,
            FirmwareState::Downloaded,
            FirmwareState::Updating,
        ]
    );
    assert_eq!(host.progress(), vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(storage.committed(), Some(fixture.image.clone()));
    assert!(!handler.is_active());
    assert!(!handler.is_watchdog_armed());
    Ok(())
}

#[test]
fn test_storage_commits_before_completion() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(12, 5);

    handler.start(fixture.descriptor(&host, &storage));
    deliver_all(&mut handler, &fixture);

    let end = must_some(host.position(&HostEvent::StorageEnd), "storage never committed");
    let completed = must_some(
        host.position(&HostEvent::Completed(true)),
        "update never completed",
    );
    let finished = must_some(host.position(&HostEvent::Finished), "finish never called");
    assert!(end < completed);
    assert!(completed < finished);
    assert_eq!(storage.end_count(), 1);
    assert_eq!(
        host.events().first(),
        Some(&HostEvent::StorageReset),
        "storage is reset before the first request"
    );
    Ok(())
}

#[test]
fn test_mismatched_chunk_is_ignored() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));
    let writes_before = storage.write_count();
    host.clear();

    handler.process_chunk(2, fixture.chunk(2));

    assert_eq!(handler.next_chunk(), Some(1));
    assert_eq!(host.statuses(), vec![FirmwareState::Downloading]);
    assert_eq!(storage.write_count(), writes_before);
    assert!(host.requests().is_empty());
    assert!(handler.is_watchdog_armed());

    handler.process_chunk(1, fixture.chunk(1));
    handler.process_chunk(2, fixture.chunk(2));
    assert_eq!(host.completions(), vec![true]);
    Ok(())
}

#[test]
fn test_write_failures_exhaust_single_retry() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5).with_retries(1);
    storage.fail_writes(2);

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));

    assert!(handler.is_active());
    assert_eq!(handler.restarts(), Some(1));
    assert_eq!(handler.retries_left(), Some(0));
    assert_eq!(host.requests(), vec![0, 0]);

    handler.process_chunk(0, fixture.chunk(0));

    assert!(!handler.is_active());
    assert!(!handler.is_watchdog_armed());
    assert_eq!(host.completions(), vec![false]);
    assert_eq!(host.finish_count(), 1);
    assert_eq!(host.requests(), vec![0, 0]);
    assert_eq!(
        host.failure_details(),
        vec![
            "Only wrote (0) bytes of binary data to flash memory instead of expected (5)"
                .to_string();
            2
        ]
    );
    assert!(!storage.is_writing());
    Ok(())
}

#[test]
fn test_restart_keeps_spent_retries() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5).with_retries(2);
    storage.fail_writes(1);

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));
    assert_eq!(handler.retries_left(), Some(1));
    assert_eq!(handler.next_chunk(), Some(0));

    deliver_all(&mut handler, &fixture);

    assert_eq!(host.completions(), vec![true]);
    assert_eq!(storage.committed(), Some(fixture.image.clone()));
    Ok(())
}

#[test]
fn test_checksum_mismatch_restarts_then_fails() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5).with_retries(1);
    let descriptor = UpdateDescriptor::builder(fixture.image.len(), "SHA256", "00")
        .config(fixture.config())
        .storage(storage.clone())
        .on_complete(host.on_complete())
        .build();

    handler.start(descriptor);
    deliver_all(&mut handler, &fixture);
    assert_eq!(handler.next_chunk(), Some(0));
    assert_eq!(host.requests(), vec![0, 1, 2, 0]);

    deliver_all(&mut handler, &fixture);

    assert_eq!(host.completions(), vec![false]);
    assert_eq!(storage.end_count(), 0);
    let details = host.failure_details();
    assert_eq!(details.len(), 2);
    assert!(details.iter().all(|d| d.starts_with("Checksum verification failed")));
    Ok(())
}

#[test]
fn test_begin_failure_restarts_download() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(8, 4);
    storage.fail_begins(1);

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));
    assert_eq!(host.requests(), vec![0, 0]);
    assert!(
        host.failure_details()
            .iter()
            .any(|d| d.starts_with("Failed to initialize flash updater"))
    );

    deliver_all(&mut handler, &fixture);
    assert_eq!(host.completions(), vec![true]);
    assert_eq!(storage.begin_count(), 2);
    Ok(())
}

#[test]
fn test_end_failure_restarts_download() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(8, 4);
    storage.fail_ends(1);

    handler.start(fixture.descriptor(&host, &storage));
    deliver_all(&mut handler, &fixture);
    assert!(handler.is_active());
    assert_eq!(handler.restarts(), Some(1));

    deliver_all(&mut handler, &fixture);
    assert_eq!(host.completions(), vec![true]);
    assert_eq!(storage.end_count(), 2);
    Ok(())
}

#[test]
fn test_timeouts_retry_chunk_until_budget_exhausted() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5)
        .with_retries(2)
        .with_timeout(Duration::from_secs(5));

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));

    for _ in 0..3 {
        clock.advance(Duration::from_secs(5));
        assert!(handler.poll_timeout());
    }

    assert_eq!(host.requests(), vec![0, 1, 1, 1]);
    assert_eq!(host.completions(), vec![false]);
    assert_eq!(host.finish_count(), 1);
    assert!(!handler.is_watchdog_armed());
    assert!(!handler.poll_timeout());
    assert_eq!(storage.reset_count(), 2);
    Ok(())
}

#[test]
fn test_successful_chunk_refills_retry_budget() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5).with_retries(1);

    handler.start(fixture.descriptor(&host, &storage));
    clock.advance(fixture.timeout);
    assert!(handler.poll_timeout());
    assert_eq!(handler.retries_left(), Some(0));

    handler.process_chunk(0, fixture.chunk(0));
    assert_eq!(handler.retries_left(), Some(1));
    Ok(())
}

#[test]
fn test_timeout_not_due_before_deadline() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));
    let deadline = must_some(handler.next_deadline(), "watchdog not armed");
    clock.advance(fixture.timeout.saturating_sub(Duration::from_millis(1)));

    assert!(!handler.poll_timeout());
    assert_eq!(handler.next_deadline(), Some(deadline));
    assert_eq!(host.requests(), vec![0]);
    Ok(())
}

#[test]
fn test_failed_request_still_arms_watchdog() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, clock) = handler(&host);
    let fixture = UpdateFixture::new(4, 4);
    host.fail_requests(1);

    handler.start(fixture.descriptor(&host, &storage));

    assert_eq!(host.statuses(), vec![FirmwareState::Failed]);
    assert_eq!(
        host.failure_details(),
        vec!["Unable to request firmware chunk (0)".to_string()]
    );
    assert!(handler.is_watchdog_armed());

    clock.advance(fixture.timeout);
    assert!(handler.poll_timeout());
    assert_eq!(host.requests(), vec![0, 0]);

    deliver_all(&mut handler, &fixture);
    assert_eq!(host.completions(), vec![true]);
    Ok(())
}

#[test]
fn test_forced_timeout_retries_chunk() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));
    handler.handle_timeout();

    assert_eq!(host.requests(), vec![0, 0]);
    assert!(matches!(
        handler.last_error(),
        Some(OtaError::ChunkTimeout { chunk: 0, .. })
    ));
    Ok(())
}

#[test]
fn test_stop_during_download_fails_update() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));
    handler.stop();

    assert!(!handler.is_active());
    assert!(!handler.is_watchdog_armed());
    assert_eq!(handler.phase(), SessionPhase::Idle);
    assert_eq!(host.completions(), vec![false]);
    assert_eq!(host.finish_count(), 1);
    assert_eq!(host.failure_details(), vec!["Firmware update aborted".to_string()]);
    assert!(storage.image().is_empty());

    handler.stop();
    assert_eq!(host.finish_count(), 1);
    Ok(())
}

#[test]
fn test_chunks_after_stop_are_ignored() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));
    handler.stop();
    host.clear();

    handler.process_chunk(0, fixture.chunk(0));

    assert!(host.events().is_empty());
    Ok(())
}

#[test]
fn test_progress_callback_cancels_update() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);
    host.cancel_at_chunk(1);

    handler.start(fixture.descriptor(&host, &storage));
    handler.process_chunk(0, fixture.chunk(0));

    assert!(!handler.is_active());
    assert!(!handler.is_watchdog_armed());
    assert_eq!(host.requests(), vec![0]);
    assert_eq!(host.completions(), vec![false]);
    assert_eq!(host.finish_count(), 1);
    Ok(())
}

#[test]
fn test_start_without_storage_fails_immediately() -> TestResult {
    let host = RecordingHost::new();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(10, 5);
    let descriptor = fixture
        .descriptor_builder()
        .on_complete(host.on_complete())
        .build();

    handler.start(descriptor);

    assert!(!handler.is_active());
    assert!(host.requests().is_empty());
    assert_eq!(host.statuses(), vec![FirmwareState::Failed]);
    assert_eq!(host.completions(), vec![false]);
    assert_eq!(host.finish_count(), 1);
    assert_eq!(handler.last_error(), Some(&OtaError::MissingStorage));
    Ok(())
}

#[test]
fn test_start_with_missing_callback_fails_immediately() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let callbacks = HandlerCallbacks::builder()
        .request_chunk(|_| true)
        .finish(|| true)
        .build();
    let mut handler = OtaHandler::with_clock(callbacks, ManualClock::new());
    let fixture = UpdateFixture::new(10, 5);

    handler.start(fixture.descriptor(&host, &storage));

    assert!(!handler.is_active());
    assert_eq!(host.completions(), vec![false]);
    assert_eq!(
        handler.last_error(),
        Some(&OtaError::MissingCallback("report_status"))
    );
    assert_eq!(storage.reset_count(), 0);
    Ok(())
}

#[test]
fn test_unsupported_algorithm_fails_immediately() -> TestResult {
    let host = RecordingHost::new();
    let storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let descriptor = UpdateDescriptor::builder(10, "MURMUR3_32", "abc")
        .storage(storage)
        .on_complete(host.on_complete())
        .build();

    handler.start(descriptor);

    assert!(!handler.is_active());
    assert_eq!(host.completions(), vec![false]);
    insta::assert_snapshot!(
        host.failure_details().join("\n"),
        @"Checksum algorithm not usable: Unsupported checksum algorithm: MURMUR3_32"
    );
    Ok(())
}

#[test]
fn test_start_while_active_replaces_session() -> TestResult {
    let host = RecordingHost::new();
    let first_storage = host.storage();
    let second_storage = host.storage();
    let (mut handler, _clock) = handler(&host);
    let first = UpdateFixture::new(10, 5);
    let second = UpdateFixture::new(7, 4);

    handler.start(first.descriptor(&host, &first_storage));
    handler.process_chunk(0, first.chunk(0));
    handler.start(second.descriptor(&host, &second_storage));

    assert_eq!(host.completions(), vec![false]);
    assert_eq!(handler.total_chunks(), Some(2));
    assert_eq!(handler.next_chunk(), Some(0));

    deliver_all(&mut handler, &second);
    assert_eq!(host.completions(), vec![false, true]);
    assert_eq!(second_storage.committed(), Some(second.image.clone()));
    assert_eq!(first_storage.committed(), None);
    Ok(())
}

#[test]
fn test_alternative_digests_verify() -> TestResult {
    for (algorithm, encoding) in [
        (DigestAlgorithm::Sha384, DigestEncoding::Hex),
        (DigestAlgorithm::Sha512, DigestEncoding::Base64),
        (DigestAlgorithm::Crc32, DigestEncoding::Hex),
        (DigestAlgorithm::Md5, DigestEncoding::Hex),
        (DigestAlgorithm::Md5, DigestEncoding::Base64),
    ] {
        let host = RecordingHost::new();
        let storage = host.storage();
        let (mut handler, _clock) = handler(&host);
        let fixture = UpdateFixture::new(33, 8)
            .with_algorithm(algorithm)
            .with_encoding(encoding);

        handler.start(fixture.descriptor(&host, &storage));
        deliver_all(&mut handler, &fixture);

        assert_eq!(host.completions(), vec![true], "{algorithm} / {encoding:?}");
    }
    Ok(())
}

#[test]
fn test_memory_storage_end_to_end() -> TestResult {
    let host = RecordingHost::new();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(20, 6);
    let descriptor = fixture
        .descriptor_builder()
        .storage(MemoryStorage::with_capacity(20))
        .on_complete(host.on_complete())
        .build();

    handler.start(descriptor);
    deliver_all(&mut handler, &fixture);

    assert_eq!(host.completions(), vec![true]);
    Ok(())
}

#[test]
fn test_memory_storage_capacity_exceeded_fails_update() -> TestResult {
    let host = RecordingHost::new();
    let (mut handler, _clock) = handler(&host);
    let fixture = UpdateFixture::new(20, 6).with_retries(0);
    let descriptor = fixture
        .descriptor_builder()
        .storage(MemoryStorage::with_capacity(10))
        .on_complete(host.on_complete())
        .build();

    handler.start(descriptor);
    handler.process_chunk(0, fixture.chunk(0));

    assert_eq!(host.completions(), vec![false]);
    assert!(
        host.failure_details()
            .iter()
            .any(|d| d.starts_with("Failed to initialize flash updater"))
    );
    Ok(())
}
