// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[test]
fn acquire_writes_info_and_releases_on_drop() {
    let tmp = tempfile::tempdir().unwrap();
    let lock = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).unwrap();

    assert_eq!(lock.info().pid, std::process::id());
    assert!(tmp.path().join(LOCK_FILE).exists());

    drop(lock);
    assert!(!tmp.path().join(LOCK_FILE).exists());
}

#[test]
fn second_acquire_conflicts() {
    let tmp = tempfile::tempdir().unwrap();
    let _held = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).unwrap();

    let err = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).unwrap_err();
    assert!(matches!(err, LockError::Conflict { .. }));
}

#[test]
fn acquire_succeeds_after_release() {
    let tmp = tempfile::tempdir().unwrap();
    let held = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).unwrap();
    drop(held);

    assert!(SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).is_ok());
}

#[test]
fn stale_lock_file_without_holder_is_taken_over() {
    let tmp = tempfile::tempdir().unwrap();
    let stale = LockInfo {
        pid: 999_999,
        hostname: "elsewhere".to_string(),
        started_at: now() - chrono::Duration::hours(2),
        heartbeat: now() - chrono::Duration::hours(1),
    };
    std::fs::write(
        tmp.path().join(LOCK_FILE),
        serde_json::to_string(&stale).unwrap(),
    )
    .unwrap();

    let lock = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).unwrap();
    assert_eq!(lock.info().pid, std::process::id());
}

#[test]
fn fresh_foreign_heartbeat_conflicts_even_without_flock() {
    let tmp = tempfile::tempdir().unwrap();
    let foreign = LockInfo {
        pid: 4242,
        hostname: "other-host".to_string(),
        started_at: now(),
        heartbeat: now(),
    };
    std::fs::write(
        tmp.path().join(LOCK_FILE),
        serde_json::to_string(&foreign).unwrap(),
    )
    .unwrap();

    let err = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now()).unwrap_err();
    assert!(matches!(err, LockError::Conflict { pid: 4242, .. }));
}

#[test]
fn garbage_lock_content_is_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join(LOCK_FILE), "not json at all").unwrap();

    let lock = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, now());
    assert!(lock.is_ok());
}

#[test]
fn heartbeat_updates_the_stamp() {
    let tmp = tempfile::tempdir().unwrap();
    let started = now();
    let mut lock = SchedulerLock::acquire(tmp.path(), DEFAULT_STALE_THRESHOLD, started).unwrap();

    let later = started + chrono::Duration::seconds(30);
    lock.heartbeat(later).unwrap();
    assert_eq!(lock.info().heartbeat, later);

    let raw = std::fs::read_to_string(tmp.path().join(LOCK_FILE)).unwrap();
    let on_disk: LockInfo = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk.heartbeat, later);
}

#[test]
fn staleness_threshold() {
    let info = LockInfo {
        pid: 1,
        hostname: "h".to_string(),
        started_at: now(),
        heartbeat: now() - chrono::Duration::seconds(120),
    };
    assert!(info.is_stale(now(), Duration::from_secs(60)));
    assert!(!info.is_stale(now(), Duration::from_secs(600)));
}
