// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use fanout_core::FakeClock;
use fanout_llm::FakeInvoker;
use std::path::Path;

const EVERY_MINUTE: &str = r#"
name: minutely
schedule:
  cron: "0 * * * * *"
input:
  items: [{title: x}]
map:
  prompt: "Analyze {{title}}"
  output: []
reduce:
  type: text
"#;

fn write_package(root: &Path, name: &str, yaml: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(crate::discover::PIPELINE_FILE), yaml).unwrap();
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 30).unwrap()
}

fn scheduler_at(
    root: &Path,
    invoker: &FakeInvoker,
    clock: &FakeClock,
) -> Scheduler<FakeClock> {
    clock.set_utc(base_time());
    let config = SchedulerConfig::new(root).poll_interval(Duration::from_millis(20));
    Scheduler::with_clock(config, Arc::new(invoker.clone()), clock.clone())
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(start_paused = true)]
async fn fires_when_the_cron_time_arrives() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "minutely", EVERY_MINUTE);
    let invoker = FakeInvoker::new().default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // Let startup settle; nothing is due yet.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(invoker.call_count(), 0);

    // Cross the next minute boundary.
    clock.advance(Duration::from_secs(60));
    wait_for(|| invoker.call_count() >= 1).await;

    shutdown.cancel();
    runner.await.unwrap().unwrap();

    let state = scheduler.status("minutely").unwrap();
    assert_eq!(state.status, ScheduleStatus::Idle);
    assert_eq!(state.stats.total_runs, 1);
    assert_eq!(state.stats.successful_runs, 1);
    assert_eq!(state.last_run.as_ref().unwrap().items_processed, Some(1));
    // Next occurrence is scheduled
    assert!(state.next_run.unwrap() > clock.utc());
}

#[tokio::test(start_paused = true)]
async fn missed_run_policy_run_fires_immediately() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "minutely", EVERY_MINUTE);
    let invoker = FakeInvoker::new().default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = scheduler_at(tmp.path(), &invoker, &clock);

    // Pre-existing state with a nextRun in the past
    let mut state = ScheduleState::new("minutely", true);
    state.next_run = Some(base_time() - chrono::Duration::minutes(30));
    state.save(&tmp.path().join("minutely")).unwrap();

    let shutdown = CancellationToken::new();
    let runner = {
        let shutdown = shutdown.clone();
        let scheduler = Arc::new(scheduler);
        let handle = Arc::clone(&scheduler);
        tokio::spawn(async move { handle.run(shutdown).await })
    };

    wait_for(|| invoker.call_count() >= 1).await;
    shutdown.cancel();
    runner.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn missed_run_policy_skip_advances_to_future() {
    let tmp = tempfile::tempdir().unwrap();
    let yaml = EVERY_MINUTE.replace(
        "cron: \"0 * * * * *\"",
        "cron: \"0 * * * * *\"\n  missedExecution: skip",
    );
    write_package(tmp.path(), "minutely", &yaml);
    let invoker = FakeInvoker::new().default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    let mut state = ScheduleState::new("minutely", true);
    state.next_run = Some(base_time() - chrono::Duration::minutes(30));
    state.save(&tmp.path().join("minutely")).unwrap();

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    runner.await.unwrap().unwrap();

    assert_eq!(invoker.call_count(), 0);
    let state = scheduler.status("minutely").unwrap();
    assert_eq!(state.next_run, Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 1, 0).unwrap()));
}

#[tokio::test(start_paused = true)]
async fn failed_run_retries_per_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let yaml = EVERY_MINUTE.replace(
        "cron: \"0 * * * * *\"",
        "cron: \"0 * * * * *\"\n  retryPolicy: {maxRetries: 1, delayMs: 10}",
    );
    write_package(tmp.path(), "minutely", &yaml);
    let invoker = FakeInvoker::new().fail_times(1).default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    clock.advance(Duration::from_secs(60));
    wait_for(|| invoker.call_count() >= 2).await;
    shutdown.cancel();
    runner.await.unwrap().unwrap();

    let state = scheduler.status("minutely").unwrap();
    assert_eq!(state.status, ScheduleStatus::Idle);
    assert_eq!(state.stats.total_runs, 2);
    assert_eq!(state.stats.successful_runs, 1);
    assert_eq!(state.stats.failed_runs, 1);
    assert_eq!(state.history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_mark_error_and_keep_scheduling() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "minutely", EVERY_MINUTE);
    let invoker = FakeInvoker::new().reply_error("Analyze", "always broken");
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    clock.advance(Duration::from_secs(60));
    wait_for(|| invoker.call_count() >= 1).await;
    // Give the tick a moment to persist the final state
    wait_for(|| {
        ScheduleState::load(&tmp.path().join("minutely"))
            .ok()
            .flatten()
            .map(|s| s.status == ScheduleStatus::Error)
            .unwrap_or(false)
    })
    .await;
    shutdown.cancel();
    runner.await.unwrap().unwrap();

    let state = scheduler.status("minutely").unwrap();
    assert_eq!(state.status, ScheduleStatus::Error);
    assert_eq!(state.stats.failed_runs, 1);
    assert!(state.next_run.is_some());
}

#[tokio::test(start_paused = true)]
async fn late_fire_outside_window_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let yaml = EVERY_MINUTE.replace(
        "cron: \"0 * * * * *\"",
        "cron: \"0 * * * * *\"\n  window: {maxDelayMinutes: 5}",
    );
    write_package(tmp.path(), "minutely", &yaml);
    let invoker = FakeInvoker::new().default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Simulate a long stall: the persisted nextRun is 10 minutes stale.
    let dir = tmp.path().join("minutely");
    let mut state = ScheduleState::load(&dir).unwrap().unwrap();
    state.next_run = Some(clock.utc() - chrono::Duration::minutes(10));
    state.save(&dir).unwrap();

    wait_for(|| {
        ScheduleState::load(&dir)
            .ok()
            .flatten()
            .and_then(|s| s.next_run)
            .map(|next| next > clock.utc())
            .unwrap_or(false)
    })
    .await;
    shutdown.cancel();
    runner.await.unwrap().unwrap();

    // Skipped: the run never executed, but the next occurrence is set.
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn paused_schedule_does_not_fire() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "minutely", EVERY_MINUTE);
    let invoker = FakeInvoker::new().default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    scheduler.pause("minutely").unwrap();

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    clock.advance(Duration::from_secs(120));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(invoker.call_count(), 0);

    // Resume and cross the next boundary
    scheduler.resume("minutely").unwrap();
    clock.advance(Duration::from_secs(60));
    wait_for(|| invoker.call_count() >= 1).await;

    shutdown.cancel();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn trigger_runs_outside_the_cadence() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "minutely", EVERY_MINUTE);
    let invoker = FakeInvoker::new().default_reply("ok");
    let clock = FakeClock::new();
    let scheduler = scheduler_at(tmp.path(), &invoker, &clock);

    let record = scheduler.trigger("minutely").await.unwrap();
    assert!(record.success);
    assert_eq!(record.items_processed, Some(1));
    assert_eq!(invoker.call_count(), 1);

    let state = scheduler.status("minutely").unwrap();
    assert_eq!(state.stats.total_runs, 1);
    assert_eq!(state.status, ScheduleStatus::Idle);
    assert_eq!(scheduler.history("minutely").unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_pipeline_is_a_dedicated_error() {
    let tmp = tempfile::tempdir().unwrap();
    let invoker = FakeInvoker::new();
    let clock = FakeClock::new();
    let scheduler = scheduler_at(tmp.path(), &invoker, &clock);

    assert!(matches!(
        scheduler.status("nope"),
        Err(SchedulerError::UnknownPipeline(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_conflict_on_the_lock() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "minutely", EVERY_MINUTE);
    let invoker = FakeInvoker::new();
    let clock = FakeClock::new();

    let first = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));
    let shutdown = CancellationToken::new();
    let runner = {
        let first = Arc::clone(&first);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { first.run(shutdown).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = scheduler_at(tmp.path(), &invoker, &clock);
    let err = second.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Lock(LockError::Conflict { .. })));

    shutdown.cancel();
    runner.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn disabled_schedule_is_marked_and_never_fires() {
    let tmp = tempfile::tempdir().unwrap();
    let yaml = EVERY_MINUTE.replace(
        "cron: \"0 * * * * *\"",
        "cron: \"0 * * * * *\"\n  enabled: false",
    );
    write_package(tmp.path(), "minutely", &yaml);
    let invoker = FakeInvoker::new();
    let clock = FakeClock::new();
    let scheduler = Arc::new(scheduler_at(tmp.path(), &invoker, &clock));

    let shutdown = CancellationToken::new();
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    clock.advance(Duration::from_secs(180));
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    runner.await.unwrap().unwrap();

    assert_eq!(invoker.call_count(), 0);
    let state = scheduler.status("minutely").unwrap();
    assert_eq!(state.status, ScheduleStatus::Disabled);
    assert!(state.next_run.is_none());
}
