// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const SCHEDULED: &str = r#"
name: nightly
schedule:
  cron: "0 0 2 * * *"
  timezone: UTC
input:
  items: [{title: x}]
map:
  prompt: "Analyze {{title}}"
  output: []
reduce:
  type: text
"#;

const UNSCHEDULED: &str = r#"
name: manual
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
    std::fs::write(dir.join(PIPELINE_FILE), yaml).unwrap();
}

#[test]
fn finds_only_scheduled_packages_sorted() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "zeta", SCHEDULED);
    write_package(tmp.path(), "alpha", SCHEDULED);
    write_package(tmp.path(), "manual-only", UNSCHEDULED);

    let found = discover(tmp.path()).unwrap();
    let ids: Vec<&str> = found.iter().map(|d| d.pipeline_id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "zeta"]);
    assert_eq!(found[0].config.name, "nightly");
    assert_eq!(found[0].schedule.cron, "0 0 2 * * *");
}

#[test]
fn skips_directories_without_pipeline_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
    write_package(tmp.path(), "real", SCHEDULED);

    let found = discover(tmp.path()).unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn skips_malformed_pipelines() {
    let tmp = tempfile::tempdir().unwrap();
    write_package(tmp.path(), "broken", "name: [unclosed");
    write_package(tmp.path(), "ok", SCHEDULED);

    let found = discover(tmp.path()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].pipeline_id, "ok");
}

#[test]
fn skips_bad_cron_expressions() {
    let tmp = tempfile::tempdir().unwrap();
    let bad = SCHEDULED.replace("0 0 2 * * *", "definitely not cron");
    write_package(tmp.path(), "bad-cron", &bad);

    let found = discover(tmp.path()).unwrap();
    assert!(found.is_empty());
}

#[test]
fn missing_root_is_an_error() {
    assert!(matches!(
        discover(Path::new("/definitely/not/here")),
        Err(DiscoverError::Io { .. })
    ));
}
