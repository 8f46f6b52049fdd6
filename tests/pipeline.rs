//! End-to-end tests of the three stages over a mock Jenkins server

use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

use flake_hunter::ci::CiError;
use flake_hunter::config::{self, CiSettings, Config, ConfigError};
use flake_hunter::store::{ReportStore, StatsLog};
use flake_hunter::{ConnectError, JenkinsClient, analyze_store, connect, pipeline};
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn build_body(result: &str, revision: &str) -> String {
    format!(
        r#"{{"result": "{}", "actions": [{{"parameters": [{{"name": "sha1", "value": "{}"}}]}}]}}"#,
        result, revision
    )
}

fn report_body(status: &str) -> String {
    format!(
        r#"{{"suites": [{{"cases": [
            {{"className": "Suite.Foo", "name": "test_bar", "status": "{}"}},
            {{"className": "Suite.Foo", "name": "test_ok", "status": "PASSED"}}
        ]}}]}}"#,
        status
    )
}

fn client(server: &MockServer) -> JenkinsClient {
    let settings = CiSettings {
        base_url: server.base_url(),
        username: "bot".to_string(),
        password: "secret".to_string(),
        job_name: "backend".to_string(),
        timeout: Duration::from_secs(5),
    };
    JenkinsClient::new(settings, "sha1").expect("Failed to build client")
}

fn config_for(base_url: &str) -> Config {
    let base_url = base_url.to_string();
    Config::from_lookup(move |name| match name {
        config::ENV_URL => Some(base_url.clone()),
        config::ENV_USERNAME => Some("bot".to_string()),
        config::ENV_PASSWORD => Some("secret".to_string()),
        config::ENV_JOB_NAME => Some("backend".to_string()),
        _ => None,
    })
}

#[test]
fn test_connect_checks_health_first() {
    let server = MockServer::start();
    let root = server.mock(|when, then| {
        when.method(GET)
            .path("/api/json")
            .header("Authorization", "Basic Ym90OnNlY3JldA==");
        then.status(200).body("{}");
    });

    let client = connect(&config_for(&server.base_url())).expect("connect");
    root.assert();
    assert_eq!(
        client.build_url(3),
        format!("{}/job/backend/3/api/json", server.base_url())
    );
}

#[test]
fn test_connect_rejected_credentials_are_fatal() {
    let server = MockServer::start();
    let root = server.mock(|when, then| {
        when.method(GET).path("/api/json");
        then.status(401);
    });

    let err = connect(&config_for(&server.base_url())).unwrap_err();
    assert!(
        matches!(err, ConnectError::Unreachable(CiError::Status { status: 401, .. })),
        "got {:?}",
        err
    );
    root.assert();
}

#[test]
fn test_connect_missing_ci_variables_are_fatal() {
    let config = Config::from_lookup(|name| match name {
        config::ENV_URL => Some("http://127.0.0.1:9".to_string()),
        config::ENV_USERNAME => Some("bot".to_string()),
        _ => None,
    });
    let err = connect(&config).unwrap_err();
    assert!(
        matches!(err, ConnectError::Config(ConfigError::Missing(config::ENV_PASSWORD))),
        "got {:?}",
        err
    );
}

#[test]
fn test_selector_range_scenario() {
    let server = MockServer::start();
    for (build, result, revision) in [
        (5, "FAILURE", "origin/feature"),
        (6, "FAILURE", "origin/master"),
        (7, "FAILURE", "origin/feature"),
    ] {
        let body = build_body(result, revision);
        server.mock(move |when, then| {
            when.method(GET).path(format!("/job/backend/{}/api/json", build));
            then.status(200).body(body);
        });
    }

    let dir = TempDir::new().unwrap();
    let stats = StatsLog::new(dir.path().join("stats"));
    let selection =
        pipeline::select_and_record(&client(&server), 5..8, "origin/master", &stats).unwrap();

    assert_eq!(selection.retained, BTreeSet::from([6]));
    assert_eq!(fs::read_to_string(stats.path()).unwrap(), "6\n");
}

#[test]
fn test_full_run_is_resumable() {
    let server = MockServer::start();

    // 10..=12 failed on master, 13 failed on master but the test passed there,
    // 14 is on a feature branch, 15 does not exist.
    for build in 10..=13 {
        let body = build_body("UNSTABLE", "origin/master");
        server.mock(move |when, then| {
            when.method(GET).path(format!("/job/backend/{}/api/json", build));
            then.status(200).body(body);
        });
    }
    let feature = build_body("FAILURE", "origin/feature");
    server.mock(move |when, then| {
        when.method(GET).path("/job/backend/14/api/json");
        then.status(200).body(feature);
    });
    server.mock(|when, then| {
        when.method(GET).path("/job/backend/15/api/json");
        then.status(404);
    });

    let mut report_mocks = Vec::new();
    for (build, status) in [(10, "FAILED"), (11, "REGRESSION"), (12, "FAILED"), (13, "PASSED")] {
        let body = report_body(status);
        report_mocks.push(server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/job/backend/{}/testReport/api/json", build));
            then.status(200).body(body);
        }));
    }

    let dir = TempDir::new().unwrap();
    let stats = StatsLog::new(dir.path().join("stats"));
    let store = ReportStore::new(dir.path().join("logs"));
    let ci = client(&server);

    let first = pipeline::run(&ci, 10..16, "origin/master", &stats, &store, 10).unwrap();
    assert_eq!(first.selection.retained, BTreeSet::from([10, 11, 12, 13]));
    assert_eq!(first.selection.skipped, 1);
    assert_eq!(first.fetch.fetched, 4);

    let records = &first.report.records;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity.as_str(), "Suite.Foo:test_bar");
    assert_eq!(records[0].failure_count, 3);
    assert_eq!(records[0].builds, vec![10, 11, 12]);

    // A second run appends nothing and downloads nothing.
    let second = pipeline::run(&ci, 10..16, "origin/master", &stats, &store, 10).unwrap();
    assert_eq!(second.fetch.fetched, 0);
    assert_eq!(second.fetch.already_present, 4);
    assert_eq!(second.report, first.report);
    for mock in &report_mocks {
        mock.assert();
    }
    assert_eq!(fs::read_to_string(stats.path()).unwrap(), "10\n11\n12\n13\n");
}

#[test]
fn test_analyze_skips_corrupt_files() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::new(dir.path());
    store.write(1, report_body("FAILED").as_bytes()).unwrap();
    store.write(2, b"{\"suites\": [truncated").unwrap();
    store.write(3, b"{}").unwrap();
    store.write(4, report_body("FAILED").as_bytes()).unwrap();

    let report = analyze_store(&store, 10).unwrap();
    assert_eq!(report.reports_analyzed, 2);
    assert_eq!(report.reports_skipped, 2);
    assert_eq!(report.records[0].builds, vec![1, 4]);
}

#[test]
fn test_analyze_counts_each_build_once() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::new(dir.path());
    let body = report_body("FAILED");
    store.write(42, body.as_bytes()).unwrap();
    fs::write(dir.path().join("jenkins_build_042.json"), &body).unwrap();
    fs::write(dir.path().join("jenkins_build_+42.json"), &body).unwrap();

    let report = analyze_store(&store, 10).unwrap();
    assert_eq!(report.reports_analyzed, 1);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].failure_count, 1);
    assert_eq!(report.records[0].builds, vec![42]);
}

#[test]
fn test_analyze_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::new(dir.path().join("never-created"));
    let report = analyze_store(&store, 10).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.reports_analyzed, 0);
}
