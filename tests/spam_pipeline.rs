//! End-to-end tests for the spam check pipeline.
//!
//! Every test drives the full four-stage chain against an
//! `InMemoryMailService`, so batching and admission limits are enforced by
//! the service exactly as a real backend would.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use spam_sieve::services::InMemoryMailService;
use spam_sieve::{MsgData, PipelineConfig, Services, SpamChecker};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn emails(list: &[&str]) -> Vec<String> {
    list.iter().map(|e| e.to_string()).collect()
}

/// Two users, three messages: 10 and 12 are spam, 11 is clean.
fn scenario_service() -> InMemoryMailService {
    InMemoryMailService::new()
        .with_user("a@x", 1)
        .with_user("b@x", 2)
        .with_messages(1, [10, 11])
        .with_messages(2, [12])
        .with_verdict(10, true)
        .with_verdict(11, false)
        .with_verdict(12, true)
}

fn checker(service: Arc<InMemoryMailService>, config: PipelineConfig) -> SpamChecker {
    SpamChecker::new(config, Services::from_single(service)).unwrap()
}

/// Build a service with `users` accounts, `per_user` messages each and a
/// couple of aliases per account.
fn large_service(users: u64, per_user: u64) -> (InMemoryMailService, Vec<String>) {
    let mut service = InMemoryMailService::new().with_latency(Duration::from_millis(1));
    let mut identifiers = Vec::new();
    for id in 0..users {
        let primary = format!("user{id}@example.com");
        let alias = format!("u{id}@alias.example.com");
        service = service.with_user(primary.clone(), id).with_user(alias.clone(), id);
        identifiers.push(primary);
        identifiers.push(alias);

        let msgs: Vec<u64> = (0..per_user).map(|m| id * 1000 + m).collect();
        for &m in &msgs {
            service = service.with_verdict(m, m % 7 == 0);
        }
        service = service.with_messages(id, msgs);
    }
    (service, identifiers)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_produces_sorted_lines() {
    init_tracing();
    let service = Arc::new(scenario_service());
    let checker = checker(Arc::clone(&service), PipelineConfig::default());

    let lines = timeout(TEST_TIMEOUT, checker.check(emails(&["a@x", "b@x", "a@x"])))
        .await
        .unwrap();

    assert_eq!(lines, vec!["true 10", "true 12", "false 11"]);
    // The duplicate a@x resolves but only one User{1} reaches the lister.
    assert_eq!(service.lookups(), 3);
    assert_eq!(service.batch_sizes().await, vec![2]);
    assert_eq!(service.classifications(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_classification_is_omitted() {
    init_tracing();
    let service = Arc::new(scenario_service().fail_classification(11));
    let checker = checker(service, PipelineConfig::default());

    let lines = timeout(TEST_TIMEOUT, checker.check(emails(&["a@x", "b@x", "a@x"])))
        .await
        .unwrap();

    assert_eq!(lines, vec!["true 10", "true 12"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_lookup_and_listing_are_omitted() {
    init_tracing();
    let service = Arc::new(
        scenario_service()
            .with_user("c@x", 3)
            .with_messages(3, [30])
            .with_verdict(30, true)
            .fail_listing_for(3),
    );
    let config = PipelineConfig {
        batch_size: 1,
        ..Default::default()
    };
    let checker = checker(service, config);

    let lines = timeout(
        TEST_TIMEOUT,
        checker.check(emails(&["a@x", "nobody@x", "c@x", "b@x"])),
    )
    .await
    .unwrap();

    assert_eq!(lines, vec!["true 10", "true 12", "false 11"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn large_run_respects_batch_and_admission_limits() {
    init_tracing();
    let (service, identifiers) = large_service(25, 8);
    let service = Arc::new(
        service
            .with_max_batch_size(3)
            .with_max_in_flight(4),
    );
    let config = PipelineConfig {
        batch_size: 3,
        admission_limit: 4,
        channel_capacity: 2,
    };
    let checker = checker(Arc::clone(&service), config);

    let lines = timeout(TEST_TIMEOUT, checker.check(identifiers))
        .await
        .unwrap();

    // 25 users * 8 messages, none dropped by the service's own limits.
    assert_eq!(lines.len(), 200);
    assert_eq!(service.lookups(), 50);
    assert_eq!(service.list_calls().await, 9);
    assert!(service.batch_sizes().await.iter().all(|&n| (1..=3).contains(&n)));
    assert_eq!(service.classifications(), 200);
    assert!(service.peak_in_flight() <= 4);

    let parsed: Vec<MsgData> = lines.iter().map(|l| l.parse().unwrap()).collect();
    let first_clean = parsed.iter().position(|r| !r.has_spam).unwrap();
    assert!(parsed[..first_clean].iter().all(|r| r.has_spam));
    assert!(parsed[first_clean..].iter().all(|r| !r.has_spam));
    assert!(parsed[..first_clean].windows(2).all(|w| w[0].id < w[1].id));
    assert!(parsed[first_clean..].windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn repeated_runs_are_identical() {
    init_tracing();
    let (service, identifiers) = large_service(12, 5);
    let checker = checker(Arc::new(service), PipelineConfig::default());

    let first = timeout(TEST_TIMEOUT, checker.check(identifiers.clone()))
        .await
        .unwrap();
    let mut reversed = identifiers;
    reversed.reverse();
    let second = timeout(TEST_TIMEOUT, checker.check(reversed))
        .await
        .unwrap();

    assert_eq!(first.len(), 60);
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lines_parse_back_to_results() {
    let service = Arc::new(scenario_service());
    let checker = checker(service, PipelineConfig::default());

    let lines = checker.check(emails(&["a@x", "b@x"])).await;
    let parsed: Vec<MsgData> = lines.iter().map(|l| l.parse().unwrap()).collect();

    assert_eq!(
        parsed,
        vec![
            MsgData::new(10, true),
            MsgData::new(12, true),
            MsgData::new(11, false),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn external_producer_drives_a_run() {
    let service = Arc::new(scenario_service());
    let checker = checker(service, PipelineConfig::default());
    let (tx, rx) = mpsc::channel(1);

    let mut stream = checker.run_from(rx);
    tokio::spawn(async move {
        for email in ["b@x", "a@x"] {
            tx.send(email.to_string()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let mut lines = Vec::new();
    while let Some(line) = timeout(TEST_TIMEOUT, stream.next()).await.unwrap() {
        lines.push(line);
    }
    assert_eq!(lines, vec!["true 10", "true 12", "false 11"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropping_the_stream_early_does_not_hang() {
    let (service, identifiers) = large_service(10, 4);
    let checker = checker(Arc::new(service), PipelineConfig::default());

    let mut stream = checker.run(identifiers);
    let first = timeout(TEST_TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(first.as_deref(), Some("true 0"));
    drop(stream);

    // The checker is reusable after an abandoned run.
    let lines = timeout(TEST_TIMEOUT, checker.check(emails(&["user1@example.com"])))
        .await
        .unwrap();
    assert_eq!(lines.len(), 4);
}
