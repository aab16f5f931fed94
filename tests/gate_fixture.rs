//! End-to-end gate behaviour through the harness, using `rstest` fixtures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bug_gate::config::{DONE_STATUSES_ENV, TOKEN_ENV};
use bug_gate::ports::TrackerFuture;
use bug_gate::{
    run_gated, BugStatusGate, GateConfig, GateError, GateOutcome, IssueStatus, StatusTracker,
    TestCase, Verdict,
};
use rstest::{fixture, rstest};

/// Tracker returning one status for every requested key, counting calls.
struct FixedStatus {
    status: &'static str,
    calls: Arc<AtomicUsize>,
}

impl StatusTracker for FixedStatus {
    fn bulk_fetch(&self, _project: &str, keys: &[String]) -> TrackerFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let statuses: Vec<IssueStatus> = keys
            .iter()
            .map(|k| IssueStatus::new(k.clone(), self.status))
            .collect();
        Box::pin(async move { Ok(statuses) })
    }
}

fn gate_with(config: GateConfig, status: &'static str) -> (BugStatusGate, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let tracker = FixedStatus {
        status,
        calls: Arc::clone(&calls),
    };
    (BugStatusGate::new(config, Box::new(tracker)), calls)
}

#[fixture]
fn config() -> GateConfig {
    bug_gate::logging::init_logging();
    GateConfig::default().with_token("qa@acme.test:api-token")
}

#[fixture]
fn acme_42() -> TestCase {
    TestCase::new("applies discount code").bug("https://acme.atlassian.net/browse/ACME-42")
}

fn discount_is_applied() {
    let total = 100 - 10;
    assert_eq!(total, 80, "discount applied twice");
}

#[rstest]
#[tokio::test]
async fn in_progress_bug_makes_failure_expected(config: GateConfig, mut acme_42: TestCase) {
    let (gate, calls) = gate_with(config, "In Progress");

    let verdict = run_gated(&gate, &mut acme_42, discount_is_applied)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match verdict {
        Verdict::ExpectedFailure { reason, message } => {
            assert!(reason.contains("ACME-42"));
            assert!(reason.contains("In Progress"));
            assert!(message.contains("discount applied twice"));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[rstest]
#[case::title_case("Done")]
#[case::upper_case("DONE")]
#[case::lower_case("done")]
#[tokio::test]
async fn done_bug_runs_normally(
    config: GateConfig,
    mut acme_42: TestCase,
    #[case] status: &'static str,
) {
    let (gate, _) = gate_with(config, status);

    let verdict = run_gated(&gate, &mut acme_42, || {}).await.unwrap();

    assert_eq!(verdict, Verdict::Passed);
    assert!(acme_42.expected_failure.is_none());
}

#[rstest]
#[tokio::test]
async fn no_credential_means_no_tracker_call(mut acme_42: TestCase) {
    let (gate, calls) = gate_with(GateConfig::default(), "In Progress");

    let verdict = run_gated(&gate, &mut acme_42, || {}).await.unwrap();

    assert_eq!(verdict, Verdict::Passed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn unannotated_test_never_queries_tracker(config: GateConfig) {
    let (gate, calls) = gate_with(config, "In Progress");
    let mut case = TestCase::new("renders footer");

    assert_eq!(gate.check(&mut case).await.unwrap(), GateOutcome::NoBugs);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn tickets_from_two_projects_are_rejected(config: GateConfig, acme_42: TestCase) {
    let (gate, calls) = gate_with(config, "In Progress");
    let mut case = acme_42.bug("https://globex.atlassian.net/browse/GLX-3");

    let err = run_gated(&gate, &mut case, || {}).await.unwrap_err();

    assert!(matches!(err, GateError::MixedProjects { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[tokio::test]
async fn done_statuses_from_environment(mut acme_42: TestCase) {
    let config = GateConfig::from_lookup(|key| match key {
        TOKEN_ENV => Some("qa@acme.test:api-token".to_string()),
        DONE_STATUSES_ENV => Some("done,won't fix".to_string()),
        _ => None,
    })
    .unwrap();
    let (gate, _) = gate_with(config, "Won't Fix");

    let outcome = gate.check(&mut acme_42).await.unwrap();

    assert!(matches!(outcome, GateOutcome::Resolved { .. }));
}
