//! A minimal host for running Rust test bodies behind the gate.
//!
//! `run_gated` gives a test body the semantics of an "expected to fail"
//! marking: a marked test that panics is an expected failure, and a marked
//! test that passes is reported as an unexpected pass.

use std::any::Any;
use std::panic::{self, UnwindSafe};

use tracing::warn;

use crate::annotation::{Annotation, BUG_ANNOTATION};
use crate::error::GateError;
use crate::gate::BugStatusGate;
use crate::ports::test_info::TestInfo;

/// Per-test context: title, annotations and the expected-failure marking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCase {
    /// Test title, used in diagnostics.
    pub title: String,
    /// Annotations declared by the test.
    pub annotations: Vec<Annotation>,
    /// Set when the test has been marked as expected to fail.
    pub expected_failure: Option<String>,
}

impl TestCase {
    /// Creates an unannotated test case.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Adds an annotation.
    #[must_use]
    pub fn annotate(mut self, kind: impl Into<String>, description: impl Into<String>) -> Self {
        self.annotations.push(Annotation::new(kind, description));
        self
    }

    /// Adds a `bug` annotation linking `url`.
    #[must_use]
    pub fn bug(self, url: impl Into<String>) -> Self {
        self.annotate(BUG_ANNOTATION, url)
    }
}

impl TestInfo for TestCase {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn expect_failure(&mut self, reason: String) {
        self.expected_failure = Some(reason);
    }
}

/// Result of a gated test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Unmarked test that passed.
    Passed,
    /// Unmarked test that failed.
    Failed {
        /// Panic message of the test body.
        message: String,
    },
    /// Marked test that failed, as expected.
    ExpectedFailure {
        /// Why the test was marked.
        reason: String,
        /// Panic message of the test body.
        message: String,
    },
    /// Marked test that passed; the linked ticket may be fixed but still open.
    UnexpectedPass {
        /// Why the test was marked.
        reason: String,
    },
}

impl Verdict {
    /// Whether the run counts as green.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed | Self::ExpectedFailure { .. })
    }

    /// Converts the verdict into a `Result` for use as a `#[test]` return value.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure for `Failed` and `UnexpectedPass`.
    pub fn into_result(self) -> Result<(), String> {
        match self {
            Self::Passed | Self::ExpectedFailure { .. } => Ok(()),
            Self::Failed { message } => Err(message),
            Self::UnexpectedPass { reason } => {
                Err(format!("Expected to fail, but passed.\n{reason}"))
            }
        }
    }
}

/// Runs the gate for `case`, then `body`, and interprets the outcome.
///
/// # Errors
///
/// Returns the gate's error without running `body`.
pub async fn run_gated<F>(
    gate: &BugStatusGate,
    case: &mut TestCase,
    body: F,
) -> Result<Verdict, GateError>
where
    F: FnOnce() + UnwindSafe,
{
    gate.check(case).await?;
    let outcome =
        panic::catch_unwind(body).map_err(|payload| panic_message(payload.as_ref()));

    let verdict = match (case.expected_failure.clone(), outcome) {
        (None, Ok(())) => Verdict::Passed,
        (None, Err(message)) => Verdict::Failed { message },
        (Some(reason), Err(message)) => Verdict::ExpectedFailure { reason, message },
        (Some(reason), Ok(())) => {
            warn!(test = %case.title, "test marked as expected to fail has passed");
            Verdict::UnexpectedPass { reason }
        }
    };
    Ok(verdict)
}

/// Blocking variant of [`run_gated`] for synchronous tests.
///
/// Starts its own current-thread runtime, so it must not be called from
/// inside an async context.
///
/// # Errors
///
/// Returns the gate's error without running `body`, or
/// [`GateError::Runtime`] if the async runtime cannot be started.
pub fn run_gated_blocking<F>(
    gate: &BugStatusGate,
    case: &mut TestCase,
    body: F,
) -> Result<Verdict, GateError>
where
    F: FnOnce() + UnwindSafe,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(GateError::Runtime)?;
    runtime.block_on(run_gated(gate, case, body))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test panicked".to_string()
    }
}
