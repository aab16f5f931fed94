//! Host test framework port.

use crate::annotation::Annotation;

/// The view of the currently running test that the gate needs.
///
/// A test framework integration implements this for its per-test context.
pub trait TestInfo {
    /// Annotations attached to the current test.
    fn annotations(&self) -> &[Annotation];

    /// Marks the current test as expected to fail, with a diagnostic reason.
    fn expect_failure(&mut self, reason: String);
}
