//! Port contract for invocation presenters.

use super::domain::Presentation;
use crate::invocation::domain::Invocation;

/// Produces a presentation for an invocation snapshot.
///
/// Implementations must be pure: the same snapshot always yields the same
/// presentation.
pub trait Presenter: Send + Sync {
    /// Describes `invocation` for display.
    fn present(&self, invocation: &Invocation) -> Presentation;
}
