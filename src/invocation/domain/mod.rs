//! Domain model for tool invocations.

mod error;
mod ids;
mod invocation;
mod state;

pub use error::{InvocationDomainError, InvocationError, InvocationErrorKind};
pub use ids::InvocationId;
pub use invocation::Invocation;
pub use state::InvocationState;
