//! Presenter selection.

mod registry;

pub use registry::PresenterRegistry;
