//! Presenter implementations.

mod fallback;

pub use fallback::FallbackPresenter;
