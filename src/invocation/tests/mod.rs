//! Unit tests for the invocation module.
