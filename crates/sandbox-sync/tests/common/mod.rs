//! Shared test utilities for sandbox-sync integration tests.
//!
//! - `FakeGit` / `FakeHosting`: recording fakes with scripted failures
//! - `TestHarness`: temp workspace store wired to the fakes

pub mod fakes;
pub mod harness;

pub use fakes::{FakeGit, FakeHosting, GitCall};
pub use harness::TestHarness;
