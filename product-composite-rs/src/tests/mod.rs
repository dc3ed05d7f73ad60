//! Orchestrator tests
//!
//! Mock-based call-count and ordering checks, fake-backed concurrency and
//! cancellation checks, and HTTP adapter checks against a mock server.

pub mod support;
pub mod orchestrator_tests;
