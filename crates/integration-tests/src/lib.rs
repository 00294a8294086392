//! Integration tests for the order autotag server.
//!
//! The tests in `tests/` exercise the server library directly: webhook
//! signature verification, rule evaluation semantics, and the wire shapes
//! of the settings endpoints. End-to-end tests against a running server
//! and database run separately in CI.
