//! Shared helpers for voice integration tests.

pub mod mocks;
