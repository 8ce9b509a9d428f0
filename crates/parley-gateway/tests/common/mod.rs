//! Shared helpers for gateway integration tests.

pub mod scripted;
