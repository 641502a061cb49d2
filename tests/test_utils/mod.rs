//! Shared helpers for the integration tests.

pub mod mock_server;

pub use mock_server::{CapturedRequest, MockServer, Reply};
