//! Process-wide logging setup shared by binaries and tests.

pub mod subscriber;

pub use subscriber::{LogFormat, init, init_for_tests, init_with};
