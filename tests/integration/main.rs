//! Integration tests against local mock servers

mod common;
mod engine_tests;
mod extractor_tests;
mod search_tests;
