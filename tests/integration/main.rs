//! Integration tests for the crawl pipeline
//!
//! These tests use wiremock to create mock HTTP servers and drive whole crawl
//! jobs end-to-end against an in-memory database.

mod common;
mod fetcher_tests;
mod orchestrator_tests;
