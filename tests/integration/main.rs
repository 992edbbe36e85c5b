//! Integration tests for the harvester
//!
//! `coordinator_tests` drives full runs against a scripted fetcher;
//! `http_fetcher_tests` checks the reqwest fetcher against wiremock servers.

mod coordinator_tests;
mod http_fetcher_tests;
