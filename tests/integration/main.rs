//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for vendor APIs and run real
//! adapters, pipelines and the orchestrator against an on-disk SQLite file.

mod common;
mod coupon_tests;
mod orchestrator_tests;
mod product_tests;
