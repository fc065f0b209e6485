// ABOUTME: Library module for pg-bluegreen-readiness
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod postgres;
pub mod report;
pub mod rules;
pub mod target;
