// ABOUTME: Command implementations for the readiness checker
// ABOUTME: Exports the check command and its run summary types

pub mod check;

pub use check::{
    check, check_target, check_targets, RunSummary, TargetOutcome, UnreachableTarget,
    EXIT_NOTHING_CHECKED, EXIT_NOT_READY, EXIT_OK,
};
