//! Behavioural test suites for the management protocol crate.
