//! Integration tests for multi-node mesh behavior
//!
//! This test suite validates:
//! - Routing table distribution from the root to every member
//! - Tolerance of unreachable members and malformed frames
//! - Keypress broadcast over the stored table
//! - Topology events driving role, interfaces and the readiness gate

pub mod test_utils;

#[cfg(test)]
mod distribution_tests;

#[cfg(test)]
mod topology_tests;
