//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or in-process adapters. All tests run on the host with no
//! real hardware or bus daemon required.

mod agent_tests;
mod daemon_flow_tests;
mod mock_hw;
