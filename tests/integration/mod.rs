//! Integration tests for scratchify
//!
//! This module contains tests that slice real running containers.

pub mod common;
pub mod docker;
