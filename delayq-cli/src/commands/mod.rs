//! Command handlers for Delayq CLI
//!
//! This module contains the handlers for schedule, listen, and stats.

pub mod listen;
pub mod schedule;
pub mod stats;
