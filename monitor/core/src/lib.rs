// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Monitor scheduling and execution engine for agent trace evaluation.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Schedules recurring and one-off evaluation runs against
//!   agent traces and reconciles their status with the workflow plane

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
