// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod monitor;
pub mod monitor_run;
pub mod time_window;
pub mod run_status;
pub mod repository;
pub mod workload;
pub mod service_config;
