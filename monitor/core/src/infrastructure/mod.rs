// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod repositories;
pub mod workflow_plane_client;

pub use workflow_plane_client::WorkflowPlaneClient;
