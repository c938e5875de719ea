// ABOUTME: Configuration module for the authorization engine and its bootstrap routine
// ABOUTME: Environment-only configuration approach with validated defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Environment-driven engine and bootstrap configuration
pub mod environment;

pub use environment::{BootstrapConfig, EngineConfig};
