// ABOUTME: Multi-tenant isolation support for every engine operation
// ABOUTME: Provides the per-operation request context and post-fetch ownership checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Multi-Tenant Isolation
//!
//! Every engine operation runs inside a [`RequestContext`] naming exactly one
//! tenant. Repositories are queried with that tenant, and every record that
//! comes back is checked again with [`TenantOwned`] before the engine acts on
//! it, so a store keyed by value alone still cannot leak across tenants.

/// Per-operation tenant, clock and storage deadline
pub mod context;
/// Post-fetch tenant ownership checks
pub mod isolation;

pub use context::RequestContext;
pub use isolation::TenantOwned;
