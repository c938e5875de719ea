// ABOUTME: One-shot idempotent default-tenant seeding run by the host process at startup
// ABOUTME: Safe to call from several instances at once; store conflicts mean another instance won
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use anyhow::{Context, Result};
use chrono::Utc;
use tollgate_core::ids::IdGenerator;
use tollgate_core::models::{Tenant, TenantId};
use tracing::info;

use crate::config::BootstrapConfig;
use crate::database::TenantRepository;

const DEFAULT_SLUG: &str = "default";

/// What seeding did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A tenant was created by this call
    Created(Tenant),
    /// Nothing to do
    AlreadyPresent,
}

/// Make sure the deployment has its default tenant
///
/// With `default_tenant_id` configured, that tenant is created if it does not
/// exist. Without one, a tenant with a fresh ID is created only when the store
/// holds no tenants at all.
///
/// # Errors
///
/// Returns an error if the tenant store fails for any reason other than a
/// concurrent insert of the same tenant
pub async fn ensure_default_tenant(
    tenants: &dyn TenantRepository,
    ids: &IdGenerator,
    config: &BootstrapConfig,
) -> Result<BootstrapOutcome> {
    let tenant_id = match config.default_tenant_id {
        Some(tenant_id) => {
            if tenants
                .get_by_id(tenant_id)
                .await
                .context("Failed to look up default tenant")?
                .is_some()
            {
                return Ok(BootstrapOutcome::AlreadyPresent);
            }
            tenant_id
        }
        None => {
            let existing = tenants.count().await.context("Failed to count tenants")?;
            if existing > 0 {
                return Ok(BootstrapOutcome::AlreadyPresent);
            }
            TenantId::new(ids.next_id())
        }
    };

    let slug = config.default_tenant_slug.clone().unwrap_or_else(|| {
        config
            .default_tenant_id
            .map_or_else(|| DEFAULT_SLUG.to_owned(), |id| format!("tenant-{id}"))
    });
    let tenant = Tenant::new(
        tenant_id,
        config.default_tenant_name.clone(),
        slug,
        Utc::now(),
    );

    match tenants.create(&tenant).await {
        Ok(()) => {
            info!(
                tenant_id = %tenant.id,
                slug = %tenant.slug,
                "Seeded default tenant"
            );
            Ok(BootstrapOutcome::Created(tenant))
        }
        Err(e) if e.is_conflict() => {
            info!(tenant_id = %tenant.id, "Default tenant seeded concurrently");
            Ok(BootstrapOutcome::AlreadyPresent)
        }
        Err(e) => Err(e).context("Failed to create default tenant"),
    }
}
