pub mod catalog;
pub mod check;
pub mod plan;
pub mod run;

use anyhow::Result;
use converge::Resource;
use std::path::PathBuf;

use crate::Context;
use crate::catalog_store::CatalogStore;

/// Load the manifest the context points at
pub(crate) fn load_manifest(ctx: &Context) -> Result<(PathBuf, Vec<Resource>)> {
    let path = crate::paths::manifest_path(ctx.manifest.as_deref())?;
    let resources = crate::manifest::load(&path)?;
    Ok((path, resources))
}

/// Catalog store the context points at
pub(crate) fn catalog_store(ctx: &Context) -> Result<CatalogStore> {
    Ok(CatalogStore::new(crate::paths::catalog_path(
        ctx.catalog.as_deref(),
    )?))
}
