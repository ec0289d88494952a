//! `file` module - a file with given content
//!
//! Params: `path` (required), `content` (default empty), `ensure`.
//! Content is compared by blake3 hash, so an unchanged file is never
//! rewritten. Reported state: `{ path, hash }`.

use anyhow::{Context, Result};
use converge::{ApplyContext, Catalog, Claim, Handler, Param, ResolvedResource};
use std::fs;
use std::path::{Path, PathBuf};

use super::{desired, notify, record};

const BUCKET: &str = "files";

pub struct FileHandler;

impl FileHandler {
    fn path(resource: &ResolvedResource) -> Result<PathBuf> {
        Ok(crate::paths::expand(resource.require_str("path")?))
    }

    /// Hash of the file on disk, if it exists
    fn current_hash(path: &Path) -> Result<Option<String>> {
        if !path.is_file() {
            return Ok(None);
        }
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(blake3::hash(&bytes).to_hex().to_string()))
    }

    fn state(path: &Path, hash: &str) -> Param {
        Param::map()
            .with("path", path.to_string_lossy().to_string())
            .with("hash", hash)
    }
}

impl Handler for FileHandler {
    fn modules(&self) -> &[&str] {
        &["file"]
    }

    fn preflight(&self, _catalog: &Catalog, resource: &ResolvedResource) -> Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        // The path may still depend on a resource that does not exist yet
        let Some(path) = resource.param_str("path") else {
            return Ok(Claim::handled());
        };
        let path = crate::paths::expand(path);
        Ok(match Self::current_hash(&path)? {
            Some(hash) => Claim::reported(Self::state(&path, &hash)),
            None => Claim::handled(),
        })
    }

    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        let path = Self::path(resource)?;
        let path_key = path.to_string_lossy().to_string();
        let current = Self::current_hash(&path)?;

        if !desired(ctx, resource)?.is_present() {
            if current.is_some() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                log::info!("Removed {}", path.display());
                notify("on_delete", ctx.catalog, resource)?;
            }
            ctx.catalog.remove_by(BUCKET, "path", &path_key);
            return Ok(Claim::handled());
        }

        let content = resource.param_str("content").unwrap_or_default();
        let wanted = blake3::hash(content.as_bytes()).to_hex().to_string();

        if current.as_deref() != Some(wanted.as_str()) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directory: {}", parent.display())
                })?;
            }
            fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
            notify("on_create", ctx.catalog, resource)?;
        } else {
            log::debug!("{} is up to date", path.display());
        }

        let state = Self::state(&path, &wanted);
        ctx.catalog
            .upsert_by(BUCKET, "path", record(resource, &state));
        Ok(Claim::reported(state))
    }
}
