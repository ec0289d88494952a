//! `symlink` module - a link at `target` pointing at `source`
//!
//! A regular file in the way is an error; a link to the wrong place is
//! replaced. Reported state: `{ source, target }`.

use anyhow::{Context, Result, bail};
use converge::{ApplyContext, Catalog, Claim, Handler, Param, ResolvedResource};
use std::fs;
use std::path::{Path, PathBuf};

use super::{desired, notify, record};

const BUCKET: &str = "symlinks";

pub struct SymlinkHandler;

#[derive(Debug, PartialEq, Eq)]
enum LinkState {
    Missing,
    Correct,
    WrongTarget(PathBuf),
    FileExists,
}

fn paths(resource: &ResolvedResource) -> Result<(PathBuf, PathBuf)> {
    let source = crate::paths::expand(resource.require_str("source")?);
    let target = crate::paths::expand(resource.require_str("target")?);
    Ok((source, target))
}

fn check(source: &Path, target: &Path) -> Result<LinkState> {
    if !target.is_symlink() {
        return Ok(if target.exists() {
            LinkState::FileExists
        } else {
            LinkState::Missing
        });
    }

    let link = fs::read_link(target)
        .with_context(|| format!("Failed to read symlink: {}", target.display()))?;
    let actual = if link.is_absolute() {
        link
    } else {
        target.parent().map(|p| p.join(&link)).unwrap_or(link)
    };

    // Canonicalize for comparison
    let expected = source.canonicalize().unwrap_or_else(|_| source.to_path_buf());
    let resolved = actual.canonicalize().unwrap_or_else(|_| actual.clone());
    if resolved == expected {
        Ok(LinkState::Correct)
    } else {
        Ok(LinkState::WrongTarget(actual))
    }
}

fn create(source: &Path, target: &Path) -> Result<()> {
    if !source.exists() {
        bail!("Source does not exist: {}", source.display());
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(source, target).with_context(|| {
        format!(
            "Failed to create symlink: {} -> {}",
            target.display(),
            source.display()
        )
    })?;

    #[cfg(windows)]
    {
        use std::os::windows::fs::{symlink_dir, symlink_file};

        if source.is_dir() {
            // Junctions need no admin privileges
            if let Err(e) = junction::create(source, target) {
                log::debug!("Junction creation failed ({e}), trying symlink_dir");
                symlink_dir(source, target).with_context(|| {
                    format!(
                        "Failed to create directory symlink: {} -> {}",
                        target.display(),
                        source.display()
                    )
                })?;
            }
        } else {
            symlink_file(source, target).with_context(|| {
                format!(
                    "Failed to create file symlink: {} -> {}",
                    target.display(),
                    source.display()
                )
            })?;
        }
    }

    #[cfg(not(any(unix, windows)))]
    bail!("Symlinks not supported on this platform");

    Ok(())
}

fn remove(target: &Path) -> Result<()> {
    fs::remove_file(target)
        .or_else(|_| fs::remove_dir(target))
        .with_context(|| format!("Failed to remove symlink: {}", target.display()))
}

fn state(source: &Path, target: &Path) -> Param {
    Param::map()
        .with("source", source.to_string_lossy().to_string())
        .with("target", target.to_string_lossy().to_string())
}

impl Handler for SymlinkHandler {
    fn modules(&self) -> &[&str] {
        &["symlink"]
    }

    fn preflight(&self, _catalog: &Catalog, resource: &ResolvedResource) -> Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        let (Some(source), Some(target)) =
            (resource.param_str("source"), resource.param_str("target"))
        else {
            return Ok(Claim::handled());
        };
        let (source, target) = (crate::paths::expand(source), crate::paths::expand(target));
        Ok(match check(&source, &target)? {
            LinkState::Correct => Claim::reported(state(&source, &target)),
            _ => Claim::handled(),
        })
    }

    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        let (source, target) = paths(resource)?;
        let target_key = target.to_string_lossy().to_string();
        let current = check(&source, &target)?;

        if !desired(ctx, resource)?.is_present() {
            match current {
                LinkState::Correct | LinkState::WrongTarget(_) => {
                    remove(&target)?;
                    log::info!("Removed symlink {}", target.display());
                    notify("on_delete", ctx.catalog, resource)?;
                }
                LinkState::FileExists => {
                    log::warn!("{} is not a symlink, leaving it", target.display());
                }
                LinkState::Missing => {}
            }
            ctx.catalog.remove_by(BUCKET, "target", &target_key);
            return Ok(Claim::handled());
        }

        match current {
            LinkState::Correct => log::debug!("{} already links to {}", target.display(), source.display()),
            LinkState::Missing => {
                create(&source, &target)?;
                notify("on_create", ctx.catalog, resource)?;
            }
            LinkState::WrongTarget(actual) => {
                log::info!(
                    "Relinking {} (was {})",
                    target.display(),
                    actual.display()
                );
                remove(&target)?;
                create(&source, &target)?;
                notify("on_create", ctx.catalog, resource)?;
            }
            LinkState::FileExists => {
                bail!(
                    "{} exists and is not a symlink; refusing to replace it",
                    target.display()
                );
            }
        }

        let state = state(&source, &target);
        ctx.catalog
            .upsert_by(BUCKET, "target", record(resource, &state));
        Ok(Claim::reported(state))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::handlers::testing::{run_handler, state as reported};
    use converge::{Direction, Resource};

    fn link(source: &Path, target: &Path) -> Resource {
        Resource::new("link")
            .with_module("symlink")
            .with_param("source", source.to_string_lossy().to_string())
            .with_param("target", target.to_string_lossy().to_string())
    }

    #[test]
    fn test_creates_link_and_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.txt");
        let target = dir.path().join("links").join("dst.txt");
        fs::write(&source, "data").unwrap();
        let mut catalog = Catalog::new();

        let (found, applied) =
            run_handler(&SymlinkHandler, &mut catalog, link(&source, &target), Direction::Forward)
                .unwrap();
        assert_eq!(found, Claim::handled());
        assert!(target.is_symlink());
        assert!(reported(&applied).is_some());
        assert_eq!(catalog.bucket(BUCKET).len(), 1);

        let (found, _) =
            run_handler(&SymlinkHandler, &mut catalog, link(&source, &target), Direction::Forward)
                .unwrap();
        assert!(reported(&found).is_some());
        assert_eq!(catalog.bucket(BUCKET).len(), 1);
    }

    #[test]
    fn test_relinks_wrong_target() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        let target = dir.path().join("current");
        fs::write(&old, "").unwrap();
        fs::write(&new, "").unwrap();
        std::os::unix::fs::symlink(&old, &target).unwrap();

        assert!(matches!(check(&new, &target).unwrap(), LinkState::WrongTarget(_)));
        run_handler(&SymlinkHandler, &mut Catalog::new(), link(&new, &target), Direction::Forward)
            .unwrap();
        assert_eq!(check(&new, &target).unwrap(), LinkState::Correct);
    }

    #[test]
    fn test_refuses_to_replace_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        fs::write(&source, "").unwrap();
        fs::write(&target, "keep me").unwrap();

        let err = run_handler(
            &SymlinkHandler,
            &mut Catalog::new(),
            link(&source, &target),
            Direction::Forward,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a symlink"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
    }

    #[test]
    fn test_reverse_removes_link_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let target = dir.path().join("dst");
        fs::write(&source, "").unwrap();
        let mut catalog = Catalog::new();

        run_handler(&SymlinkHandler, &mut catalog, link(&source, &target), Direction::Forward)
            .unwrap();
        run_handler(&SymlinkHandler, &mut catalog, link(&source, &target), Direction::Reverse)
            .unwrap();
        assert!(!target.is_symlink());
        assert!(source.exists());
        assert!(catalog.bucket(BUCKET).is_empty());
    }
}
