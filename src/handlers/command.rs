//! `command` module - a shell command run once per host
//!
//! Params:
//! - `command`: script to run when converging (required)
//! - `hosts`: host names to fan out over; without it the command runs once
//! - `creates`: path whose existence means the command already ran
//! - `undo`: script to run on teardown
//! - `settle`: seconds to wait after the command actually ran
//!
//! Every param is resolved again for each host, so values can read the
//! resource's own `_currentHost`. The host is also passed to the script as
//! `KEEL_HOST`. Reported state: `{ hosts, ran }`.

use anyhow::Result;
use converge::{ApplyContext, Claim, Handler, Param, ResolvedResource};
use serde_json::json;

use super::{desired, notify};
use crate::runner::run_shell;

const BUCKET: &str = "commands";

/// Environment variable carrying the current host
pub const HOST_ENV: &str = "KEEL_HOST";

pub struct CommandHandler;

impl CommandHandler {
    fn hosts(resource: &ResolvedResource) -> Vec<Option<String>> {
        let hosts = resource
            .param("hosts")
            .map(Param::as_string_list)
            .unwrap_or_default();
        if hosts.is_empty() {
            vec![None]
        } else {
            hosts.into_iter().map(Some).collect()
        }
    }

    /// Run for one host; returns whether the script was executed
    fn converge_host(resource: &ResolvedResource, host: Option<&str>) -> Result<bool> {
        let command = resource.require_str("command")?;
        if let Some(creates) = resource.param_str("creates") {
            let creates = crate::paths::expand(creates);
            if creates.exists() {
                log::debug!(
                    "{} exists, not running {}",
                    creates.display(),
                    resource.name
                );
                return Ok(false);
            }
        }

        log::info!("Running {} on {}", resource.name, host.unwrap_or("localhost"));
        let output = run_shell(command, &[(HOST_ENV, host.unwrap_or_default())])?;
        if !output.is_empty() {
            log::debug!("{}: {output}", resource.name);
        }
        Ok(true)
    }

    fn undo_host(resource: &ResolvedResource, host: Option<&str>) -> Result<bool> {
        let Some(undo) = resource.param_str("undo") else {
            return Ok(false);
        };
        log::info!("Undoing {} on {}", resource.name, host.unwrap_or("localhost"));
        run_shell(undo, &[(HOST_ENV, host.unwrap_or_default())])?;
        Ok(true)
    }
}

impl Handler for CommandHandler {
    fn modules(&self) -> &[&str] {
        &["command"]
    }

    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        let present = desired(ctx, resource)?.is_present();

        let mut hosts = Vec::new();
        let mut ran = 0_i64;
        for host in Self::hosts(resource) {
            let per_host = match &host {
                Some(host) => ctx.resolve_for_host(host)?,
                None => resource.clone(),
            };
            let executed = if present {
                Self::converge_host(&per_host, host.as_deref())?
            } else {
                Self::undo_host(&per_host, host.as_deref())?
            };
            if executed {
                ran += 1;
            }
            hosts.push(Param::from(host.unwrap_or_default()));
        }
        ctx.clear_current_host();

        if !present {
            ctx.catalog.remove_by(BUCKET, "name", &resource.name);
            if ran > 0 {
                notify("on_delete", ctx.catalog, resource)?;
            }
            return Ok(Claim::handled());
        }

        if ran > 0 {
            notify("on_create", ctx.catalog, resource)?;
            if let Some(settle) = resource.param("settle").and_then(Param::as_u64) {
                ctx.set_delay(settle);
            }
        }

        let state = Param::map().with("hosts", hosts).with("ran", ran);
        ctx.catalog.upsert_by(
            BUCKET,
            "name",
            json!({
                "name": resource.name,
                "command": resource.param_str("command"),
                "hosts": state.get("hosts").map(Param::to_json),
            }),
        );
        Ok(Claim::reported(state))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::handlers::testing::{run_handler, state};
    use converge::{Catalog, Direction, HandlerRegistry, Orchestrator, Resource, Sleeper, watch_with};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_runs_once_per_host_with_host_env() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let mut catalog = Catalog::new();

        let resource = Resource::new("greet")
            .with_module("command")
            .with_param(
                "command",
                format!("echo \"$KEEL_HOST\" >> {}", log.display()),
            )
            .with_param("hosts", vec![Param::from("a"), Param::from("b")]);

        let (_, applied) =
            run_handler(&CommandHandler, &mut catalog, resource, Direction::Forward).unwrap();
        assert_eq!(fs::read_to_string(&log).unwrap(), "a\nb\n");
        assert_eq!(state(&applied).unwrap().get("ran"), Some(&Param::Int(2)));
        assert_eq!(catalog.bucket(BUCKET)[0]["hosts"], json!(["a", "b"]));
    }

    #[test]
    fn test_params_resolve_per_host() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();
        let resource = Resource::new("touch")
            .with_module("command")
            .with_param("hosts", vec![Param::from("x"), Param::from("y")])
            .with_param(
                "command",
                watch_with("touch._currentHost", move |host| {
                    host.as_str().map(|h| Param::from(format!("touch {base}/{h}")))
                }),
            );

        run_handler(&CommandHandler, &mut Catalog::new(), resource, Direction::Forward).unwrap();
        assert!(dir.path().join("x").exists());
        assert!(dir.path().join("y").exists());
    }

    #[test]
    fn test_creates_guard_skips_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        fs::write(&marker, "").unwrap();

        let resource = Resource::new("once")
            .with_module("command")
            .with_param("command", "exit 1")
            .with_param("creates", marker.to_string_lossy().to_string());

        let (_, applied) =
            run_handler(&CommandHandler, &mut Catalog::new(), resource, Direction::Forward)
                .unwrap();
        assert_eq!(state(&applied).unwrap().get("ran"), Some(&Param::Int(0)));
    }

    #[test]
    fn test_reverse_runs_undo() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("made");
        let mut catalog = Catalog::new();
        let resource = || {
            Resource::new("make")
                .with_module("command")
                .with_param("command", format!("touch {}", marker.display()))
                .with_param("undo", format!("rm {}", marker.display()))
        };

        run_handler(&CommandHandler, &mut catalog, resource(), Direction::Forward).unwrap();
        assert!(marker.exists());
        assert_eq!(catalog.bucket(BUCKET).len(), 1);

        run_handler(&CommandHandler, &mut catalog, resource(), Direction::Reverse).unwrap();
        assert!(!marker.exists());
        assert!(catalog.bucket(BUCKET).is_empty());
    }

    #[test]
    fn test_settle_overrides_delay() {
        #[derive(Default)]
        struct Naps(Vec<Duration>);
        impl Sleeper for &mut Naps {
            fn sleep(&mut self, duration: Duration) {
                self.0.push(duration);
            }
        }

        let handlers = HandlerRegistry::new().with(CommandHandler).unwrap();
        let mut naps = Naps::default();
        let report = Orchestrator::new(&handlers)
            .with_sleeper(&mut naps)
            .run(
                &mut Catalog::new(),
                vec![
                    Resource::new("boot")
                        .with_module("command")
                        .with_param("command", "true")
                        .with_param("settle", 3_i64)
                        .with_delay(1_i64),
                ],
                Direction::Forward,
            )
            .unwrap();

        assert_eq!(naps.0, vec![Duration::from_secs(3)]);
        assert_eq!(report.summary.delayed_secs, 3);
    }

    #[test]
    fn test_failure_propagates() {
        let resource = Resource::new("bad")
            .with_module("command")
            .with_param("command", "echo nope >&2; exit 2");
        let err = run_handler(&CommandHandler, &mut Catalog::new(), resource, Direction::Forward)
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
