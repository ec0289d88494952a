//! Whole runs driven through the public API

use converge::{
    ApplyContext, Catalog, Claim, Direction, Error, GraphError, Handler, HandlerRegistry,
    Orchestrator, Outcome, Param, Phase, ResolvedResource, Resource, RunObserver, apply, watch,
    watch_with,
};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

/// Logs `<phase>:<module>:<name>` for every call it sees
struct Recording {
    modules: &'static [&'static str],
    log: Log,
}

impl Recording {
    fn new(modules: &'static [&'static str], log: &Log) -> Self {
        Self {
            modules,
            log: Arc::clone(log),
        }
    }

    fn record(&self, phase: &str, resource: &ResolvedResource) {
        self.log.lock().unwrap().push(format!(
            "{phase}:{}:{}",
            self.modules[0], resource.name
        ));
    }
}

impl Handler for Recording {
    fn modules(&self) -> &[&str] {
        self.modules
    }

    fn preflight(&self, _catalog: &Catalog, resource: &ResolvedResource) -> anyhow::Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        self.record("preflight", resource);
        Ok(Claim::handled())
    }

    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> anyhow::Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        self.record("apply", resource);

        let mut record = serde_json::json!({ "name": resource.name });
        if let Some(value) = resource.param("value") {
            record["value"] = value.to_json();
        }
        ctx.catalog.push(self.modules[0], record);

        Ok(Claim::reported(
            Param::map().with("id", format!("{}-id", resource.name)),
        ))
    }
}

fn entries(log: &Log, prefix: &str) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}

#[test]
fn test_each_resource_dispatched_once_to_its_module() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap()
        .with(Recording::new(&["beta"], &log))
        .unwrap();

    let catalog = apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("one").with_module("alpha"),
            Resource::new("two").with_module("beta").depends_on("one"),
        ],
        false,
    )
    .unwrap();

    assert_eq!(
        entries(&log, "apply:"),
        vec!["apply:alpha:one", "apply:beta:two"]
    );
    assert_eq!(catalog.bucket("alpha").len(), 1);
    assert_eq!(catalog.bucket("beta").len(), 1);
}

#[test]
fn test_unmapped_module_aborts_before_apply() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();

    let err = apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("first").with_module("alpha"),
            Resource::new("second")
                .with_module("gamma")
                .depends_on("first"),
        ],
        false,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        Error::UnmappedModule { ref resource, ref module } if resource == "second" && module == "gamma"
    ));
    assert!(entries(&log, "apply:").is_empty());
}

#[test]
fn test_watch_reads_target_set_earlier_in_run() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();

    let catalog = apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("X")
                .with_module("alpha")
                .with_param(
                    "value",
                    watch_with("Y._target.id", |id| {
                        id.as_str().map(|s| Param::from(format!("ref:{s}")))
                    }),
                )
                .depends_on("Y"),
            Resource::new("Y").with_module("alpha"),
        ],
        false,
    )
    .unwrap();

    let x = catalog.find_by("alpha", "name", "X").unwrap();
    assert_eq!(x["value"], "ref:Y-id");
}

#[test]
fn test_static_skip_bypasses_handler() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();

    let report = Orchestrator::new(&handlers)
        .run(
            &mut Catalog::new(),
            vec![
                Resource::new("kept").with_module("alpha"),
                Resource::new("skipped")
                    .with_module("alpha")
                    .with_skip(true)
                    .depends_on("kept"),
            ],
            Direction::Forward,
        )
        .unwrap();

    assert_eq!(report.plan.forward, vec!["kept", "skipped"]);
    assert_eq!(entries(&log, "apply:"), vec!["apply:alpha:kept"]);
    assert_eq!(report.summary.skipped, 1);
    assert!(report.states["skipped"].target.is_none());
}

#[test]
fn test_skip_follows_other_resource() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();

    // Resolves to Y's id once Y is applied, so X is skipped
    apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("Y").with_module("alpha"),
            Resource::new("X")
                .with_module("alpha")
                .with_skip(watch("Y._target.id"))
                .depends_on("Y"),
        ],
        false,
    )
    .unwrap();

    assert_eq!(entries(&log, "apply:"), vec!["apply:alpha:Y"]);
}

#[test]
fn test_reverse_run_tears_down_dependants_first() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();

    apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("A").with_module("alpha"),
            Resource::new("B").with_module("alpha").depends_on("A"),
            Resource::new("C").with_module("alpha").depends_on("B"),
        ],
        true,
    )
    .unwrap();

    // Preflight is always forward
    assert_eq!(
        entries(&log, "preflight:"),
        vec!["preflight:alpha:A", "preflight:alpha:B", "preflight:alpha:C"]
    );
    assert_eq!(
        entries(&log, "apply:"),
        vec!["apply:alpha:C", "apply:alpha:B", "apply:alpha:A"]
    );
}

#[test]
fn test_cycle_aborts_before_any_handler() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();

    let err = apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("A").with_module("alpha").depends_on("B"),
            Resource::new("B").with_module("alpha").depends_on("A"),
        ],
        false,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Graph(GraphError::Cycle(_))));
    assert!(log.lock().unwrap().is_empty());
}

/// Runs once per host, recording the host each resolution saw
struct FanOut {
    seen: Log,
}

impl Handler for FanOut {
    fn modules(&self) -> &[&str] {
        &["fanout"]
    }

    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> anyhow::Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        for host in resource.param("hosts").map(Param::as_string_list).unwrap_or_default() {
            let per_host = ctx.resolve_for_host(&host)?;
            let greeting = per_host.require_str("greeting")?;
            self.seen.lock().unwrap().push(greeting.to_string());
        }
        ctx.clear_current_host();
        Ok(Claim::handled())
    }
}

#[test]
fn test_fan_out_resolves_per_host() {
    let seen = Log::default();
    let handlers = HandlerRegistry::new()
        .with(FanOut {
            seen: Arc::clone(&seen),
        })
        .unwrap();

    apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("greet")
                .with_module("fanout")
                .with_param("hosts", vec![Param::from("h1"), Param::from("h2")])
                .with_param(
                    "greeting",
                    watch_with("greet._currentHost", |host| {
                        host.as_str().map(|h| Param::from(format!("hello {h}")))
                    }),
                ),
        ],
        false,
    )
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["hello h1", "hello h2"]);
}

#[derive(Default)]
struct Events(Vec<String>);

impl RunObserver for Events {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        self.0.push(format!("start {phase} {count}"));
    }
    fn on_resource_start(&mut self, _phase: Phase, _name: &str, _module: Option<&str>) {}
    fn on_resource_complete(&mut self, phase: Phase, name: &str, outcome: &Outcome) {
        self.0.push(format!("{phase} {name} {outcome:?}"));
    }
    fn on_delay(&mut self, name: &str, secs: u64) {
        self.0.push(format!("delay {name} {secs}"));
    }
    fn on_phase_complete(&mut self, phase: Phase) {
        self.0.push(format!("end {phase}"));
    }
}

#[test]
fn test_observer_sees_both_passes() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Recording::new(&["alpha"], &log))
        .unwrap();
    let mut events = Events::default();

    Orchestrator::new(&handlers)
        .with_observer(&mut events)
        .run(
            &mut Catalog::new(),
            vec![Resource::new("group").include(Resource::new("leaf").with_module("alpha"))],
            Direction::Forward,
        )
        .unwrap();

    assert_eq!(
        events.0,
        vec![
            "start preflight 2",
            "preflight group Unhandled",
            "preflight leaf Claimed",
            "end preflight",
            "start apply 2",
            "apply group Unhandled",
            "apply leaf Reported",
            "end apply",
        ]
    );
}

/// Reports existing state from preflight and records what apply sees
struct Discovering {
    log: Log,
}

impl Handler for Discovering {
    fn modules(&self) -> &[&str] {
        &["found"]
    }

    fn preflight(&self, _catalog: &Catalog, resource: &ResolvedResource) -> anyhow::Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        let mut state = Param::map().with("id", format!("{}-found", resource.name));
        if let Some(seen) = resource.param_str("value") {
            self.log
                .lock()
                .unwrap()
                .push(format!("preflight {} saw {seen}", resource.name));
            state = state.with("saw", seen);
        }
        Ok(Claim::reported(state))
    }

    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> anyhow::Result<Claim> {
        if !self.handles(resource) {
            return Ok(Claim::Declined);
        }
        let target = resource.target.as_ref().map(Param::to_json);
        ctx.catalog.push(
            "found",
            serde_json::json!({ "name": resource.name, "target": target }),
        );
        Ok(Claim::handled())
    }
}

#[test]
fn test_preflight_state_visible_later_in_run() {
    let log = Log::default();
    let handlers = HandlerRegistry::new()
        .with(Discovering {
            log: Arc::clone(&log),
        })
        .unwrap();

    let catalog = apply(
        &handlers,
        Catalog::new(),
        vec![
            Resource::new("X")
                .with_module("found")
                .with_param("value", watch("Y._target.id"))
                .depends_on("Y"),
            Resource::new("Y").with_module("found"),
        ],
        false,
    )
    .unwrap();

    // X's preflight ran after Y's and read the state Y reported
    assert_eq!(*log.lock().unwrap(), vec!["preflight X saw Y-found"]);

    // X's apply saw the target its own preflight reported
    let x = catalog.find_by("found", "name", "X").unwrap();
    assert_eq!(
        x["target"],
        serde_json::json!({"id": "X-found", "saw": "Y-found"})
    );
}
