//! Plugin manager integration tests
//! Run with: cargo test --test plugin_manager_test

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, Once};

use modbay::application::errors::{ExtractionError, LifecycleError, ModuleError, ResolutionError};
use modbay::domain::entities::Command;
use modbay::infrastructure::plugins::BuiltinLoader;
use modbay::plugins::{SkipReason, SkippedModule};
use modbay::{Config, HostContext, LifecycleState, Module, ModuleContext, PluginManager};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Ok,
    FailEnable,
    FailOnce,
    PanicEnable,
    FailDisable,
}

/// Test module that writes every successful call to a shared journal
struct Recorder {
    id: String,
    journal: Journal,
    behavior: Behavior,
    attempts: u32,
}

impl Module for Recorder {
    fn enable(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.attempts += 1;
        ctx.register_command(Command::new(format!("{}-ping", self.id)).with_handler(|_| Ok("pong".to_string())))?;
        ctx.subscribe("tick", |_| {})?;

        match self.behavior {
            Behavior::FailEnable => return Err(ModuleError::failed("refused")),
            Behavior::FailOnce if self.attempts == 1 => return Err(ModuleError::failed("not yet")),
            Behavior::PanicEnable => panic!("exploded"),
            _ => {}
        }

        self.journal.lock().unwrap().push(format!("enable:{}", self.id));
        Ok(())
    }

    fn disable(&mut self, _ctx: &mut ModuleContext) -> Result<(), ModuleError> {
        self.journal.lock().unwrap().push(format!("disable:{}", self.id));
        if self.behavior == Behavior::FailDisable {
            return Err(ModuleError::failed("stuck"));
        }
        Ok(())
    }
}

struct TestHost {
    _dir: TempDir,
    manager: PluginManager,
    journal: Journal,
}

impl TestHost {
    fn entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn state(&self, id: &str) -> LifecycleState {
        self.manager.get(id).unwrap().state()
    }

    fn ping_registered(&self, id: &str) -> bool {
        self.manager.host().commands().is_registered(&format!("{}-ping", id))
    }
}

/// Manifest for `id` at `version`; each dependency is `"dep"` or `"dep:req"`
fn manifest(id: &str, version: u32, deps: &[&str]) -> String {
    let mut yaml = format!("id: {}\nversion: {}\n", id, version);
    if !deps.is_empty() {
        yaml.push_str("depends:\n");
        for dep in deps {
            match dep.split_once(':') {
                Some((dep, req)) => yaml.push_str(&format!("  - id: {}\n    version: \"{}\"\n", dep, req)),
                None => yaml.push_str(&format!("  - id: {}\n", dep)),
            }
        }
    }
    yaml
}

fn host_with(config: Config, manifests: &[(&str, String)], behaviors: &[(&str, Behavior)]) -> TestHost {
    ensure_init();

    let dir = tempfile::tempdir().unwrap();
    for (id, yaml) in manifests {
        fs::write(dir.path().join(format!("{}.yml", id)), yaml).unwrap();
    }

    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let behaviors: HashMap<&str, Behavior> = behaviors.iter().copied().collect();

    let mut loader = BuiltinLoader::new();
    for (id, _) in manifests {
        let behavior = behaviors.get(id).copied().unwrap_or(Behavior::Ok);
        let journal = journal.clone();
        let id = id.to_string();
        loader.register(id.clone(), move || {
            Box::new(Recorder {
                id: id.clone(),
                journal: journal.clone(),
                behavior,
                attempts: 0,
            })
        });
    }

    let mut manager = PluginManager::new(HostContext::with_config(config)).with_loader(loader);
    let report = manager.scan(dir.path());
    assert!(report.is_clean(), "unexpected scan errors: {:?}", report.errors);

    TestHost {
        _dir: dir,
        manager,
        journal,
    }
}

fn host(manifests: &[(&str, String)], behaviors: &[(&str, Behavior)]) -> TestHost {
    host_with(Config::default(), manifests, behaviors)
}

#[test]
fn test_dependencies_load_first_then_by_id() {
    let mut h = host(
        &[
            ("a", manifest("a", 1, &["b"])),
            ("b", manifest("b", 1, &[])),
            ("c", manifest("c", 1, &[])),
        ],
        &[],
    );

    let report = h.manager.load_all().unwrap();
    assert_eq!(report.succeeded, vec!["b", "a", "c"]);

    h.manager.enable_all();
    assert_eq!(h.entries(), vec!["enable:b", "enable:a", "enable:c"]);
    assert_eq!(
        h.manager.list().iter().map(|c| c.id()).collect::<Vec<_>>(),
        vec!["b", "a", "c"]
    );
}

#[test]
fn test_uppercase_ids_follow_dependencies() {
    let mut h = host(
        &[
            ("A", manifest("A", 1, &["B"])),
            ("B", manifest("B", 1, &[])),
            ("C", manifest("C", 1, &[])),
        ],
        &[],
    );

    let report = h.manager.load_all().unwrap();
    assert_eq!(report.succeeded, vec!["B", "A", "C"]);

    h.manager.enable_all();
    assert_eq!(h.entries(), vec!["enable:B", "enable:A", "enable:C"]);
    assert!(h.ping_registered("A"));
}

#[test]
fn test_cycle_leaves_everything_discovered() {
    let mut h = host(
        &[("x", manifest("x", 1, &["y"])), ("y", manifest("y", 1, &["x"]))],
        &[],
    );

    let err = h.manager.load_all().unwrap_err();
    assert_eq!(err, ResolutionError::DependencyCycle(vec!["x".to_string(), "y".to_string()]));
    assert_eq!(h.state("x"), LifecycleState::Discovered);
    assert_eq!(h.state("y"), LifecycleState::Discovered);

    let report = h.manager.enable_all();
    assert!(report.succeeded.is_empty());
    assert!(h.entries().is_empty());
}

#[test]
fn test_incompatible_version_is_fatal() {
    let mut h = host(
        &[("p", manifest("p", 1, &["q:>=2"])), ("q", manifest("q", 1, &[]))],
        &[],
    );

    assert_eq!(
        h.manager.load_all().unwrap_err(),
        ResolutionError::IncompatibleVersion {
            module: "p".to_string(),
            dependency: "q".to_string(),
            required: ">=2".to_string(),
            found: 1,
        }
    );
    assert_eq!(h.state("q"), LifecycleState::Discovered);
}

#[test]
fn test_missing_dependency_is_fatal() {
    let mut h = host(&[("a", manifest("a", 1, &["ghost"]))], &[]);
    assert!(matches!(
        h.manager.load_all(),
        Err(ResolutionError::MissingDependency { ref module, ref dependency }) if module == "a" && dependency == "ghost"
    ));
}

#[test]
fn test_missing_optional_dependency_is_ignored() {
    let yaml = "id: a\nversion: 1\ndepends:\n  - id: ghost\n    optional: true\n".to_string();
    let mut h = host(&[("a", yaml)], &[]);

    h.manager.load_all().unwrap();
    assert!(h.manager.enable_all().is_clean());
    assert_eq!(h.state("a"), LifecycleState::Enabled);
}

#[test]
fn test_disable_order_is_reverse_of_enable() {
    let mut h = host(
        &[
            ("core", manifest("core", 1, &[])),
            ("db", manifest("db", 1, &["core"])),
            ("web", manifest("web", 1, &["core", "db"])),
            ("extra", manifest("extra", 1, &[])),
        ],
        &[],
    );
    h.manager.load_all().unwrap();
    h.manager.enable_all();
    h.manager.disable_all();

    let entries = h.entries();
    let enabled: Vec<&str> = entries.iter().filter_map(|e| e.strip_prefix("enable:")).collect();
    let mut disabled: Vec<&str> = entries.iter().filter_map(|e| e.strip_prefix("disable:")).collect();
    disabled.reverse();

    assert_eq!(enabled, vec!["core", "db", "extra", "web"]);
    assert_eq!(enabled, disabled);
    for id in ["core", "db", "web", "extra"] {
        assert_eq!(h.state(id), LifecycleState::Disabled);
        assert!(!h.ping_registered(id));
    }
}

#[test]
fn test_failed_dependency_skips_dependents() {
    let mut h = host(
        &[
            ("a", manifest("a", 1, &["b"])),
            ("b", manifest("b", 1, &[])),
            ("c", manifest("c", 1, &[])),
        ],
        &[("b", Behavior::FailEnable)],
    );
    h.manager.load_all().unwrap();

    let report = h.manager.enable_all();
    assert_eq!(report.succeeded, vec!["c"]);
    assert_eq!(report.failed_ids(), vec!["b"]);
    assert_eq!(
        report.skipped,
        vec![SkippedModule {
            id: "a".to_string(),
            reason: SkipReason::DependencyNotReady {
                dependency: "b".to_string(),
                state: LifecycleState::Loaded,
            },
        }]
    );

    assert_eq!(h.state("a"), LifecycleState::Loaded);
    assert_eq!(h.state("b"), LifecycleState::Loaded);
    assert_eq!(h.manager.get("b").unwrap().last_error(), Some("refused"));
    // Everything "b" registered before failing was rolled back
    assert!(!h.ping_registered("b"));
    assert_eq!(h.manager.host().events().subscriber_count("tick"), 1);
}

#[test]
fn test_panicking_module_is_isolated() {
    let mut h = host(
        &[("boom", manifest("boom", 1, &[])), ("calm", manifest("calm", 1, &[]))],
        &[("boom", Behavior::PanicEnable)],
    );
    h.manager.load_all().unwrap();

    let report = h.manager.enable_all();
    assert_eq!(report.succeeded, vec!["calm"]);
    match &report.failed[..] {
        [LifecycleError::ActivationFailure { id, reason }] => {
            assert_eq!(id, "boom");
            assert_eq!(reason, "panicked: exploded");
        }
        other => panic!("unexpected failures: {:?}", other),
    }
    assert_eq!(h.state("boom"), LifecycleState::Loaded);
    assert!(!h.ping_registered("boom"));
    assert!(h.ping_registered("calm"));
}

#[test]
fn test_enable_all_is_idempotent() {
    let mut h = host(
        &[("a", manifest("a", 1, &[])), ("b", manifest("b", 1, &["a"]))],
        &[],
    );
    h.manager.load_all().unwrap();

    let first = h.manager.enable_all();
    assert_eq!(first.succeeded, vec!["a", "b"]);
    let entries = h.entries();

    let second = h.manager.enable_all();
    assert!(second.succeeded.is_empty());
    assert_eq!(second.unchanged, vec!["a", "b"]);
    assert_eq!(h.entries(), entries);
}

#[test]
fn test_retry_after_activation_failure() {
    let mut h = host(&[("flaky", manifest("flaky", 1, &[]))], &[("flaky", Behavior::FailOnce)]);
    h.manager.load_all().unwrap();

    assert_eq!(h.manager.enable_all().failed_ids(), vec!["flaky"]);
    assert_eq!(h.state("flaky"), LifecycleState::Loaded);

    h.manager.enable("flaky").unwrap();
    assert_eq!(h.state("flaky"), LifecycleState::Enabled);
    assert!(h.manager.get("flaky").unwrap().last_error().is_none());
    assert!(h.ping_registered("flaky"));
}

#[test]
fn test_deactivation_failure_still_disables() {
    let mut h = host(&[("sticky", manifest("sticky", 1, &[]))], &[("sticky", Behavior::FailDisable)]);
    h.manager.load_all().unwrap();
    h.manager.enable_all();

    let report = h.manager.disable_all();
    assert!(matches!(
        &report.failed[..],
        [LifecycleError::DeactivationFailure { id, .. }] if id == "sticky"
    ));
    assert_eq!(h.state("sticky"), LifecycleState::Disabled);
    assert!(!h.ping_registered("sticky"));
    assert_eq!(h.manager.get("sticky").unwrap().held_resources(), 0);
}

#[test]
fn test_single_module_management() {
    let mut h = host(
        &[("a", manifest("a", 1, &["b"])), ("b", manifest("b", 1, &[]))],
        &[],
    );
    h.manager.load_all().unwrap();

    assert_eq!(
        h.manager.enable("a").unwrap_err(),
        LifecycleError::DependencyNotEnabled {
            id: "a".to_string(),
            dependency: "b".to_string(),
        }
    );

    h.manager.enable("b").unwrap();
    h.manager.enable("a").unwrap();
    // Enabling again is a no-op
    h.manager.enable("a").unwrap();
    assert_eq!(h.entries(), vec!["enable:b", "enable:a"]);

    assert_eq!(
        h.manager.disable("b").unwrap_err(),
        LifecycleError::DependentsEnabled {
            id: "b".to_string(),
            dependents: vec!["a".to_string()],
        }
    );
    h.manager.disable("a").unwrap();
    h.manager.disable("b").unwrap();
    h.manager.disable("b").unwrap();

    assert!(matches!(h.manager.enable("ghost"), Err(LifecycleError::NotFound(_))));
}

#[test]
fn test_config_disabled_module_stays_loaded() {
    let mut config = Config::default();
    config.plugins.disabled = vec!["b".to_string()];

    let mut h = host_with(
        config,
        &[
            ("a", manifest("a", 1, &["b"])),
            ("b", manifest("b", 1, &[])),
            ("c", manifest("c", 1, &[])),
        ],
        &[],
    );
    h.manager.load_all().unwrap();

    let report = h.manager.enable_all();
    assert_eq!(report.succeeded, vec!["c"]);
    assert_eq!(report.skipped_ids(), vec!["b", "a"]);
    assert_eq!(report.skipped[0].reason, SkipReason::DisabledByConfig);
    assert_eq!(h.state("b"), LifecycleState::Loaded);

    // Explicit enabling still works
    h.manager.enable("b").unwrap();
    h.manager.enable("a").unwrap();
    assert_eq!(h.state("a"), LifecycleState::Enabled);
}

#[test]
fn test_unload_all_tears_down_in_reverse() {
    let mut h = host(
        &[("a", manifest("a", 1, &["b"])), ("b", manifest("b", 1, &[]))],
        &[],
    );
    h.manager.load_all().unwrap();
    h.manager.enable_all();

    let report = h.manager.shutdown();
    assert!(report.failed.is_empty());
    assert_eq!(report.succeeded, vec!["a", "b"]);
    assert_eq!(h.entries(), vec!["enable:b", "enable:a", "disable:a", "disable:b"]);
    assert_eq!(h.state("a"), LifecycleState::Unloaded);
    assert_eq!(h.state("b"), LifecycleState::Unloaded);
    assert_eq!(h.manager.host().events().subscriber_count("tick"), 0);

    assert!(matches!(h.manager.enable("a"), Err(LifecycleError::InvalidTransition { .. })));
}

#[test]
fn test_scan_errors_are_not_fatal() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("good.yml"), manifest("good", 1, &[])).unwrap();
    fs::write(dir.path().join("broken.yml"), "id: [oops\n").unwrap();
    fs::write(dir.path().join("twice.yml"), "id: a\nversion: 1\n---\nid: b\nversion: 1\n").unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();

    let mut manager = PluginManager::new(HostContext::in_memory())
        .with_loader(BuiltinLoader::new().with("good", || {
            Box::new(Recorder {
                id: "good".to_string(),
                journal: Arc::default(),
                behavior: Behavior::Ok,
                attempts: 0,
            })
        }));
    let report = manager.scan(dir.path());

    assert_eq!(report.discovered, vec!["good"]);
    assert_eq!(report.errors.len(), 2);
    assert!(matches!(report.errors[0], ExtractionError::Unreadable { .. }));
    assert!(matches!(report.errors[1], ExtractionError::Malformed { .. }));

    assert_eq!(manager.load_all().unwrap().succeeded, vec!["good"]);
    assert!(manager.enable_all().is_clean());
}

#[test]
fn test_rescan_keeps_loaded_modules() {
    let mut h = host(&[("a", manifest("a", 1, &[]))], &[]);
    h.manager.load_all().unwrap();
    h.manager.enable_all();
    let context = h.manager.get("a").unwrap().context_id();

    fs::write(h._dir.path().join("b.yml"), manifest("b", 1, &["a"])).unwrap();
    let report = h.manager.scan(h._dir.path());

    assert_eq!(report.discovered, vec!["b"]);
    assert!(report.is_clean());
    assert_eq!(h.state("a"), LifecycleState::Enabled);
    assert_eq!(h.manager.get("a").unwrap().context_id(), context);

    let loaded = h.manager.load_all().unwrap();
    assert_eq!(loaded.succeeded, vec!["b"]);
    assert_eq!(loaded.unchanged, vec!["a"]);
}
