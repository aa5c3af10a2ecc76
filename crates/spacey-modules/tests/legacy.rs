//! Legacy `require` semantics and legacy/modern interop

use parking_lot::Mutex;
use spacey_modules::{
    MemoryHost, ModuleEngine, ModuleError, ModuleId, ModuleSource, ModuleStatus, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Slot<T> = Arc<Mutex<Option<T>>>;

fn slot<T>() -> Slot<T> {
    Arc::new(Mutex::new(None))
}

#[test]
fn test_require_cycle_sees_partial_exports() {
    let partial: Slot<Value> = slot();
    let keys_at_require: Slot<Vec<String>> = slot();
    let p = Arc::clone(&partial);
    let k = Arc::clone(&keys_at_require);

    let host = MemoryHost::new()
        .with_module(
            "/a.cjs",
            ModuleSource::new().with_body_fn(|scope| {
                scope.export("early", 1)?;
                scope.require("./b.cjs")?;
                scope.export("late", 2)
            }),
        )
        .with_module(
            "/b.cjs",
            ModuleSource::new().with_body_fn(move |scope| {
                let a = scope.require("./a.cjs")?;
                *k.lock() = a.as_object().map(|o| o.keys());
                *p.lock() = Some(a);
                scope.export("done", true)
            }),
        );

    let engine = ModuleEngine::new(host);
    let a = engine.require_legacy("/a.cjs", None).unwrap();

    assert_eq!(keys_at_require.lock().clone(), Some(vec!["early".to_string()]));

    // the partial view is the same object, completed later
    let partial = partial.lock().clone().unwrap();
    assert_eq!(partial, a);
    assert_eq!(
        partial.as_object().and_then(|o| o.get("late")),
        Some(Value::from(2))
    );
    assert_eq!(
        engine.status(&ModuleId::new("/b.cjs")),
        Some(ModuleStatus::Evaluated)
    );
}

#[test]
fn test_require_runs_body_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    let host = MemoryHost::new().with_module(
        "/lib.cjs",
        ModuleSource::new().with_body_fn(move |scope| {
            counter.fetch_add(1, Ordering::SeqCst);
            scope.export("value", "lib")
        }),
    );

    let engine = ModuleEngine::new(host);
    let first = engine.require_legacy("/lib.cjs", None).unwrap();
    let second = engine.require_legacy("./lib.cjs", None).unwrap();

    assert_eq!(first, second);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_replaced_exports() {
    let host = MemoryHost::new().with_module(
        "/greeting.cjs",
        ModuleSource::new().with_body_fn(|scope| scope.set_exports("hi")),
    );

    let engine = ModuleEngine::new(host);
    assert_eq!(
        engine.require_legacy("/greeting.cjs", None).unwrap(),
        Value::from("hi")
    );

    let ns = engine.resolve_and_evaluate("/greeting.cjs").unwrap();
    assert_eq!(ns.get("default").unwrap(), Value::from("hi"));
}

#[test]
fn test_export_on_non_object_fails() {
    let host = MemoryHost::new().with_module(
        "/bad.cjs",
        ModuleSource::new().with_body_fn(|scope| {
            scope.set_exports(5)?;
            scope.export("x", 1)
        }),
    );

    let engine = ModuleEngine::new(host);
    let err = engine.require_legacy("/bad.cjs", None).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ModuleError::InvalidExports { name, .. } if name == "x"
    ));
}

#[test]
fn test_legacy_failure_is_cached() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    let host = MemoryHost::new().with_module(
        "/bad.cjs",
        ModuleSource::new().with_body_fn(move |_scope| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ModuleError::thrown("legacy boom"))
        }),
    );

    let engine = ModuleEngine::new(host);
    let first = engine.require_legacy("/bad.cjs", None).unwrap_err();
    let second = engine.require_legacy("/bad.cjs", None).unwrap_err();

    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.root_cause().to_string(), "legacy boom");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

fn interop_host() -> MemoryHost {
    MemoryHost::new()
        .with_module(
            "/lib.cjs",
            ModuleSource::new()
                .export_local("x")
                .with_body_fn(|scope| {
                    scope.export("x", 1)?;
                    scope.export("y", 2)
                }),
        )
        .with_module(
            "/main.mjs",
            ModuleSource::modern()
                .import_default("./lib.cjs", "lib")
                .import_named("./lib.cjs", "x", "x")
                .export_local("x")
                .export_local("copy")
                .with_body_fn(|scope| {
                    let lib = scope.get("lib")?;
                    scope.set("copy", lib)
                }),
        )
        .with_module(
            "/unhinted.mjs",
            ModuleSource::modern().import_named("./lib.cjs", "y", "y"),
        )
}

#[test]
fn test_modern_imports_legacy() {
    let engine = ModuleEngine::new(interop_host());
    let main = engine.resolve_and_evaluate("/main.mjs").unwrap();

    assert_eq!(main.get("x").unwrap(), Value::from(1));
    let copy = main.get("copy").unwrap();
    assert_eq!(
        copy.as_object().and_then(|o| o.get("y")),
        Some(Value::from(2))
    );

    let lib = engine.resolve_and_evaluate("/lib.cjs").unwrap();
    assert_eq!(lib.keys().unwrap(), vec!["default".to_string(), "x".to_string()]);
    assert_eq!(lib.get("default").unwrap(), copy);
}

#[test]
fn test_unhinted_named_import_is_missing() {
    let engine = ModuleEngine::new(interop_host());
    let err = engine.resolve_and_evaluate("/unhinted.mjs").unwrap_err();
    assert!(matches!(err, ModuleError::MissingExport { ref name, .. } if name == "y"));
}

#[test]
fn test_require_of_modern_returns_namespace() {
    let host = MemoryHost::new()
        .with_module(
            "/esm.mjs",
            ModuleSource::modern()
                .export_local("v")
                .with_body_fn(|scope| scope.set("v", "modern")),
        )
        .with_module(
            "/main.cjs",
            ModuleSource::new().with_body_fn(|scope| {
                let esm = scope.require("./esm.mjs")?;
                scope.set_exports(esm)
            }),
        );

    let engine = ModuleEngine::new(host);
    let value = engine.require_legacy("/main.cjs", None).unwrap();
    let ns = value.as_namespace().unwrap();

    assert_eq!(ns.id().as_str(), "/esm.mjs");
    assert_eq!(ns.requester().map(ModuleId::as_str), Some("/main.cjs"));
    assert_eq!(ns.get("v").unwrap(), Value::from("modern"));
}

#[test]
fn test_modern_reads_legacy_that_is_still_running() {
    let seen: Slot<Value> = slot();
    let s = Arc::clone(&seen);

    let host = MemoryHost::new()
        .with_module(
            "/a.cjs",
            ModuleSource::new().with_body_fn(|scope| {
                scope.export("before", true)?;
                scope.require("./b.mjs")?;
                scope.export("after", true)
            }),
        )
        .with_module(
            "/b.mjs",
            ModuleSource::modern()
                .import_default("./a.cjs", "a")
                .with_body_fn(move |scope| {
                    *s.lock() = Some(scope.get("a")?);
                    Ok(())
                }),
        );

    let engine = ModuleEngine::new(host);
    let a = engine.require_legacy("/a.cjs", None).unwrap();

    let seen = seen.lock().clone().unwrap();
    assert_eq!(seen, a);
    assert_eq!(
        engine.status(&ModuleId::new("/b.mjs")),
        Some(ModuleStatus::Evaluated)
    );
}

#[test]
fn test_json_modules() {
    let host = MemoryHost::new()
        .with_module(
            "/data.json",
            ModuleSource::json(serde_json::json!({ "name": "spacey", "tags": ["a"] })),
        )
        .with_module(
            "/main.mjs",
            ModuleSource::modern()
                .import_default("./data.json", "data")
                .export_local("data"),
        );

    let engine = ModuleEngine::new(host);
    let data = engine.require_legacy("/data.json", None).unwrap();
    assert_eq!(
        data.as_object().and_then(|o| o.get("name")),
        Some(Value::from("spacey"))
    );

    let main = engine.resolve_and_evaluate("/main.mjs").unwrap();
    assert_eq!(main.get("data").unwrap(), data);
}
