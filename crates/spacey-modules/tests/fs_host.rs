//! Loading module descriptors from disk

use spacey_modules::{EngineConfig, FsHost, ModuleEngine, ModuleFormat, ModuleHost, ModuleId, Value};
use std::fs;
use std::path::Path;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "app/main.mjs",
        r#"{
            "imports": [
                { "specifier": "./lib/util.js", "imports": [{ "kind": "named", "imported": "version" }] },
                { "specifier": "greet", "imports": [{ "kind": "default", "local": "greet" }] },
                { "specifier": "./data.json", "imports": [{ "kind": "default", "local": "data" }] }
            ],
            "exports": [
                { "exports": [{ "kind": "named", "local": "version" }] },
                { "exports": [{ "kind": "named", "local": "greeting" }] },
                { "exports": [{ "kind": "named", "local": "name" }] }
            ],
            "body": [
                { "op": "get", "object": "greet", "property": "text", "to": "greeting" },
                { "op": "get", "object": "data", "property": "name", "to": "name" }
            ]
        }"#,
    );
    write(root, "app/lib/package.json", r#"{ "type": "module" }"#);
    write(
        root,
        "app/lib/util.js",
        r#"{
            "exports": [{ "exports": [{ "kind": "named", "local": "version" }] }],
            "body": [
                { "op": "set", "name": "version", "value": 1 },
                { "op": "add", "name": "version", "by": 1 }
            ]
        }"#,
    );
    write(
        root,
        "app/node_modules/greet/package.json",
        r#"{ "name": "greet", "main": "lib/greet.cjs" }"#,
    );
    write(
        root,
        "app/node_modules/greet/lib/greet.cjs",
        r#"{ "body": [{ "op": "export", "name": "text", "value": "hello" }] }"#,
    );
    write(root, "app/data.json", r#"{ "name": "spacey" }"#);

    dir
}

fn engine(root: &Path) -> ModuleEngine {
    let config = EngineConfig {
        base_dir: root.to_string_lossy().into_owned(),
        ..EngineConfig::default()
    };
    ModuleEngine::with_config(FsHost::new(root), config)
}

#[test]
fn test_evaluates_project_from_disk() {
    let dir = project();
    let engine = engine(dir.path());

    let main = engine.resolve_and_evaluate("./app/main.mjs").unwrap();

    assert_eq!(main.get("version").unwrap(), Value::from(2));
    assert_eq!(main.get("greeting").unwrap(), Value::from("hello"));
    assert_eq!(main.get("name").unwrap(), Value::from("spacey"));
}

#[test]
fn test_package_type_and_bare_resolution() {
    let dir = project();
    let engine = engine(dir.path());
    let main = ModuleId::new(dir.path().join("app/main.mjs").to_string_lossy());

    let util = engine.resolve("./lib/util", Some(&main)).unwrap();
    assert_eq!(util.format, ModuleFormat::Modern);

    let greet = engine.resolve("greet", Some(&main)).unwrap();
    assert!(greet.id.as_str().ends_with("node_modules/greet/lib/greet.cjs"));
    assert_eq!(greet.format, ModuleFormat::Legacy);

    assert!(engine.resolve("missing-package", Some(&main)).is_err());
}

#[test]
fn test_invalid_descriptor_is_a_load_error() {
    let dir = project();
    write(dir.path(), "app/broken.mjs", "not json");
    let engine = engine(dir.path());

    let err = engine.resolve_and_evaluate("./app/broken.mjs").unwrap_err();
    assert!(matches!(err, spacey_modules::ModuleError::Load { .. }));
}

#[tokio::test]
async fn test_dynamic_import_fetches_asynchronously() {
    let dir = project();
    let engine = engine(dir.path());

    let host = FsHost::new(dir.path());
    let data_id = ModuleId::new(dir.path().join("app/data.json").to_string_lossy());
    let data = host.fetch_source(&data_id).await.unwrap();
    assert_eq!(data.format, Some(ModuleFormat::Legacy));

    let main = engine.import_dynamic("./app/main.mjs", None).await.unwrap();
    assert_eq!(main.get("version").unwrap(), Value::from(2));
}
