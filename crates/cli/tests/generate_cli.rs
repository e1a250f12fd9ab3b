use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_json(path: &Path, value: Value) {
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn setup_inputs(root: &Path) {
    let input = root.join("inputfiles");
    fs::create_dir_all(input.join("idl")).unwrap();

    write_json(
        &input.join("browser.webidl.preprocessed.json"),
        json!({
            "interfaces": { "interface": {
                "Node": {
                    "exposed": "Window",
                    "methods": { "method": { "contains": { "signature": [{ "type": "boolean" }] } } }
                },
                "Legacy": { "exposed": "Window" }
            } }
        }),
    );
    write_json(
        &input.join("idlSources.json"),
        json!([
            { "url": "https://dom.spec.whatwg.org/", "title": "dom" },
            { "url": "https://example.org/old", "title": "old", "deprecated": true }
        ]),
    );
    write_json(
        &input.join("idl/dom.widl.json"),
        json!({
            "browser": { "interfaces": { "interface": {
                "AbortSignal": {
                    "exposed": "Window Worker",
                    "properties": { "property": { "aborted": { "type": "boolean", "read-only": 1 } } }
                }
            } } },
            "partialInterfaces": [{
                "name": "Node",
                "methods": { "method": { "isConnected": { "signature": [{ "type": "boolean" }] } } }
            }]
        }),
    );
    write_json(
        &input.join("idl/dom.commentmap.json"),
        json!({ "AbortSignal.aborted": "Whether the signal was aborted" }),
    );
    write_json(
        &input.join("idl/old.widl.json"),
        json!({ "browser": { "interfaces": { "interface": { "OldThing": { "exposed": "Window" } } } } }),
    );
    write_json(
        &input.join("removedTypes.json"),
        json!({ "interfaces": { "interface": ["Legacy"] } }),
    );
    write_json(
        &input.join("addedTypes.json"),
        json!({ "interfaces": { "interface": { "AddedThing": { "exposed": "Worker" } } } }),
    );
    write_json(
        &input.join("overridingTypes.json"),
        json!({ "interfaces": { "interface": { "AbortSignal": { "override-exposed": "Worker" } } } }),
    );
    write_json(
        &input.join("comments.json"),
        json!({ "interfaces": { "interface": { "Node": { "comment": "A DOM node" } } } }),
    );
    write_json(&input.join("knownTypes.json"), json!({ "Window": [], "Worker": [] }));
}

#[allow(deprecated)]
fn domgen(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("domgen").expect("binary");
    cmd.current_dir(root);
    cmd
}

#[test]
fn generate_writes_three_declaration_files() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_inputs(root);

    domgen(root).arg("generate").assert().success();

    let generated = root.join("generated");
    let dom = fs::read_to_string(generated.join("dom.generated.d.ts")).unwrap();
    let worker = fs::read_to_string(generated.join("webworker.generated.d.ts")).unwrap();
    let iterable = fs::read_to_string(generated.join("dom.iterable.generated.d.ts")).unwrap();

    assert!(dom.contains("/** A DOM node */\ninterface Node {"));
    assert!(dom.contains("isConnected(): boolean;"));
    assert!(dom.contains("/** @deprecated */\ninterface OldThing {"));
    assert!(!dom.contains("Legacy"));
    assert!(!dom.contains("interface AbortSignal"));

    assert!(worker.contains("interface AbortSignal {"));
    assert!(worker.contains("/** Whether the signal was aborted */"));
    assert!(worker.contains("interface AddedThing {"));
    assert!(!worker.contains("interface Node"));

    assert!(iterable.starts_with("/////////////////////////////\n/// Window Iterable APIs"));
}

#[test]
fn merge_prints_integrated_graph() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_inputs(root);

    let output = domgen(root).args(["--quiet", "merge"]).output().unwrap();
    assert!(output.status.success());

    let graph: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let interfaces = &graph["interfaces"]["interface"];
    assert_eq!(interfaces["AbortSignal"]["exposed"], json!("Worker"));
    assert_eq!(interfaces["OldThing"]["deprecated"], json!(true));
    assert!(interfaces.get("Legacy").is_none());
    assert!(!root.join("generated").exists());
}

#[test]
fn conflicting_addition_fails_without_output() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_inputs(root);
    write_json(
        &root.join("inputfiles/addedTypes.json"),
        json!({ "interfaces": { "interface": { "Node": { "methods": { "method": { "contains": {} } } } } } }),
    );

    domgen(root)
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflicting definitions at interfaces.interface.Node.methods.method.contains"));
    assert!(!root.join("generated").exists());
}

#[test]
fn strict_flag_reports_unresolved_partials() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_inputs(root);
    write_json(
        &root.join("inputfiles/idl/old.widl.json"),
        json!({ "partialInterfaces": [{ "name": "Missing" }] }),
    );

    domgen(root).arg("generate").assert().success();
    domgen(root)
        .args(["generate", "--strict", "--output-dir", "strict-out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unresolved partial interface target: Missing"));
    assert!(!root.join("strict-out").exists());
}

#[test]
fn config_file_and_flags_relocate_files() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_inputs(root);
    fs::rename(root.join("inputfiles"), root.join("data")).unwrap();
    fs::write(
        root.join("domgen.toml"),
        "input_dir = \"data\"\n\n[outputs]\nweb = \"dom.d.ts\"\n",
    )
    .unwrap();

    domgen(root)
        .args(["generate", "--config", "domgen.toml", "--output-dir", "lib"])
        .assert()
        .success();

    assert!(root.join("lib/dom.d.ts").exists());
    assert!(root.join("lib/webworker.generated.d.ts").exists());
}

#[test]
fn missing_input_names_the_file() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    setup_inputs(root);
    fs::remove_file(root.join("inputfiles/knownTypes.json")).unwrap();

    domgen(root)
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("knownTypes.json"));
}
