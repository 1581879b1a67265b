use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const GROUP: &str = r#"{
  "companies": [
    {"id": "H", "name": "Holding", "type": "holding", "parentIds": []},
    {"id": "A", "name": "Alpha", "parentIds": ["H"]},
    {"id": "B", "name": "Beta", "parentIds": ["H"]},
    {"id": "C", "name": "Gamma", "parentIds": ["A", "B"], "parentOwnership": {"A": 60, "B": 40}}
  ],
  "people": [
    {"id": "p1", "name": "Ada", "role": "CEO", "companyId": "C"}
  ]
}"#;

fn ownerchart(graph: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ownerchart").expect("binary should build");
    cmd.arg("--graph").arg(graph);
    cmd
}

fn seed(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("group.json");
    fs::write(&path, GROUP).expect("fixture should be writable");
    path
}

#[test]
fn render_writes_svg() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());
    let output = tmp.path().join("chart.svg");

    ownerchart(&graph)
        .arg("render")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("chart.svg"));

    let svg = fs::read_to_string(&output)?;
    assert!(svg.contains("<svg"), "output should contain an <svg> element");
    assert!(svg.contains("Gamma"));
    assert_eq!(svg.matches("stroke-dasharray").count(), 1);
    Ok(())
}

#[test]
fn render_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());

    ownerchart(&graph)
        .args(["render", "--output", "-"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<?xml"));
    Ok(())
}

#[test]
fn layout_prints_chart_json() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());

    let assert = ownerchart(&graph)
        .args(["layout", "--width", "1000", "--height", "600"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;

    assert_eq!(json["chart"]["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["chart"]["secondaryEdges"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["viewport"]["transform"]["scale"], 0.8);
    Ok(())
}

#[test]
fn self_link_fails_and_leaves_file_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());

    ownerchart(&graph)
        .args(["link", "C", "C"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("own parent"));

    assert_eq!(fs::read_to_string(&graph)?, GROUP);
    Ok(())
}

#[test]
fn malformed_import_fails_and_leaves_file_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());
    let payload = tmp.path().join("broken.json");
    fs::write(&payload, r#"{"companies": "not-an-array", "people": []}"#)?;

    for replace in [false, true] {
        let mut cmd = ownerchart(&graph);
        cmd.arg("--yes").arg("import").arg(&payload);
        if replace {
            cmd.arg("--replace");
        }
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("must be an array"));
    }

    assert_eq!(fs::read_to_string(&graph)?, GROUP);
    Ok(())
}

#[test]
fn edits_are_persisted() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());

    ownerchart(&graph)
        .args(["rename", "A", "Alpha Europe"])
        .assert()
        .success();
    ownerchart(&graph)
        .args(["link", "A", "B", "--ownership", "25%"])
        .assert()
        .success();
    ownerchart(&graph)
        .args(["member", "add", "A", "Bo", "--role", "CTO"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added person"));

    let saved = ownerchart::store::load(&graph)?;
    let alpha = saved.company("A").expect("A survives");
    assert_eq!(alpha.name, "Alpha Europe");
    assert_eq!(alpha.parent_ids, vec!["H".to_string(), "B".to_string()]);
    assert_eq!(alpha.parent_ownership.get("B"), Some(&25.0));
    assert_eq!(saved.members("A").count(), 1);
    Ok(())
}

#[test]
fn delete_with_yes_cascades() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = seed(tmp.path());

    ownerchart(&graph)
        .args(["--yes", "delete", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 2 companies and 1 people"));

    let saved = ownerchart::store::load(&graph)?;
    let ids: Vec<&str> = saved.companies.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["H", "B"]);
    assert!(saved.people.is_empty());
    Ok(())
}

#[test]
fn add_creates_graph_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let graph = tmp.path().join("fresh.json");

    ownerchart(&graph)
        .args(["add", "Acme", "--type", "holding"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added company"));

    let saved = ownerchart::store::load(&graph)?;
    assert_eq!(saved.companies.len(), 1);
    assert_eq!(saved.companies[0].type_tag, "holding");
    Ok(())
}
