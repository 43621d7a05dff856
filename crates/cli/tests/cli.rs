use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn ragchunk(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ragchunk").expect("binary");
    cmd.current_dir(workdir).arg("--quiet");
    cmd
}

fn parse_lines(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

fn setup_inputs() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::create_dir_all(root.join("notebooks")).unwrap();

    fs::write(
        root.join("src/shapes.py"),
        r#"
import math

class Square:
    """A square."""
    def __init__(self, side):
        self.side = side

    def area(self):
        return self.side ** 2
"#,
    )
    .unwrap();
    fs::write(
        root.join("docs/intro.json"),
        r##"{"content": "# Install\npip install it\n# Use\nimport it", "title": "Intro"}"##,
    )
    .unwrap();
    fs::write(
        root.join("notebooks/tour.json"),
        r#"{"metadata": {"filename": "tour.ipynb"}, "content": [
            {"type": "text", "content": "Welcome"},
            {"type": "code", "content": "print(2)", "output": "2"}
        ]}"#,
    )
    .unwrap();
    temp
}

#[test]
fn chunk_prints_jsonl_for_one_file() {
    let temp = setup_inputs();
    let output = ragchunk(temp.path())
        .args(["chunk", "src/shapes.py"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let chunks = parse_lines(&output.stdout);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["metadata"]["class_name"], "Square");
    assert_eq!(chunks[0]["metadata"]["source"], "shapes.py");
    assert_eq!(chunks[1]["metadata"]["function_name"], "area");
    assert!(chunks[0]["id"].as_str().is_some());
}

#[test]
fn chunk_with_explicit_kind() {
    let temp = setup_inputs();
    let output = ragchunk(temp.path())
        .args(["chunk", "notebooks/tour.json", "--kind", "notebook"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let chunks = parse_lines(&output.stdout);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["metadata"]["cell_range"], "0-1");
    assert_eq!(chunks[0]["metadata"]["source"], "tour.ipynb");
    assert!(chunks[0]["content"]
        .as_str()
        .unwrap()
        .contains("Output:\n```text\n2\n```"));
}

#[test]
fn chunk_rejects_unknown_kind() {
    let temp = setup_inputs();
    fs::write(temp.path().join("image.png"), "not text").unwrap();

    ragchunk(temp.path())
        .args(["chunk", "image.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--kind"));
}

#[test]
fn run_writes_all_kinds_in_order() {
    let temp = setup_inputs();
    let root = temp.path();
    fs::write(
        root.join("ragchunk.toml"),
        r#"
[chunker]
target_limit = 1000

[inputs]
python = ["src"]
web = ["docs"]
notebook = ["notebooks"]
output = "out/chunks.jsonl"
"#,
    )
    .unwrap();

    ragchunk(root)
        .args(["--config", "ragchunk.toml", "run"])
        .assert()
        .success();

    let written = fs::read(root.join("out/chunks.jsonl")).unwrap();
    let chunks = parse_lines(&written);
    let sources: Vec<&str> = chunks
        .iter()
        .map(|c| c["metadata"]["source"].as_str().unwrap())
        .collect();
    assert_eq!(
        sources,
        vec!["shapes.py", "shapes.py", "intro.json", "intro.json", "tour.ipynb"]
    );
    assert_eq!(chunks[2]["metadata"]["context_path"], "Install");
    assert_eq!(chunks[3]["metadata"]["topic"], "Intro");
}

#[test]
fn run_flags_override_config() {
    let temp = setup_inputs();
    let root = temp.path();
    fs::write(
        root.join("docs/long.json"),
        serde_json::json!({"content": format!("# Long\n{}", "token ".repeat(400))}).to_string(),
    )
    .unwrap();

    ragchunk(root)
        .args([
            "run",
            "--web",
            "docs",
            "--output",
            "web.jsonl",
            "--target-limit",
            "100",
        ])
        .assert()
        .success();

    let chunks = parse_lines(&fs::read(root.join("web.jsonl")).unwrap());
    assert!(chunks.len() > 4);
    for chunk in &chunks {
        assert!(chunk["metadata"]["token_count"].as_u64().unwrap() <= 90);
    }
}

#[test]
fn run_without_inputs_fails() {
    let temp = tempdir().unwrap();
    ragchunk(temp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No input directories"));
}

#[test]
fn invalid_safety_margin_fails() {
    let temp = setup_inputs();
    ragchunk(temp.path())
        .args(["--safety-margin", "1.5", "chunk", "src/shapes.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid chunker settings"));
}
