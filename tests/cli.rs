//! End-to-end tests of the symdex binary against a small source tree.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

struct Fixture {
    source: TempDir,
    home: TempDir,
    index_file: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let source = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let index_file = home.path().join("fixture.index");

        fs::create_dir(source.path().join("geometry")).unwrap();
        fs::write(
            source.path().join("geometry/shapes.rs"),
            "pub struct Circle {}\n\npub fn area(shape: Circle) -> u32 {\n    compute(shape)\n}\n",
        )
        .unwrap();
        fs::write(
            source.path().join("render.rs"),
            "// draws shapes\nfn draw(item: Circle) {\n    area(item);\n}\n",
        )
        .unwrap();

        Self {
            source,
            home,
            index_file,
        }
    }

    /// Run symdex with the fixture's codebase and index file
    fn run(&self, args: &[&str]) -> (String, String, bool) {
        let output = Command::new(env!("CARGO_BIN_EXE_symdex"))
            .args(args)
            .arg("-p")
            .arg(self.source.path())
            .arg("--index")
            .arg(&self.index_file)
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path())
            .env("XDG_DATA_HOME", self.home.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run symdex");

        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.success(),
        )
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut args = args.to_vec();
        args.push("--json");
        let (stdout, stderr, ok) = self.run(&args);
        assert!(ok, "symdex {:?} failed: {}", args, stderr);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("bad JSON {:?}: {}", stdout, e))
    }

    fn indexed(self) -> Self {
        let (_, stderr, ok) = self.run(&["index", "--no-color"]);
        assert!(ok, "index failed: {}", stderr);
        self
    }

    fn source_path(&self, rel: &str) -> PathBuf {
        self.source.path().join(rel)
    }
}

fn documents(value: &Value) -> Vec<String> {
    value["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_index_reports_counts() {
    let fixture = Fixture::new();
    let summary = fixture.json(&["index"]);
    assert_eq!(summary["documents"], 2);
    assert_eq!(summary["indexed"], 2);
    assert_eq!(summary["removed"], 0);
    assert!(Path::new(&fixture.index_file).exists());
}

#[test]
fn test_query_merges_declarations_and_references() {
    let fixture = Fixture::new().indexed();

    let results = fixture.json(&["query", "Circle"]);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["word"], "Circle");
    assert_eq!(documents(&results[0]), vec!["geometry/shapes.rs", "render.rs"]);

    let declared = fixture.json(&["query", "Circle", "-c", "decl"]);
    assert_eq!(documents(&declared[0]), vec!["geometry/shapes.rs"]);

    let referenced = fixture.json(&["query", "area", "-c", "ref"]);
    assert_eq!(documents(&referenced[0]), vec!["render.rs"]);
}

#[test]
fn test_query_modes() {
    let fixture = Fixture::new().indexed();

    let (stdout, _, ok) = fixture.run(&["query", "ar", "-m", "prefix", "--no-color"]);
    assert!(ok);
    assert_eq!(stdout, "area (2)\n  geometry/shapes.rs\n  render.rs\n");

    let insensitive = fixture.json(&["query", "CIRCLE", "-i"]);
    assert_eq!(insensitive[0]["word"], "Circle");

    let wildcard = fixture.json(&["query", "dr?w", "-m", "pattern"]);
    assert_eq!(documents(&wildcard[0]), vec!["render.rs"]);

    let none = fixture.json(&["query", "Square"]);
    assert!(none.as_array().unwrap().is_empty());

    let (_, stderr, ok) = fixture.run(&["query", "(", "-m", "regex"]);
    assert!(!ok);
    assert!(stderr.contains("("));
}

#[test]
fn test_names_and_remove() {
    let fixture = Fixture::new().indexed();
    let names = fixture.json(&["names"]);
    assert_eq!(names, serde_json::json!(["geometry/shapes.rs", "render.rs"]));

    let prefixed = fixture.json(&["names", "geo"]);
    assert_eq!(prefixed, serde_json::json!(["geometry/shapes.rs"]));

    let (stdout, stderr, ok) = fixture.run(&["remove", "render.rs", "missing.rs"]);
    assert!(ok);
    assert!(stdout.contains("Removed 1 document(s)"));
    assert!(stderr.contains("Not indexed: missing.rs"));

    assert_eq!(fixture.json(&["names"]), serde_json::json!(["geometry/shapes.rs"]));
    let circle = fixture.json(&["query", "Circle"]);
    assert_eq!(documents(&circle[0]), vec!["geometry/shapes.rs"]);
}

#[test]
fn test_reindex_drops_deleted_files() {
    let fixture = Fixture::new().indexed();
    fs::remove_file(fixture.source_path("render.rs")).unwrap();
    fs::write(fixture.source_path("extra.rs"), "fn extra() { area(); }\n").unwrap();

    let summary = fixture.json(&["index"]);
    assert_eq!(summary["removed"], 1);
    assert_eq!(summary["documents"], 2);

    assert!(fixture.json(&["query", "draw"]).as_array().unwrap().is_empty());
    let area = fixture.json(&["query", "area"]);
    assert_eq!(documents(&area[0]), vec!["extra.rs", "geometry/shapes.rs"]);
}

#[test]
fn test_stats_and_dump() {
    let fixture = Fixture::new().indexed();

    let stats = fixture.json(&["stats"]);
    assert_eq!(stats["document_count"], 2);
    assert_eq!(stats["reference_width"], 1);
    let categories: Vec<&str> = stats["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(categories, vec!["decl", "ref"]);

    let dump = fixture.json(&["dump"]);
    let declared: Vec<&str> = dump["decl"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["word"].as_str().unwrap())
        .collect();
    assert_eq!(declared, vec!["Circle", "area", "draw"]);
    assert!(dump["ref"].as_array().unwrap().iter().any(|r| r["word"] == "compute"));

    let (stdout, _, ok) = fixture.run(&["stats"]);
    assert!(ok);
    assert!(stdout.contains("Document count:   2"));
}

#[test]
fn test_reset_empties_index() {
    let fixture = Fixture::new().indexed();
    let (_, _, ok) = fixture.run(&["reset"]);
    assert!(ok);
    assert_eq!(fixture.json(&["names"]), serde_json::json!([]));
    assert_eq!(fixture.json(&["stats"])["document_count"], 0);
}

#[test]
fn test_missing_index_is_an_error() {
    let fixture = Fixture::new();
    let (_, stderr, ok) = fixture.run(&["query", "Circle"]);
    assert!(!ok);
    assert!(stderr.contains("symdex index"));
}
