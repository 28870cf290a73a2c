//! File manifest tests

use buildship::files::manifest::{FileEntry, FileManifest};
use buildship::files::matcher::IgnoreRuleSet;

fn entry(path: &str, hash: &str) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        hash: hash.to_string(),
        size: 0,
    }
}

#[test]
fn test_diff_partitions_changes() {
    let current = FileManifest::new(vec![
        entry("main.py", "abc"),
        entry("new.py", "def"),
        entry("modified.py", "ghi"),
    ]);
    let previous = FileManifest::new(vec![
        entry("main.py", "abc"),
        entry("modified.py", "old"),
        entry("deleted.py", "xyz"),
    ]);

    let diff = current.diff(&previous);
    assert_eq!(diff.added, vec!["new.py"]);
    assert_eq!(diff.modified, vec!["modified.py"]);
    assert_eq!(diff.deleted, vec!["deleted.py"]);
}

#[test]
fn test_diff_against_itself_is_empty() {
    let manifest = FileManifest::new(vec![entry("a.py", "1"), entry("b/c.py", "2")]);
    assert!(manifest.diff(&manifest.clone()).is_empty());
}

#[test]
fn test_build_hashes_tree_and_skips_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join(".git/objects")).unwrap();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    std::fs::write(root.join(".git/HEAD"), "ref: main").unwrap();
    std::fs::write(root.join("main.py"), "Hello, World!").unwrap();
    std::fs::write(root.join("src/app.py"), "x = 1").unwrap();
    std::fs::write(root.join("node_modules/pkg/index.js"), "{}").unwrap();

    let rules = IgnoreRuleSet::new(&["node_modules"]).unwrap();
    let manifest = FileManifest::build(root, &rules).unwrap();

    let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["main.py", "src/app.py"]);
    assert_eq!(manifest.files[0].hash, "65a8e27d8879283831b664bd8b7f0ad4");
    assert_eq!(manifest.files[0].size, 13);
}

#[test]
fn test_manifest_serializes() {
    let manifest = FileManifest::new(vec![entry("b.py", "2"), entry("a.py", "1")]);
    let json = serde_json::to_string(&manifest).unwrap();
    let back: FileManifest = serde_json::from_str(&json).unwrap();
    assert_eq!(back.files[0].path, "a.py");
    assert_eq!(back, manifest);
}
