//! File selection and archive construction tests

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;

use buildship::errors::CliError;
use buildship::files::archive::{create_archive, ArchiveOptions};
use buildship::files::dependencies::{generate_dependency_files, DependencyFiles, PIP_FILE};
use buildship::files::include::determine_included_files;
use buildship::project::ProjectConfig;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src/models")).unwrap();
    fs::create_dir_all(root.join("tests")).unwrap();
    fs::create_dir_all(root.join("testing")).unwrap();
    fs::write(root.join("main.py"), "print('hi')").unwrap();
    fs::write(root.join("README.md"), "# app").unwrap();
    fs::write(root.join(".env"), "SECRET=1").unwrap();
    fs::write(root.join("src/app.py"), "app = 1").unwrap();
    fs::write(root.join("src/models/a.bin"), vec![0u8; 64]).unwrap();
    fs::write(root.join("tests/test_app.py"), "").unwrap();
    fs::write(root.join("testing/notes.txt"), "").unwrap();
    dir
}

fn set(files: Vec<String>) -> BTreeSet<String> {
    files.into_iter().collect()
}

fn names(archive: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn test_everything_pattern_with_excludes() {
    let dir = project();
    let files = determine_included_files(dir.path(), &["./*"], &[".*", "tests/"]).unwrap();
    let expected: BTreeSet<String> = [
        "README.md",
        "main.py",
        "src/app.py",
        "src/models/a.bin",
        "testing/notes.txt",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(set(files), expected);
}

#[test]
fn test_glob_includes() {
    let dir = project();
    let files = determine_included_files(dir.path(), &["**/*.py"], &["tests/**"]).unwrap();
    let expected: BTreeSet<String> = ["main.py", "src/app.py"].into_iter().map(String::from).collect();
    assert_eq!(set(files), expected);

    let files = determine_included_files(dir.path(), &["src/"], &Vec::<String>::new()).unwrap();
    assert_eq!(set(files).len(), 2);
}

#[test]
fn test_invalid_include_pattern_is_reported() {
    let dir = project();
    let err = determine_included_files(dir.path(), &["src/[a-"], &Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, CliError::Validation(_)));
}

#[test]
fn test_archive_puts_dependency_files_first() {
    let dir = project();
    let mut config = ProjectConfig::default();
    config.deployment.name = "app".into();
    config.deployment.shell_commands = vec!["echo build".into()];
    config.dependencies.pip.insert("requests".into(), ">=2.28.0".into());
    config.apply_defaults();

    let dep_files = generate_dependency_files(&config, dir.path()).unwrap();
    let files = vec!["main.py".to_string(), "src/app.py".to_string()];
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("app.zip");

    let summary = create_archive(dir.path(), &files, &dep_files, &dest, &ArchiveOptions::default()).unwrap();
    assert_eq!(summary.entries, dep_files.len() + files.len());
    assert_eq!(summary.size, fs::metadata(&dest).unwrap().len());

    let entries = names(&dest);
    let dep_count = dep_files.len();
    assert!(entries[..dep_count].iter().all(|n| dep_files.contains_key(n)));
    assert_eq!(&entries[dep_count..], ["main.py", "src/app.py"]);

    let mut zip = zip::ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    let mut requirements = String::new();
    zip.by_name(PIP_FILE).unwrap().read_to_string(&mut requirements).unwrap();
    assert_eq!(requirements.trim(), "requests>=2.28.0");
}

#[test]
fn test_zip_bomb_ceiling_aborts_and_cleans_up() {
    let dir = project();
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("app.zip");
    let files = vec!["main.py".to_string(), "src/models/a.bin".to_string()];
    let options = ArchiveOptions {
        max_uncompressed_bytes: 32,
    };

    let err = create_archive(dir.path(), &files, &DependencyFiles::new(), &dest, &options).unwrap_err();
    match err {
        CliError::FileSystem(msg) => assert!(msg.contains("zip bomb protection")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
}

#[cfg(unix)]
#[test]
fn test_file_growing_past_ceiling_stops_the_copy() {
    // reports a size of zero but never runs out of bytes
    let dir = project();
    std::os::unix::fs::symlink("/dev/zero", dir.path().join("endless.bin")).unwrap();
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("app.zip");
    let files = vec!["endless.bin".to_string()];
    let options = ArchiveOptions {
        max_uncompressed_bytes: 64 * 1024,
    };

    let err = create_archive(dir.path(), &files, &DependencyFiles::new(), &dest, &options).unwrap_err();
    match err {
        CliError::FileSystem(msg) => assert!(msg.contains("zip bomb protection")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
}

#[test]
fn test_missing_file_fails_archive() {
    let dir = project();
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("app.zip");
    let files = vec!["gone.py".to_string()];
    let err = create_archive(dir.path(), &files, &DependencyFiles::new(), &dest, &ArchiveOptions::default())
        .unwrap_err();
    assert!(matches!(err, CliError::FileSystem(_)));
    assert!(!dest.exists());
}
