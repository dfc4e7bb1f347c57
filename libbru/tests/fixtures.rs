//! Test harness for Bru files against fixture files.
//!
//! Reads every .bru file from test/bru/, parses it as the kind named by the
//! file name prefix (`request-`, `folder-`, `collection-`, `environment-`)
//! and compares the document against test/json/. Files in test/nay/ are
//! expected to fail with the message in the matching .error file.

use std::fs;
use std::path::{Path, PathBuf};

use libbru::{parse, parse_with_filename, stringify, DocumentKind};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// All files matching `pattern` under test/, sorted.
fn fixtures(pattern: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(pattern);
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    files
}

fn stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().to_string()
}

/// Document kind from the file name prefix.
fn kind_of(path: &Path) -> Result<DocumentKind, String> {
    let stem = stem(path);
    let prefix = stem.split('-').next().unwrap_or_default();
    prefix.parse()
}

fn run_bru_test(path: &Path) -> Result<(), String> {
    let filename = path.file_name().unwrap().to_string_lossy().to_string();
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let kind = kind_of(path)?;

    let doc = parse(&content, kind)
        .map_err(|e| format!("{}: Unexpected parse error: {}", filename, e))?;

    let json_path = test_root().join("json").join(format!("{}.json", stem(path)));
    match fs::read_to_string(&json_path) {
        Ok(expected) => {
            let expected: serde_json::Value = serde_json::from_str(&expected)
                .map_err(|e| format!("{}: Bad expected JSON: {}", filename, e))?;
            let actual = serde_json::to_value(&doc).map_err(|e| e.to_string())?;
            if actual != expected {
                return Err(format!(
                    "{}: Output mismatch\n    expected: {}\n    actual:   {}",
                    filename, expected, actual
                ));
            }
            println!("  {} => ok", filename);
        }
        Err(_) => println!("  {} => {:?} (no expected output)", filename, doc),
    }

    // Writing and reading back must give the same document.
    let text = stringify(&doc);
    let again = parse(&text, kind)
        .map_err(|e| format!("{}: Written text does not parse: {}\n{}", filename, e, text))?;
    if again != doc {
        return Err(format!("{}: Round trip changed the document\n{}", filename, text));
    }
    Ok(())
}

fn run_nay_test(path: &Path) -> Result<(), String> {
    let filename = path.file_name().unwrap().to_string_lossy().to_string();
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let kind = kind_of(path)?;

    match parse_with_filename(&content, kind, Some(&filename)) {
        Ok(doc) => Err(format!(
            "{}: Expected parse error, but got success: {:?}",
            filename, doc
        )),
        Err(e) => {
            let actual = e.to_string();
            let error_path = path.with_extension("error");
            match fs::read_to_string(error_path) {
                Ok(expected) if expected.trim() == actual => {
                    println!("  {} => error (as expected)", filename);
                    Ok(())
                }
                Ok(expected) => Err(format!(
                    "{}: Error mismatch\n    expected: {}\n    actual:   {}",
                    filename,
                    expected.trim(),
                    actual
                )),
                Err(_) => {
                    println!("  {} => error: {} (no .error file to compare)", filename, actual);
                    Ok(())
                }
            }
        }
    }
}

fn run_all(files: &[PathBuf], run: fn(&Path) -> Result<(), String>) -> Vec<String> {
    files.iter().filter_map(|f| run(f).err()).collect()
}

#[test]
fn test_all_bru_fixtures() {
    let files = fixtures("bru/*.bru");
    assert!(!files.is_empty(), "no .bru fixtures found");

    println!("\nRunning {} .bru test files:", files.len());
    let errors = run_all(&files, run_bru_test);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }
    assert!(errors.is_empty(), "{} .bru tests failed", errors.len());
}

#[test]
fn test_all_nay_fixtures() {
    let files = fixtures("nay/*.bru");
    assert!(!files.is_empty(), "no nay fixtures found");

    println!("\nRunning {} nay test files:", files.len());
    let errors = run_all(&files, run_nay_test);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }
    assert!(errors.is_empty(), "{} nay tests failed", errors.len());
}

/// Fixtures without an embedded dictionary are already canonical.
#[test]
fn test_canonical_fixtures_are_stable() {
    for path in fixtures("bru/*.bru") {
        let content = fs::read_to_string(&path).unwrap();
        if content.contains("encoding=toml") || content.contains('\r') {
            continue;
        }
        let doc = parse(&content, kind_of(&path).unwrap()).unwrap();
        assert_eq!(stringify(&doc), content, "{} is not canonical", path.display());
    }
}
