//! Project discovery and batch compilation.
//!
//! Recursively scans a directory for `.constela` program files and compiles
//! each one. A failure in one file never aborts the batch: every file gets
//! its own `CompileResult`, and unreadable files report a diagnostic like
//! any other failure. Files compile in parallel; order of results follows
//! discovery order regardless.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::compile::{compile_source, CompileOptions, CompileResult};
use crate::error::{self, ConstelaError};

const PROGRAM_EXTENSION: &str = "constela";

#[derive(Debug, Clone)]
pub struct FileCompileResult {
    pub path: PathBuf,
    pub result: CompileResult,
}

/// Recursively find all `.constela` files under a directory.
pub fn find_program_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).into_iter().flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == PROGRAM_EXTENSION) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

pub fn compile_project(base_dir: &Path, options: &CompileOptions) -> Vec<FileCompileResult> {
    compile_project_with_cache(base_dir, options, None)
}

pub fn compile_project_with_cache(
    base_dir: &Path,
    options: &CompileOptions,
    cache: Option<&IncrementalCache>,
) -> Vec<FileCompileResult> {
    if !base_dir.exists() {
        return Vec::new();
    }

    find_program_files(base_dir)
        .into_par_iter()
        .map(|path| {
            let result = compile_file(&path, options, cache);
            FileCompileResult { path, result }
        })
        .collect()
}

fn compile_file(
    path: &Path,
    options: &CompileOptions,
    cache: Option<&IncrementalCache>,
) -> CompileResult {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            return CompileResult {
                program: None,
                errors: vec![ConstelaError::new(
                    error::PARSE_ERROR,
                    format!("Failed to read {}: {}", path.display(), err),
                    "/",
                )],
            };
        }
    };

    let key = path.to_string_lossy();
    if let Some(cache) = cache {
        if let Some(program) = cache.get(&key, &source) {
            return CompileResult {
                program: Some(program),
                errors: Vec::new(),
            };
        }
    }

    let result = compile_source(&source, options.clone());
    if let (Some(cache), Some(program)) = (cache, &result.program) {
        cache.set(&key, &source, program);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_program(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn valid_program() -> serde_json::Value {
        json!({
            "version": "1.0",
            "state": {"count": {"type": "number", "initial": 0}},
            "view": {"kind": "text", "value": {"expr": "state", "name": "count"}}
        })
    }

    #[test]
    fn finds_nested_program_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages/admin")).unwrap();
        write_program(dir.path(), "index.constela", valid_program());
        write_program(&dir.path().join("pages/admin"), "users.constela", valid_program());
        fs::write(dir.path().join("notes.txt"), "not a program").unwrap();

        let files = find_program_files(dir.path());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn one_bad_file_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "good.constela", valid_program());
        fs::write(dir.path().join("bad.constela"), "{broken").unwrap();

        let results = compile_project(dir.path(), &CompileOptions::default());
        assert_eq!(results.len(), 2);
        let bad = results
            .iter()
            .find(|r| r.path.file_name().unwrap() == "bad.constela")
            .unwrap();
        assert_eq!(bad.result.errors[0].code, crate::error::PARSE_ERROR);
        let good = results
            .iter()
            .find(|r| r.path.file_name().unwrap() == "good.constela")
            .unwrap();
        assert!(good.result.is_ok());
    }

    #[test]
    fn missing_directory_is_empty() {
        let results = compile_project(
            Path::new("/definitely/not/here"),
            &CompileOptions::default(),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn cache_round_trip_through_project_compile() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        write_program(dir.path(), "app.constela", valid_program());
        let cache = IncrementalCache::at(cache_dir.path());

        let first =
            compile_project_with_cache(dir.path(), &CompileOptions::default(), Some(&cache));
        assert!(first[0].result.is_ok());

        // Second run hits the cache; results must be identical in shape.
        let second =
            compile_project_with_cache(dir.path(), &CompileOptions::default(), Some(&cache));
        assert!(second[0].result.is_ok());
        assert_eq!(
            serde_json::to_value(first[0].result.program.as_ref().unwrap()).unwrap(),
            serde_json::to_value(second[0].result.program.as_ref().unwrap()).unwrap(),
        );
    }
}
