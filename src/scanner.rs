use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::DocumentRef;

/// Enumerate candidate documents under the corpus root by extension
/// allow-list. Results are sorted by relative path for deterministic
/// ordering.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<DocumentRef>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(
        &config
            .extensions
            .iter()
            .map(|ext| format!("**/*.{}", ext.to_lowercase()))
            .collect::<Vec<_>>(),
    )?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut refs = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_lowercase();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        refs.push(path_to_document_ref(path));
    }

    refs.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(refs)
}

fn path_to_document_ref(path: &Path) -> DocumentRef {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    DocumentRef {
        path: path.to_path_buf(),
        file_name,
        content_type: content_type_for(&ext),
    }
}

/// Content type accepted for upload, keyed by extension. Unknown extensions
/// never reach here (the allow-list filters them), but default to plain text.
fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "md" => "text/markdown",
        "html" => "text/html",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "css" => "text/css",
        _ => "text/plain",
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus_config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            extensions: vec!["md".to_string(), "txt".to_string(), "py".to_string()],
            exclude_globs: Vec::new(),
        }
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("notes.md"), "# notes").unwrap();
        fs::write(tmp.path().join("data.txt"), "data").unwrap();
        fs::write(tmp.path().join("image.png"), [0u8; 4]).unwrap();
        fs::write(tmp.path().join("binary.exe"), [0u8; 4]).unwrap();

        let refs = scan_corpus(&corpus_config(tmp.path())).unwrap();
        let names: Vec<&str> = refs.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["data.txt", "notes.md"]);
    }

    #[test]
    fn test_scan_recurses_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub/deep")).unwrap();
        fs::write(tmp.path().join("sub/deep/z.py"), "print()").unwrap();
        fs::write(tmp.path().join("a.md"), "# a").unwrap();

        let refs = scan_corpus(&corpus_config(tmp.path())).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].file_name, "a.md");
        assert_eq!(refs[1].file_name, "z.py");
    }

    #[test]
    fn test_scan_skips_excluded_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
        fs::write(tmp.path().join("node_modules/pkg/index.py"), "x").unwrap();
        fs::write(tmp.path().join("keep.md"), "# keep").unwrap();

        let refs = scan_corpus(&corpus_config(tmp.path())).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].file_name, "keep.md");
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let config = corpus_config(Path::new("/nonexistent/corpus"));
        assert!(scan_corpus(&config).is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("pdf"), "application/pdf");
        assert_eq!(content_type_for("md"), "text/markdown");
        assert_eq!(content_type_for("rs"), "text/plain");
    }
}
