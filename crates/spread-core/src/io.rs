//! Annotation files on disk

use crate::annotation::{Annotation, AnnotationSet};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Read an annotation file, one `<label x_c y_c width height>` line per box.
///
/// Blank lines are skipped, a malformed line fails the whole file.
pub fn read_annotations<P: AsRef<Path>>(path: P) -> Result<AnnotationSet> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut annotations = AnnotationSet::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line
            .with_context(|| format!("Failed to read line {} from {:?}", line_num + 1, path))?;

        if line.trim().is_empty() {
            continue;
        }

        let annotation: Annotation = line
            .parse()
            .with_context(|| format!("Invalid annotation at line {} of {:?}", line_num + 1, path))?;
        annotations.push(annotation);
    }

    Ok(annotations)
}

/// Write an annotation file, replacing any previous content
pub fn write_annotations<P: AsRef<Path>>(path: P, annotations: &AnnotationSet) -> Result<()> {
    std::fs::write(&path, annotations.to_lines())
        .with_context(|| format!("Failed to write annotations to: {:?}", path.as_ref()))
}

/// Picture id of a `<prefix>_<id>.<ext>` file name, -1 if it has none.
///
/// Grayscale pictures carry a `grsc` marker in front of the id.
pub fn picture_id(file_name: &str) -> i64 {
    let stem = file_name.split('.').next().unwrap_or_default();
    let id = stem.rsplit('_').next().unwrap_or_default();
    id.replace("grsc", "").parse().unwrap_or(-1)
}

/// Prefix of a `<prefix>_<id>.<ext>` file name
pub fn picture_prefix(file_name: &str) -> &str {
    let stem = file_name.split('.').next().unwrap_or_default();
    stem.rsplit_once('_').map(|(prefix, _)| prefix).unwrap_or(stem)
}

/// Annotation files of a directory ordered by picture id
pub fn list_annotation_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }

    files.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        (picture_id(&name), name)
    });
    Ok(files)
}
