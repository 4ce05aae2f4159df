//! Source directory scanning

use std::path::Path;

use crate::error::IngestError;
use crate::types::FileUnit;

/// List regular files in `dir` whose name ends in `.{extension}`
///
/// The scan is not recursive. Results are sorted by identifier.
pub async fn discover_files(dir: &Path, extension: &str) -> Result<Vec<FileUnit>, IngestError> {
    let source_err = |source| IngestError::SourceDir {
        dir: dir.to_path_buf(),
        source,
    };

    let suffix = format!(".{}", extension);
    let mut entries = tokio::fs::read_dir(dir).await.map_err(source_err)?;
    let mut units = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(source_err)? {
        let path = entry.path();

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };
        if !name.ends_with(&suffix) {
            continue;
        }

        // Follows symlinks
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => units.push(FileUnit::new(name, path)),
            Ok(_) => {},
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
            },
        }
    }

    units.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    tracing::debug!(dir = %dir.display(), count = units.len(), "Scanned source directory");

    Ok(units)
}
