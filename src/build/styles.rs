//! Style stage: copies each style source directory into the styles output.
//!
//! Every directory is processed by its own task; the stage finishes once all
//! of them have.

use std::path::PathBuf;

use tokio::task::JoinSet;

use super::builder::BuildError;
use crate::config::SourceDir;

/// Copy every style directory under `output`, one task per directory.
/// Returns the number of files written.
pub async fn process_styles(dirs: Vec<SourceDir>, output: PathBuf) -> Result<usize, BuildError> {
    let mut tasks = JoinSet::new();
    for dir in dirs {
        let dest = output.join(dir.dest.trim_matches('/'));
        tasks.spawn(copy_style_dir(dir.source, dest, dir.recursive));
    }

    let mut copied = 0;
    while let Some(result) = tasks.join_next().await {
        copied += result.map_err(BuildError::StyleTask)??;
    }
    Ok(copied)
}

async fn copy_style_dir(source: PathBuf, dest: PathBuf, recursive: bool) -> Result<usize, BuildError> {
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        tracing::warn!(path = %source.display(), "style directory not found, skipping");
        return Ok(0);
    }

    let style_error = |path: &PathBuf| {
        let path = path.clone();
        move |source| BuildError::Style { path, source }
    };

    let mut copied = 0;
    let mut pending = vec![(source.clone(), dest)];
    while let Some((dir, out)) = pending.pop() {
        tokio::fs::create_dir_all(&out).await.map_err(style_error(&out))?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(style_error(&dir))?;
        while let Some(entry) = entries.next_entry().await.map_err(style_error(&dir))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(style_error(&path))?;
            if file_type.is_dir() {
                if recursive {
                    pending.push((path, out.join(entry.file_name())));
                }
            } else if file_type.is_file() {
                tokio::fs::copy(&path, out.join(entry.file_name()))
                    .await
                    .map_err(style_error(&path))?;
                copied += 1;
            }
        }
    }

    tracing::debug!(source = %source.display(), files = copied, "styles copied");
    Ok(copied)
}
