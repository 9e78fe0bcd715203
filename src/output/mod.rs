// src/output/mod.rs
// =============================================================================
// Output artifacts of a run.
//
// Submodules:
// - tree: structure -> collapsible <ul> list (+ HTML escaping)
// - html: the full self-contained document around the tree
//
// Only render_index leaves this module; the tree walker is an internal
// detail of the document.
//
// This file writes the artifact set. Files are first written into
// "<out>/<run-id>.partial/" and the directory is renamed to "<out>/<run-id>/"
// only once everything is on disk, so a run that fails halfway never leaves
// something that looks like a complete result.
// =============================================================================

mod html;
mod tree;

use std::path::{Path, PathBuf};

use crate::error::ExtractError;
use crate::structure::{Structure, StructureIndex};

pub use html::render_index;

/// Where a finished run's artifacts ended up
#[derive(Debug, Clone, serde::Serialize)]
pub struct Artifacts {
    pub dir: PathBuf,
    pub index: PathBuf,
    pub document: PathBuf,
}

/// (index file, document file) names for a structure kind
pub fn file_names(structure: &Structure) -> (&'static str, &'static str) {
    match structure {
        Structure::Pages(_) => ("index.json", "sitemap.html"),
        Structure::Paths(_) => ("structure.json", "url-structure.html"),
    }
}

fn staging_dir(out_root: &Path, run_id: &str) -> PathBuf {
    out_root.join(format!("{run_id}.partial"))
}

/// Writes the index and rendered document, publishing them atomically
pub async fn write_artifacts(
    out_root: &Path,
    run_id: &str,
    index: &StructureIndex,
) -> Result<Artifacts, ExtractError> {
    let staging = staging_dir(out_root, run_id);
    match write_staged(&staging, out_root.join(run_id), index).await {
        Ok(artifacts) => Ok(artifacts),
        Err(e) => {
            discard(out_root, run_id).await;
            Err(e)
        }
    }
}

async fn write_staged(
    staging: &Path,
    final_dir: PathBuf,
    index: &StructureIndex,
) -> Result<Artifacts, ExtractError> {
    let (index_name, document_name) = file_names(&index.structure);

    tokio::fs::create_dir_all(staging)
        .await
        .map_err(|e| ExtractError::io(staging, e))?;

    let json = serde_json::to_string_pretty(index)?;
    let index_path = staging.join(index_name);
    tokio::fs::write(&index_path, json)
        .await
        .map_err(|e| ExtractError::io(&index_path, e))?;

    let document = render_index(index);
    let document_path = staging.join(document_name);
    tokio::fs::write(&document_path, document)
        .await
        .map_err(|e| ExtractError::io(&document_path, e))?;

    if tokio::fs::try_exists(&final_dir).await.unwrap_or(false) {
        return Err(ExtractError::io(
            &final_dir,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "output directory already exists"),
        ));
    }
    tokio::fs::rename(staging, &final_dir)
        .await
        .map_err(|e| ExtractError::io(&final_dir, e))?;

    Ok(Artifacts {
        index: final_dir.join(index_name),
        document: final_dir.join(document_name),
        dir: final_dir,
    })
}

/// Removes a run's unpublished output, if any
pub async fn discard(out_root: &Path, run_id: &str) {
    let staging = staging_dir(out_root, run_id);
    match tokio::fs::remove_dir_all(&staging).await {
        Ok(()) => tracing::debug!(dir = %staging.display(), "discarded partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %staging.display(), error = %e, "failed to discard partial output"),
    }
}

/// Loads a structure index written by an earlier run
pub async fn read_index(path: &Path) -> Result<StructureIndex, ExtractError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExtractError::io(path, e))?;
    Ok(serde_json::from_str(&json)?)
}
