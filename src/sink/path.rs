//! Pure helpers for laying out chunk/shard paths and materializing their
//! parent directories.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use crate::array::dimension::{ArrayDimensions, DimensionPartsFn};
use crate::foundation::error::{ZarrError, ZarrResult};

pub(crate) fn strip_file_scheme(path: &str) -> &str {
    path.strip_prefix("file://").unwrap_or(path)
}

/// Paths for every leaf chunk/shard under `base_path`, in row-major order:
/// intermediate indices iterate dims `1..ndims-1`, leaves iterate the width
/// dimension fastest.
pub(crate) fn construct_data_paths(
    base_path: &str,
    dims: &ArrayDimensions,
    parts_along_dimension: DimensionPartsFn,
) -> Vec<String> {
    let mut queue = VecDeque::new();
    queue.push_back(base_path.to_string());

    // intermediate paths: skip the append dimension and the width dimension
    for i in 1..dims.ndims() - 1 {
        let n_parts = parts_along_dimension(dims.at(i));

        let n_paths = queue.len();
        for _ in 0..n_paths {
            let path = queue.pop_front().expect("queue holds n_paths entries");
            for k in 0..n_parts {
                queue.push_back(format!("{path}/{k}"));
            }
        }
    }

    // leaf paths along the width dimension
    let n_parts = parts_along_dimension(dims.width_dim());
    let mut paths_out = Vec::with_capacity(queue.len() * n_parts as usize);
    for path in queue {
        for j in 0..n_parts {
            paths_out.push(format!("{path}/{j}"));
        }
    }

    paths_out
}

/// Unique parent directories of `file_paths`.
pub(crate) fn parent_paths(file_paths: &[String]) -> Vec<String> {
    let unique: HashSet<&str> = file_paths
        .iter()
        .filter_map(|p| Path::new(p).parent().and_then(Path::to_str))
        .collect();
    unique.into_iter().map(String::from).collect()
}

/// Create directories in parallel. Pre-existing directories are accepted.
pub(crate) fn make_dirs(dir_paths: &[String], pool: &rayon::ThreadPool) -> ZarrResult<()> {
    if dir_paths.is_empty() {
        return Ok(());
    }

    pool.install(|| {
        dir_paths.par_iter().try_for_each(|path| {
            if Path::new(path).is_dir() {
                debug!(path = %path, "directory already exists");
                return Ok(());
            }
            std::fs::create_dir_all(path).map_err(|e| {
                ZarrError::io(format!("failed to create directory '{path}': {e}"))
            })
        })
    })
}

/// Create the parent directory of a single file path.
pub(crate) fn ensure_parent_dir(file_path: &str) -> ZarrResult<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ZarrError::io(format!(
                    "failed to create directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}
