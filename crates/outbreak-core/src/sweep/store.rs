//! Intermediary store: one file per finished combination.
//!
//! Partial results are written to a temporary file in the store directory
//! and renamed into place, so a file that exists is always complete. That
//! is what makes `skip_existing` safe after an interrupted sweep.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use super::{BehaviourCombination, ResultTree};
use crate::components::AveragedResult;
use crate::config::read_json;
use crate::error::Result;
use crate::generation::ContactGraph;
use crate::persistence;

#[derive(Debug)]
pub struct IntermediaryStore {
    dir: PathBuf,
}

impl IntermediaryStore {
    /// Open (creating if needed) the store at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partial_path(&self, community: &str, combination: &BehaviourCombination) -> PathBuf {
        self.dir
            .join(format!("{community}-{}.json", combination.file_stem()))
    }

    pub fn graph_path(&self, community: &str) -> PathBuf {
        persistence::graph_path(&self.dir, community)
    }

    pub fn contains(&self, community: &str, combination: &BehaviourCombination) -> bool {
        self.partial_path(community, combination).is_file()
    }

    /// Persist one combination's result atomically.
    pub fn write(
        &self,
        community: &str,
        combination: &BehaviourCombination,
        result: &AveragedResult,
    ) -> Result<PathBuf> {
        let path = self.partial_path(community, combination);
        write_json_atomic(&path, result)?;
        Ok(path)
    }

    pub fn read(&self, community: &str, combination: &BehaviourCombination) -> Result<AveragedResult> {
        read_json(self.partial_path(community, combination))
    }

    /// Save the community's shared graph next to its partial results.
    pub fn save_graph(&self, community: &str, graph: &ContactGraph) -> Result<PathBuf> {
        let path = self.graph_path(community);
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            persistence::save_graph(&mut writer, graph)?;
            writer.flush()?;
        }
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// Collect the partial results of `combinations` into one tree.
    ///
    /// Takes `&mut self` so no writer can add files while the merge reads.
    pub fn merge(&mut self, community: &str, combinations: &[BehaviourCombination]) -> Result<ResultTree> {
        let mut tree = ResultTree::new();
        for combination in combinations {
            let result = self.read(community, combination)?;
            tree.insert(combination, result)?;
        }
        log::debug!(
            "merged {} partial results for {community} from {}",
            combinations.len(),
            self.dir.display()
        );
        Ok(tree)
    }

    /// Remove the store directory and everything in it.
    pub fn delete(self) -> Result<()> {
        fs::remove_dir_all(&self.dir)?;
        log::info!("deleted intermediary store {}", self.dir.display());
        Ok(())
    }
}

/// Write `value` as JSON to a temporary sibling of `path`, then rename it
/// into place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
