//! Save/Load for precomputed contact graphs
//!
//! Uses bincode for compact binary blobs. Every blob starts with a format
//! version so a stale file is rejected instead of misread.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::PopulationModel;
use crate::config::SimulationConfig;
use crate::generation::ContactGraph;

/// Version number for graph blobs (increment when the format changes)
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// File name of the cached graph for one community.
pub fn graph_file_name(community: &str) -> String {
    format!("{community}-graph.bin")
}

pub fn graph_path(dir: &Path, community: &str) -> PathBuf {
    dir.join(graph_file_name(community))
}

#[derive(Serialize)]
struct GraphBlobRef<'a> {
    version: u32,
    graph: &'a ContactGraph,
}

#[derive(Deserialize)]
struct GraphBlob {
    version: u32,
    graph: ContactGraph,
}

/// Errors that can occur while reading or writing graph blobs
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Graph format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Write a graph to a writer
pub fn save_graph<W: Write>(writer: W, graph: &ContactGraph) -> Result<(), PersistError> {
    let blob = GraphBlobRef {
        version: GRAPH_FORMAT_VERSION,
        graph,
    };
    bincode::serialize_into(writer, &blob)?;
    Ok(())
}

/// Read a graph from a reader
pub fn load_graph<R: Read>(reader: R) -> Result<ContactGraph, PersistError> {
    let blob: GraphBlob = bincode::deserialize_from(reader)?;
    if blob.version != GRAPH_FORMAT_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: GRAPH_FORMAT_VERSION,
            found: blob.version,
        });
    }
    Ok(blob.graph)
}

pub fn save_graph_file(path: &Path, graph: &ContactGraph) -> Result<(), PersistError> {
    let mut writer = BufWriter::new(File::create(path)?);
    save_graph(&mut writer, graph)?;
    writer.flush()?;
    Ok(())
}

pub fn load_graph_file(path: &Path) -> Result<ContactGraph, PersistError> {
    load_graph(BufReader::new(File::open(path)?))
}

/// Load a graph and check it against the configuration it will serve.
pub fn load_validated(
    path: &Path,
    config: &SimulationConfig,
    population: &PopulationModel,
) -> crate::error::Result<ContactGraph> {
    let graph = load_graph_file(path)?;
    graph.validate(config, population)?;
    log::debug!("loaded graph {} ({} nodes)", path.display(), graph.node_count());
    Ok(graph)
}
