//! Network loading and the adjacency structure consumed by transitions.
//!
//! A network lives in `<folder>/<name>/` as `nodes.csv` (first column: node
//! label) and `edges.csv` (`source,target[,weight]`). An edge
//! `source -> target` means the source supplies goods to the target.

use crate::error::ResourceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Reference to a network on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRef {
    pub folder: PathBuf,
    pub name: String,
}

impl NetworkRef {
    pub fn new(folder: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
        }
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.folder.join(&self.name).join("nodes.csv")
    }

    pub fn edges_path(&self) -> PathBuf {
        self.folder.join(&self.name).join("edges.csv")
    }
}

/// Compressed sparse rows: neighbours of row `i` are
/// `indices[offsets[i]..offsets[i + 1]]`, sorted ascending.
#[derive(Clone, Debug, PartialEq)]
struct Csr {
    offsets: Vec<usize>,
    indices: Vec<usize>,
    weights: Vec<Decimal>,
}

impl Csr {
    fn build(n: usize, edges: &[(usize, usize, Decimal)]) -> Self {
        let mut counts = vec![0usize; n + 1];
        for &(s, _, _) in edges {
            counts[s + 1] += 1;
        }
        for i in 0..n {
            counts[i + 1] += counts[i];
        }
        let offsets = counts.clone();
        let mut fill = counts;
        let mut slots: Vec<(usize, Decimal)> = vec![(0, Decimal::ZERO); edges.len()];
        for &(s, t, w) in edges {
            slots[fill[s]] = (t, w);
            fill[s] += 1;
        }
        for i in 0..n {
            slots[offsets[i]..offsets[i + 1]].sort_by_key(|(t, _)| *t);
        }
        let (indices, weights) = slots.into_iter().unzip();
        Self {
            offsets,
            indices,
            weights,
        }
    }

    fn row(&self, i: usize) -> (&[usize], &[Decimal]) {
        let r = self.offsets[i]..self.offsets[i + 1];
        (&self.indices[r.clone()], &self.weights[r])
    }
}

/// Weighted directed adjacency with forward and transpose views.
#[derive(Clone, Debug, PartialEq)]
pub struct Adjacency {
    n: usize,
    forward: Csr,
    transpose: Csr,
}

impl Adjacency {
    /// Build from `(source, target, weight)` triples over `n` nodes.
    ///
    /// Callers must pass in-range, unique edges; [`load`] checks both.
    pub fn from_edges(n: usize, edges: &[(usize, usize, Decimal)]) -> Self {
        let flipped: Vec<_> = edges.iter().map(|&(s, t, w)| (t, s, w)).collect();
        Self {
            n,
            forward: Csr::build(n, edges),
            transpose: Csr::build(n, &flipped),
        }
    }

    /// Agent count.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn edge_count(&self) -> usize {
        self.forward.indices.len()
    }

    /// Nodes supplied by `i`, with edge weights.
    pub fn successors(&self, i: usize) -> (&[usize], &[Decimal]) {
        self.forward.row(i)
    }

    /// Suppliers of `i`, with edge weights.
    pub fn predecessors(&self, i: usize) -> (&[usize], &[Decimal]) {
        self.transpose.row(i)
    }

    pub fn out_degree(&self, i: usize) -> usize {
        self.forward.offsets[i + 1] - self.forward.offsets[i]
    }

    pub fn in_degree(&self, i: usize) -> usize {
        self.transpose.offsets[i + 1] - self.transpose.offsets[i]
    }

    /// Dense lookup of edge `source -> target`.
    pub fn has_edge(&self, source: usize, target: usize) -> bool {
        self.forward.row(source).0.binary_search(&target).is_ok()
    }
}

/// Structural attributes derived once from the adjacency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttributes {
    pub name: String,
    pub agents: usize,
    pub edges: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    /// Agents without suppliers.
    pub sources: usize,
    /// Agents without customers.
    pub sinks: usize,
    pub self_loops: usize,
}

impl NetworkAttributes {
    pub fn derive(name: &str, adj: &Adjacency) -> Self {
        let n = adj.len();
        Self {
            name: name.to_string(),
            agents: n,
            edges: adj.edge_count(),
            max_in_degree: (0..n).map(|i| adj.in_degree(i)).max().unwrap_or(0),
            max_out_degree: (0..n).map(|i| adj.out_degree(i)).max().unwrap_or(0),
            sources: (0..n).filter(|&i| adj.in_degree(i) == 0).count(),
            sinks: (0..n).filter(|&i| adj.out_degree(i) == 0).count(),
            self_loops: (0..n).filter(|&i| adj.has_edge(i, i)).count(),
        }
    }
}

/// A resolved network: labels, adjacency and attributes.
#[derive(Clone, Debug)]
pub struct Network {
    pub labels: Vec<String>,
    pub adjacency: Adjacency,
    pub attributes: NetworkAttributes,
}

/// Read and validate a network from its node and edge files.
pub fn load(net: &NetworkRef) -> Result<Network, ResourceError> {
    let nodes_path = net.nodes_path();
    let edges_path = net.edges_path();

    let mut labels = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in read_records(&nodes_path)? {
        let label = record
            .get(0)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResourceError::malformed(&nodes_path, "empty node label"))?
            .to_string();
        if index.insert(label.clone(), labels.len()).is_some() {
            return Err(ResourceError::malformed(
                &nodes_path,
                format!("duplicate node '{label}'"),
            ));
        }
        labels.push(label);
    }
    if labels.is_empty() {
        return Err(ResourceError::malformed(&nodes_path, "no nodes"));
    }

    let lookup = |label: Option<&str>| -> Result<usize, ResourceError> {
        let label = label.map(str::trim).unwrap_or_default();
        index
            .get(label)
            .copied()
            .ok_or_else(|| ResourceError::malformed(&edges_path, format!("unknown node '{label}'")))
    };
    let mut edges = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for record in read_records(&edges_path)? {
        let s = lookup(record.get(0))?;
        let t = lookup(record.get(1))?;
        let w = match record.get(2).map(str::trim).filter(|s| !s.is_empty()) {
            None => Decimal::ONE,
            Some(raw) => Decimal::from_str(raw).map_err(|e| {
                ResourceError::malformed(&edges_path, format!("bad weight '{raw}': {e}"))
            })?,
        };
        if w <= Decimal::ZERO {
            return Err(ResourceError::malformed(
                &edges_path,
                format!("non-positive weight on {}->{}", labels[s], labels[t]),
            ));
        }
        if !seen.insert((s, t)) {
            return Err(ResourceError::malformed(
                &edges_path,
                format!("duplicate edge {}->{}", labels[s], labels[t]),
            ));
        }
        edges.push((s, t, w));
    }

    let adjacency = Adjacency::from_edges(labels.len(), &edges);
    let attributes = NetworkAttributes::derive(&net.name, &adjacency);
    debug!(
        network = %net.name,
        agents = attributes.agents,
        edges = attributes.edges,
        "network loaded"
    );
    Ok(Network {
        labels,
        adjacency,
        attributes,
    })
}

/// All data records of a headed CSV file.
pub fn read_records(path: &Path) -> Result<Vec<csv::StringRecord>, ResourceError> {
    let file = std::fs::File::open(path).map_err(|source| ResourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ResourceError::Csv {
            path: path.to_path_buf(),
            source,
        })
}
