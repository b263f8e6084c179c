use std::collections::BTreeSet;

use sha2::Digest;
use sha2::Sha256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    Data,
    Control,
    Temporal,
}

impl EdgeKind {
    fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Data => "DATA",
            EdgeKind::Control => "CONTROL",
            EdgeKind::Temporal => "TEMPORAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Built per reducer invocation: nodes, typed edges, and derived root/leaf
/// nodes, all hashed over a lexicographically sorted encoding so the same
/// graph always hashes the same way regardless of construction order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
    pub root_nodes: Vec<String>,
    pub leaf_nodes: Vec<String>,
    pub hash: String,
}

impl DependencyGraph {
    pub fn build(nodes: Vec<String>, edges: Vec<Edge>) -> Self {
        let mut nodes: Vec<String> = nodes.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        nodes.sort();
        let mut edges = edges;
        edges.sort();

        let has_incoming: BTreeSet<&str> = edges.iter().map(|e| e.to.as_str()).collect();
        let has_outgoing: BTreeSet<&str> = edges.iter().map(|e| e.from.as_str()).collect();
        let root_nodes: Vec<String> = nodes
            .iter()
            .filter(|n| !has_incoming.contains(n.as_str()))
            .cloned()
            .collect();
        let leaf_nodes: Vec<String> = nodes
            .iter()
            .filter(|n| !has_outgoing.contains(n.as_str()))
            .cloned()
            .collect();

        let hash = Self::compute_hash(&nodes, &edges);

        DependencyGraph {
            nodes,
            edges,
            root_nodes,
            leaf_nodes,
            hash,
        }
    }

    fn compute_hash(nodes: &[String], edges: &[Edge]) -> String {
        let mut buf = Vec::new();
        for n in nodes {
            buf.extend_from_slice(n.as_bytes());
            buf.push(0);
        }
        buf.push(0xff);
        for e in edges {
            buf.extend_from_slice(e.from.as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.to.as_bytes());
            buf.push(0);
            buf.extend_from_slice(e.kind.as_str().as_bytes());
            buf.push(0xfe);
        }
        format!("sha256:{}", hex::encode(Sha256::digest(&buf)))
    }
}
