// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic directed acyclic graph.
//!
//! [`Dag`] stores vertices and edges by identity, keeps incoming/outgoing
//! edge indices per vertex, rejects any edge that would close a cycle, and
//! derives a deterministic topological order on demand.

use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::OnceLock;

/// A vertex with a stable identity
pub trait Vertex {
    /// Identity type
    type Id: Copy + Eq + Hash + Debug;

    /// The vertex identity
    fn id(&self) -> Self::Id;
}

/// An edge between two vertices, referenced by identity
pub trait Edge {
    /// Identity type of the edge itself
    type Id: Copy + Eq + Hash + Debug;
    /// Identity type of the endpoints
    type VertexId: Copy + Eq + Hash + Debug;

    /// The edge identity
    fn id(&self) -> Self::Id;

    /// Vertex the edge leaves
    fn source(&self) -> Self::VertexId;

    /// Vertex the edge enters
    fn target(&self) -> Self::VertexId;
}

/// Structural error raised by [`Dag`] mutations.
///
/// Every failing mutation leaves the graph exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DagError<Id: Debug> {
    /// An edge endpoint is not part of the graph
    #[error("Vertex not found: {0:?}")]
    VertexNotFound(Id),

    /// A vertex with the same identity is already present
    #[error("Duplicate vertex: {0:?}")]
    DuplicateVertex(Id),

    /// The edge would create a path back to its own source
    #[error("Edge {from:?} -> {to:?} would create a cycle")]
    CycleDetected {
        /// Source vertex of the rejected edge
        from: Id,
        /// Target vertex of the rejected edge
        to: Id,
    },
}

/// A directed acyclic graph
#[derive(Debug)]
pub struct Dag<V, E>
where
    V: Vertex,
    E: Edge<VertexId = V::Id>,
{
    vertices: IndexMap<V::Id, V>,
    edges: IndexMap<E::Id, E>,
    incoming: HashMap<V::Id, Vec<E::Id>>,
    outgoing: HashMap<V::Id, Vec<E::Id>>,
    /// Topological order, dropped on every structural mutation
    order: OnceLock<Vec<V::Id>>,
}

impl<V, E> Dag<V, E>
where
    V: Vertex,
    E: Edge<VertexId = V::Id>,
{
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            vertices: IndexMap::new(),
            edges: IndexMap::new(),
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
            order: OnceLock::new(),
        }
    }

    /// Add a vertex
    pub fn add_vertex(&mut self, vertex: V) -> Result<V::Id, DagError<V::Id>> {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return Err(DagError::DuplicateVertex(id));
        }
        self.vertices.insert(id, vertex);
        self.incoming.insert(id, Vec::new());
        self.outgoing.insert(id, Vec::new());
        self.invalidate();
        Ok(id)
    }

    /// Remove a vertex together with every edge touching it
    pub fn remove_vertex(&mut self, id: V::Id) -> Result<(V, Vec<E>), DagError<V::Id>> {
        if !self.vertices.contains_key(&id) {
            return Err(DagError::VertexNotFound(id));
        }

        let incident: Vec<E::Id> = self
            .edges
            .values()
            .filter(|e| e.source() == id || e.target() == id)
            .map(Edge::id)
            .collect();
        let removed = incident
            .into_iter()
            .filter_map(|edge_id| self.remove_edge(edge_id))
            .collect();

        self.incoming.remove(&id);
        self.outgoing.remove(&id);
        let vertex = self
            .vertices
            .shift_remove(&id)
            .ok_or(DagError::VertexNotFound(id))?;
        self.invalidate();
        Ok((vertex, removed))
    }

    /// Get a vertex by identity
    pub fn vertex(&self, id: V::Id) -> Option<&V> {
        self.vertices.get(&id)
    }

    /// Get a mutable vertex by identity
    pub fn vertex_mut(&mut self, id: V::Id) -> Option<&mut V> {
        self.vertices.get_mut(&id)
    }

    /// Check whether a vertex is present
    pub fn contains_vertex(&self, id: V::Id) -> bool {
        self.vertices.contains_key(&id)
    }

    /// All vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.vertices.values()
    }

    /// All vertex identities in insertion order
    pub fn vertex_ids(&self) -> impl Iterator<Item = V::Id> + '_ {
        self.vertices.keys().copied()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Add an edge, rejecting unknown endpoints and cycles
    pub fn add_edge(&mut self, edge: E) -> Result<E::Id, DagError<V::Id>> {
        let (from, to) = (edge.source(), edge.target());
        if !self.vertices.contains_key(&from) {
            return Err(DagError::VertexNotFound(from));
        }
        if !self.vertices.contains_key(&to) {
            return Err(DagError::VertexNotFound(to));
        }
        if self.is_reachable(to, from) {
            return Err(DagError::CycleDetected { from, to });
        }

        let id = edge.id();
        self.outgoing.entry(from).or_default().push(id);
        self.incoming.entry(to).or_default().push(id);
        self.edges.insert(id, edge);
        self.invalidate();
        Ok(id)
    }

    /// Remove an edge
    pub fn remove_edge(&mut self, id: E::Id) -> Option<E> {
        let edge = self.edges.shift_remove(&id)?;
        if let Some(list) = self.outgoing.get_mut(&edge.source()) {
            list.retain(|e| *e != id);
        }
        if let Some(list) = self.incoming.get_mut(&edge.target()) {
            list.retain(|e| *e != id);
        }
        self.invalidate();
        Some(edge)
    }

    /// Get an edge by identity
    pub fn edge(&self, id: E::Id) -> Option<&E> {
        self.edges.get(&id)
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &E> {
        self.edges.values()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges entering a vertex
    pub fn incoming_edges(&self, id: V::Id) -> impl Iterator<Item = &E> {
        self.incoming
            .get(&id)
            .into_iter()
            .flat_map(|ids| ids.iter().filter_map(|e| self.edges.get(e)))
    }

    /// Edges leaving a vertex
    pub fn outgoing_edges(&self, id: V::Id) -> impl Iterator<Item = &E> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flat_map(|ids| ids.iter().filter_map(|e| self.edges.get(e)))
    }

    /// Distinct direct predecessors of a vertex
    pub fn predecessors(&self, id: V::Id) -> Vec<V::Id> {
        let mut seen = HashSet::new();
        self.incoming_edges(id)
            .map(Edge::source)
            .filter(|v| seen.insert(*v))
            .collect()
    }

    /// Distinct direct successors of a vertex
    pub fn successors(&self, id: V::Id) -> Vec<V::Id> {
        let mut seen = HashSet::new();
        self.outgoing_edges(id)
            .map(Edge::target)
            .filter(|v| seen.insert(*v))
            .collect()
    }

    /// Whether `to` can be reached from `from` by following edges.
    ///
    /// A vertex always reaches itself.
    pub fn is_reachable(&self, from: V::Id, to: V::Id) -> bool {
        if from == to {
            return true;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            for edge in self.outgoing_edges(current) {
                let next = edge.target();
                if next == to {
                    return true;
                }
                queue.push_back(next);
            }
        }
        false
    }

    /// Vertices in topological order.
    ///
    /// Uses Kahn's algorithm; among vertices that are ready at the same time
    /// the one inserted first comes first.
    pub fn topological_order(&self) -> &[V::Id] {
        self.order.get_or_init(|| self.compute_order())
    }

    fn compute_order(&self) -> Vec<V::Id> {
        let mut in_degree: Vec<usize> = self
            .vertices
            .keys()
            .map(|id| self.incoming.get(id).map_or(0, Vec::len))
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut order = Vec::with_capacity(self.vertices.len());
        while let Some(Reverse(index)) = ready.pop() {
            let Some((&id, _)) = self.vertices.get_index(index) else {
                continue;
            };
            order.push(id);

            for edge in self.outgoing_edges(id) {
                if let Some(target) = self.vertices.get_index_of(&edge.target()) {
                    in_degree[target] -= 1;
                    if in_degree[target] == 0 {
                        ready.push(Reverse(target));
                    }
                }
            }
        }
        order
    }

    fn invalidate(&mut self) {
        self.order = OnceLock::new();
    }
}

impl<V, E> Default for Dag<V, E>
where
    V: Vertex,
    E: Edge<VertexId = V::Id>,
{
    fn default() -> Self {
        Self::new()
    }
}
