use core::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    error::MeshError,
    utils::types::{edge_key, EdgeKey, Triangle, VertexIdx},
};

/// Local connectivity of a triangle soup.
///
/// Neighbors are stored per vertex in an arena indexed by [`VertexIdx`], sorted and without duplicates.
/// The opposite apexes are stored per directed edge; both `(u, v)` and `(v, u)` carry the same set,
/// i.e. the third vertex of every triangle containing the undirected edge `{u, v}`.
///
/// ```ignore
///        c
///       / \
///      /   \        opposites(a, b) == opposites(b, a) == [c, d]
///     a ---- b
///      \   /
///       \ /
///        d
/// ```
#[derive(Debug, Clone)]
pub struct Topology {
    vertex_count: usize,
    num_triangles: usize,
    adjacency: Vec<Vec<VertexIdx>>,
    edge_opposites: FxHashMap<EdgeKey, Vec<VertexIdx>>,
}

/// Build the adjacency and edge-opposite tables of a triangle list.
///
/// ## Errors
/// Returns [`MeshError::MalformedTopology`] if a triangle references a vertex outside of `[0, vertex_count)`,
/// repeats a vertex, or repeats the vertex set of an earlier triangle,
/// or if `vertex_count` does not fit into a [`VertexIdx`].
/// A repeated face is rejected since the apex sets would silently merge it with the first one.
pub fn build_topology(triangles: &[Triangle], vertex_count: usize) -> Result<Topology, MeshError> {
    if VertexIdx::try_from(vertex_count).is_err() {
        return Err(MeshError::MalformedTopology(format!(
            "{vertex_count} vertices exceed the 32-bit index space"
        )));
    }

    let mut adjacency: Vec<Vec<VertexIdx>> = vec![Vec::new(); vertex_count];
    let mut edge_opposites: FxHashMap<EdgeKey, Vec<VertexIdx>> = FxHashMap::default();
    let mut faces: FxHashSet<Triangle> = FxHashSet::default();

    for (tri_idx, &tri) in triangles.iter().enumerate() {
        let [a, b, c] = tri;

        if tri.iter().any(|&v| v as usize >= vertex_count) {
            return Err(MeshError::malformed(tri_idx, tri, "vertex index out of range"));
        }
        if a == b || b == c || c == a {
            return Err(MeshError::malformed(tri_idx, tri, "repeated vertex"));
        }

        let mut face = tri;
        face.sort_unstable();
        if !faces.insert(face) {
            return Err(MeshError::malformed(tri_idx, tri, "duplicate of an earlier triangle"));
        }

        // edge {u, v} is opposite of apex
        for (u, v, apex) in [(a, b, c), (b, c, a), (c, a, b)] {
            adjacency[u as usize].push(v);
            adjacency[v as usize].push(u);

            edge_opposites.entry(edge_key(u, v)).or_default().push(apex);
            edge_opposites.entry(edge_key(v, u)).or_default().push(apex);
        }
    }

    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    for apexes in edge_opposites.values_mut() {
        apexes.sort_unstable();
        apexes.dedup();
    }

    let topology = Topology {
        vertex_count,
        num_triangles: triangles.len(),
        adjacency,
        edge_opposites,
    };

    #[cfg(feature = "logging")]
    {
        log::debug!("{topology}");
        if let (Some(valence), Some(opposites)) =
            (topology.valence_range(), topology.opposite_count_range())
        {
            log::debug!(
                "Valence in [{}, {}], opposite apexes per edge in [{}, {}]",
                valence.0,
                valence.1,
                opposites.0,
                opposites.1
            );
        }
    }

    Ok(topology)
}

impl Topology {
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub const fn num_triangles(&self) -> usize {
        self.num_triangles
    }

    /// The number of undirected edges.
    pub fn num_edges(&self) -> usize {
        self.edge_opposites.len() / 2
    }

    /// The neighbors of `v`, sorted ascending. Empty for isolated or unknown vertices.
    pub fn neighbors(&self, v: VertexIdx) -> &[VertexIdx] {
        self.adjacency.get(v as usize).map_or(&[][..], Vec::as_slice)
    }

    /// The apexes of all triangles containing the edge `{u, v}`, sorted ascending.
    ///
    /// Empty if `u` and `v` are not connected.
    pub fn opposites(&self, u: VertexIdx, v: VertexIdx) -> &[VertexIdx] {
        self.edge_opposites
            .get(&edge_key(u, v))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Check if `v` is not part of any triangle.
    pub fn is_isolated(&self, v: VertexIdx) -> bool {
        self.neighbors(v).is_empty()
    }

    /// Iterate over all undirected edges as `(u, v)` with `u < v`.
    pub fn edges(&self) -> impl Iterator<Item = (VertexIdx, VertexIdx)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(u, neighbors)| {
            let u = u as VertexIdx;
            neighbors
                .iter()
                .filter(move |&&n| n > u)
                .map(move |&n| (u, n))
        })
    }

    /// All edges with a single opposite apex.
    pub fn boundary_edges(&self) -> Vec<(VertexIdx, VertexIdx)> {
        self.edges()
            .filter(|&(u, v)| self.opposites(u, v).len() == 1)
            .collect()
    }

    /// Check if every edge is shared by exactly two triangles.
    pub fn is_closed(&self) -> bool {
        self.edges().all(|(u, v)| self.opposites(u, v).len() == 2)
    }

    /// Smallest and largest number of neighbors over all non-isolated vertices.
    pub fn valence_range(&self) -> Option<(usize, usize)> {
        min_max(
            self.adjacency
                .iter()
                .map(Vec::len)
                .filter(|&valence| valence > 0),
        )
    }

    /// Smallest and largest number of opposite apexes over all edges.
    ///
    /// Anything outside of `[1, 2]` means the mesh is not a manifold.
    pub fn opposite_count_range(&self) -> Option<(usize, usize)> {
        min_max(self.edge_opposites.values().map(Vec::len))
    }
}

fn min_max(values: impl Iterator<Item = usize>) -> Option<(usize, usize)> {
    values.fold(None, |acc, x| match acc {
        None => Some((x, x)),
        Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
    })
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Topology with {} vertices, {} triangles and {} edges",
            self.vertex_count,
            self.num_triangles,
            self.num_edges()
        )
    }
}
