use nalgebra::Vector3;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    error::MeshError,
    topology::Topology,
    utils::types::{edge_key, split_key, undirected_key, EdgeKey, Vertex3, VertexIdx},
};

/// Cotangent weights of the mesh Laplacian, one per undirected edge.
///
/// Each weight is stored under both `(u, v)` and `(v, u)`, so lookups are symmetric by construction.
#[derive(Debug, Clone, Default)]
pub struct CotanWeights {
    weights: FxHashMap<EdgeKey, f64>,
}

impl CotanWeights {
    /// The weight of the edge `{u, v}`, `None` if the two vertices are not connected.
    pub fn get(&self, u: VertexIdx, v: VertexIdx) -> Option<f64> {
        self.weights.get(&edge_key(u, v)).copied()
    }

    /// The number of undirected edges with a weight.
    pub fn len(&self) -> usize {
        self.weights.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate over all undirected edges as `((u, v), weight)` with `u < v`, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = ((VertexIdx, VertexIdx), f64)> + '_ {
        self.weights.iter().filter_map(|(&key, &w)| {
            let (u, v) = split_key(key);
            (u < v).then_some(((u, v), w))
        })
    }

    fn insert(&mut self, u: VertexIdx, v: VertexIdx, w: f64) {
        self.weights.insert(edge_key(u, v), w);
        self.weights.insert(edge_key(v, u), w);
    }
}

/// Lumped (barycentric) vertex mass: one third of the area of every incident triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LumpedMass {
    mass: Vec<f64>,
}

impl LumpedMass {
    pub fn get(&self, v: VertexIdx) -> Option<f64> {
        self.mass.get(v as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    /// The total mass, which equals the surface area of the mesh.
    pub fn total(&self) -> f64 {
        self.mass.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.mass
    }
}

/// The assembled data of a single vertex.
struct VertexRow {
    /// Weights of the edges to neighbors with a larger index.
    weights: Vec<(VertexIdx, f64)>,
    mass: f64,
}

/// Assemble the cotangent weights and the lumped mass of a mesh.
///
/// The vertices are processed in parallel via [`rayon`], the rows are merged in vertex order.
///
/// ## Errors
/// - [`MeshError::MalformedTopology`] if the number of positions does not match the topology.
/// - [`MeshError::NonManifoldEdge`] if an edge does not have one or two opposite apexes.
/// - [`MeshError::DegenerateGeometry`] if a triangle has coincident or collinear vertices.
pub fn assemble_weights(
    vertices: &[Vertex3],
    topology: &Topology,
) -> Result<(CotanWeights, LumpedMass), MeshError> {
    if vertices.len() != topology.vertex_count() {
        return Err(MeshError::MalformedTopology(format!(
            "{} positions for a topology of {} vertices",
            vertices.len(),
            topology.vertex_count()
        )));
    }

    #[cfg(feature = "logging")]
    let now = std::time::Instant::now();

    let positions: Vec<Vector3<f64>> = vertices.iter().map(|&v| Vector3::from(v)).collect();

    let rows = (0..vertices.len() as VertexIdx)
        .into_par_iter()
        .map(|v| assemble_row(&positions, topology, v))
        .collect::<Result<Vec<_>, _>>()?;

    let mut weights = CotanWeights::default();
    let mut mass = Vec::with_capacity(rows.len());
    for (v, row) in rows.into_iter().enumerate() {
        for (n, w) in row.weights {
            weights.insert(v as VertexIdx, n, w);
        }
        mass.push(row.mass);
    }

    #[cfg(feature = "logging")]
    log::trace!(
        "Assembled {} cotangent weights in {} μs",
        weights.len(),
        now.elapsed().as_micros()
    );

    Ok((weights, LumpedMass { mass }))
}

fn assemble_row(
    positions: &[Vector3<f64>],
    topology: &Topology,
    v: VertexIdx,
) -> Result<VertexRow, MeshError> {
    let p_v = positions[v as usize];

    let mut weights = Vec::new();
    let mut mass = 0.0;
    // triangles around v are identified by their two other vertices
    let mut counted: FxHashSet<EdgeKey> = FxHashSet::default();

    for &n in topology.neighbors(v) {
        let apexes = topology.opposites(v, n);
        if !(1..=2).contains(&apexes.len()) {
            return Err(MeshError::NonManifoldEdge {
                u: v.min(n),
                v: v.max(n),
                apex_count: apexes.len(),
            });
        }

        // the smaller endpoint owns the edge, so every weight is computed exactly once
        if v < n {
            let mut cot_sum = 0.0;
            for &p in apexes {
                cot_sum += cot_at_apex(positions, v, n, p)?;
            }
            weights.push((n, cot_sum));
        }

        let p_n = positions[n as usize];
        for &p in apexes {
            if counted.insert(undirected_key(n, p)) {
                let area = triangle_area(&p_v, &p_n, &positions[p as usize]);
                if !(area > 0.0 && area.is_finite()) {
                    return Err(MeshError::DegenerateGeometry {
                        u: v.min(n),
                        v: v.max(n),
                        apex: p,
                        reason: "zero or non-finite area",
                    });
                }
                mass += area / 3.0;
            }
        }
    }

    Ok(VertexRow { weights, mass })
}

/// The cotangent of the angle at `apex` in the triangle `(u, v, apex)`.
fn cot_at_apex(
    positions: &[Vector3<f64>],
    u: VertexIdx,
    v: VertexIdx,
    apex: VertexIdx,
) -> Result<f64, MeshError> {
    let degenerate = |reason| MeshError::DegenerateGeometry {
        u: u.min(v),
        v: u.max(v),
        apex,
        reason,
    };

    let p = positions[apex as usize];
    let (Some(to_u), Some(to_v)) = (
        (positions[u as usize] - p).try_normalize(0.0),
        (positions[v as usize] - p).try_normalize(0.0),
    ) else {
        return Err(degenerate("coincident vertices"));
    };

    // cot(θ) = cos(θ) / sin(θ), both from the unit vectors
    let cos = to_u.dot(&to_v);
    let sin = to_u.cross(&to_v).norm();
    if sin == 0.0 {
        return Err(degenerate("collinear vertices"));
    }

    let cot = cos / sin;
    if !cot.is_finite() {
        return Err(degenerate("non-finite angle"));
    }

    Ok(cot)
}

fn triangle_area(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}
