//! utils for heatmesh tests and fuzzing
#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

use rand::{distr::Uniform, prelude::Distribution};
use rand_distr::Normal;
use std::ops::RangeInclusive;

pub type Vertex3 = [f64; 3];
pub type Triangle = [u32; 3];
pub type Mesh = (Vec<Vertex3>, Vec<Triangle>);

/// A single right triangle in the `xy`-plane with unit legs.
pub fn single_triangle() -> Mesh {
    (
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        vec![[0, 1, 2]],
    )
}

/// The unit square split along its diagonal `{0, 2}`.
pub fn two_triangles() -> Mesh {
    (
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
}

/// Three triangles sharing the edge `{0, 1}`, i.e. a non-manifold fin.
pub fn three_triangles_on_edge() -> Mesh {
    (
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.5, 1.0, 0.0],
            [0.5, -1.0, 0.0],
            [0.5, 0.0, 1.0],
        ],
        vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
    )
}

/// The regular octahedron with vertices on the coordinate axes, a closed mesh.
pub fn octahedron() -> Mesh {
    (
        vec![
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ],
        vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ],
    )
}

/// A triangulated `nx` by `ny` grid over the unit square.
///
/// If `jitter` is given, the height of each vertex is sampled from a [Normal] distribution with `σ = jitter`.
pub fn grid(nx: u32, ny: u32, jitter: Option<f64>) -> Mesh {
    let mut rng = rand::rng();
    let normal = Normal::new(0.0, jitter.unwrap_or(0.0)).unwrap();

    let mut vertices = Vec::with_capacity(((nx + 1) * (ny + 1)) as usize);
    for j in 0..=ny {
        for i in 0..=nx {
            let z = if jitter.is_some() {
                normal.sample(&mut rng)
            } else {
                0.0
            };
            vertices.push([i as f64 / nx as f64, j as f64 / ny as f64, z]);
        }
    }

    let mut triangles = Vec::with_capacity((2 * nx * ny) as usize);
    for j in 0..ny {
        for i in 0..nx {
            let v00 = j * (nx + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + nx + 1;
            let v11 = v01 + 1;
            triangles.push([v00, v10, v11]);
            triangles.push([v00, v11, v01]);
        }
    }

    (vertices, triangles)
}

/// Samples `n` field values from the [Uniform] distribution.
///
/// If no range is specified, `[0.0, 1.0]` is used.
pub fn sample_field(n: usize, range: Option<RangeInclusive<f64>>) -> Vec<f64> {
    let mut rng = rand::rng();
    let range = range.unwrap_or(0.0..=1.0);
    let uniform = Uniform::try_from(range).expect("Expected range with a greater start then end");

    let mut field: Vec<f64> = Vec::with_capacity(n);
    for _ in 0..n {
        field.push(uniform.sample(&mut rng));
    }

    field
}

/// One third of the area of every triangle, accumulated on its three vertices.
pub fn one_third_areas(vertices: &[Vertex3], triangles: &[Triangle]) -> Vec<f64> {
    let mut areas = vec![0.0; vertices.len()];

    for tri in triangles {
        let [a, b, c] = tri.map(|v| vertices[v as usize]);
        let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let cross = [
            ab[1] * ac[2] - ab[2] * ac[1],
            ab[2] * ac[0] - ab[0] * ac[2],
            ab[0] * ac[1] - ab[1] * ac[0],
        ];
        let area = 0.5 * (cross[0].powi(2) + cross[1].powi(2) + cross[2].powi(2)).sqrt();

        for v in tri {
            areas[*v as usize] += area / 3.0;
        }
    }

    areas
}
