use core::{mem, num::NonZeroUsize, ops::Range};

use anyhow::Result as HowResult;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

use crate::{
    error::MeshError,
    topology::Topology,
    utils::types::VertexIdx,
    weights::{CotanWeights, LumpedMass},
};

/// A fixed set of worker threads, each owning one contiguous range of vertices per tick.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with `workers` threads, or one thread per available core if `None`.
    pub fn new(workers: Option<usize>) -> HowResult<Self> {
        let workers = workers.unwrap_or_else(Self::available_workers).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("heatmesh-worker-{i}"))
            .build()?;

        Ok(Self { pool, workers })
    }

    /// The hardware parallelism, at least 1.
    pub fn available_workers() -> usize {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    pub const fn num_workers(&self) -> usize {
        self.workers
    }
}

/// Split `[0, n)` into `workers` contiguous ranges.
///
/// Every range has `n / workers` items, the last one also takes the remainder.
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = n / workers;

    (0..workers)
        .map(|w| {
            let start = w * chunk;
            let end = if w + 1 == workers { n } else { start + chunk };
            start..end
        })
        .collect()
}

/// The diffusion rate `L(v) / mass(v)` of a single vertex.
fn vertex_rate(
    old_field: &[f64],
    v: VertexIdx,
    topology: &Topology,
    weights: &CotanWeights,
    mass: &LumpedMass,
) -> Result<f64, MeshError> {
    let neighbors = topology.neighbors(v);
    if neighbors.is_empty() {
        return Ok(0.0);
    }

    let u_v = old_field[v as usize];
    let mut laplacian = 0.0;
    for &n in neighbors {
        let w = weights.get(v, n).ok_or_else(|| {
            MeshError::InvariantViolation(format!("no cotangent weight for edge ({v}, {n})"))
        })?;
        laplacian += w * (old_field[n as usize] - u_v);
    }

    match mass.get(v) {
        Some(m) if m > 0.0 => Ok(laplacian / m),
        Some(m) => Err(MeshError::InvariantViolation(format!(
            "non-positive mass {m} at vertex {v}"
        ))),
        None => Err(MeshError::InvariantViolation(format!(
            "no mass for vertex {v}"
        ))),
    }
}

/// Advance the vertices `[start, start + field_out.len())` by one explicit Euler step.
///
/// `field_out` and `rate_out` are the slices of the output buffers for exactly this range,
/// `old_field` is the full previous field.
///
/// ## Errors
/// Returns [`MeshError::InvariantViolation`] if `old_field` does not match the vertex count,
/// if the range exceeds it or the slices differ in length, or if the tables are missing a weight or a mass.
pub fn step_range(
    old_field: &[f64],
    field_out: &mut [f64],
    rate_out: Option<&mut [f64]>,
    start: usize,
    dt: f64,
    topology: &Topology,
    weights: &CotanWeights,
    mass: &LumpedMass,
) -> Result<(), MeshError> {
    let n = topology.vertex_count();
    let end = start.checked_add(field_out.len()).filter(|&end| end <= n);
    let rate_len = rate_out.as_deref().map_or(field_out.len(), <[f64]>::len);
    if old_field.len() != n || end.is_none() || rate_len != field_out.len() {
        return Err(MeshError::InvariantViolation(format!(
            "range of {} vertices from {start} with {rate_len} rates on a field of length {} for {n} vertices",
            field_out.len(),
            old_field.len()
        )));
    }

    let mut rate_out = rate_out;
    for (offset, out) in field_out.iter_mut().enumerate() {
        let v = start + offset;
        let rate = vertex_rate(old_field, v as VertexIdx, topology, weights, mass)?;
        *out = old_field[v] + dt * rate;
        if let Some(rate_out) = rate_out.as_deref_mut() {
            rate_out[offset] = rate;
        }
    }

    Ok(())
}

fn check_lengths(
    old_field: &[f64],
    field_out: &[f64],
    rate_out: Option<&[f64]>,
    topology: &Topology,
) -> Result<(), MeshError> {
    let n = topology.vertex_count();
    let rate_len = rate_out.map_or(n, <[f64]>::len);
    if old_field.len() != n || field_out.len() != n || rate_len != n {
        return Err(MeshError::InvariantViolation(format!(
            "field buffers of length {}, {} and {rate_len} for {n} vertices",
            old_field.len(),
            field_out.len()
        )));
    }

    Ok(())
}

/// Advance the whole field by one explicit Euler step on the calling thread.
///
/// `field_out[v] = old_field[v] + dt * L(v) / mass(v)` with `L(v) = Σ w(v, n) * (old_field[n] - old_field[v])`.
///
/// The step is only stable for small `dt`; a too large `dt` lets the field grow without bound.
///
/// ## Errors
/// Returns [`MeshError::InvariantViolation`] if a buffer does not match the vertex count,
/// or if the tables are missing a weight or a mass.
pub fn step(
    old_field: &[f64],
    field_out: &mut [f64],
    dt: f64,
    topology: &Topology,
    weights: &CotanWeights,
    mass: &LumpedMass,
) -> Result<(), MeshError> {
    check_lengths(old_field, field_out, None, topology)?;
    step_range(old_field, field_out, None, 0, dt, topology, weights, mass)
}

/// Same as [`step`], but the vertices are split by [`partition`] and stepped on the `pool`.
///
/// Each worker reads the shared `old_field` and writes only its own slice of `field_out` (and `rate_out`),
/// so no two workers ever touch the same output slot. Returns after all workers are done.
pub fn par_step(
    pool: &WorkerPool,
    old_field: &[f64],
    field_out: &mut [f64],
    rate_out: Option<&mut [f64]>,
    dt: f64,
    topology: &Topology,
    weights: &CotanWeights,
    mass: &LumpedMass,
) -> Result<(), MeshError> {
    check_lengths(old_field, field_out, rate_out.as_deref(), topology)?;

    let ranges = partition(field_out.len(), pool.num_workers());

    let mut tasks = Vec::with_capacity(ranges.len());
    let mut field_rest = field_out;
    let mut rate_rest = rate_out;
    for range in ranges {
        let (field_head, field_tail) = mem::take(&mut field_rest).split_at_mut(range.len());
        field_rest = field_tail;

        let rate_head = match rate_rest.take() {
            Some(rate) => {
                let (head, tail) = rate.split_at_mut(range.len());
                rate_rest = Some(tail);
                Some(head)
            }
            None => None,
        };

        tasks.push((range.start, field_head, rate_head));
    }

    pool.pool.install(|| {
        tasks
            .into_par_iter()
            .try_for_each(|(start, field_out, rate_out)| {
                step_range(
                    old_field, field_out, rate_out, start, dt, topology, weights, mass,
                )
            })
    })
}
