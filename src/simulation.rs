use anyhow::{Ok as HowOk, Result as HowResult};

use crate::{
    field::FieldState,
    integrator::{par_step, WorkerPool},
    topology::{build_topology, Topology},
    utils::types::{Triangle, Vertex3},
    weights::{assemble_weights, CotanWeights, LumpedMass},
};

/// Settings of a [`HeatSimulation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of worker threads, one per available core if `None`.
    pub workers: Option<usize>,
    /// Keep the rate of change of the last tick, see [`HeatSimulation::rate`].
    pub track_rate: bool,
}

impl SimulationConfig {
    pub const fn new() -> Self {
        Self {
            workers: None,
            track_rate: false,
        }
    }

    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub const fn with_rate_tracking(mut self, track_rate: bool) -> Self {
        self.track_rate = track_rate;
        self
    }
}

/// Heat diffusion on a triangle mesh via the cotangent Laplacian and explicit Euler steps.
///
/// Topology, cotangent weights and lumped mass are computed once on construction and stay fixed;
/// every [`HeatSimulation::tick`] advances the field by `dt`.
///
/// ```
/// use heatmesh::{HeatSimulation, SimulationConfig};
///
/// let vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
/// let triangles: Vec<[u32; 3]> = vec![[0, 1, 3], [0, 3, 2]];
///
/// let mut simulation =
///     HeatSimulation::new(&vertices, &triangles, vec![1.0, 0.0, 0.0, 0.0], SimulationConfig::default()).unwrap();
/// let heat = simulation.total_heat();
///
/// simulation.run(10, 1e-3).unwrap();
///
/// assert!(simulation.field()[0] < 1.0);
/// assert!((simulation.total_heat() - heat).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct HeatSimulation {
    topology: Topology,
    weights: CotanWeights,
    mass: LumpedMass,
    state: FieldState,
    pool: WorkerPool,
    ticks: u64,

    #[cfg(feature = "timing")]
    time_topology: u128,
    #[cfg(feature = "timing")]
    time_assembly: u128,
    #[cfg(feature = "timing")]
    time_stepping: u128,
}

/// Create a new [`HeatSimulation`] from vertices, triangles and the initial field, returning a [`anyhow::Result`].
///
/// ## Example
/// ```
/// # use heatmesh::heat_simulation;
/// let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
/// let triangles: [[u32; 3]; 1] = [[0, 1, 2]];
///
/// let simulation = heat_simulation!(&vertices, &triangles, vec![1.0, 0.0, 0.0]).unwrap();
/// // with a fixed number of worker threads
/// let simulation = heat_simulation!(&vertices, &triangles, vec![1.0, 0.0, 0.0], workers = 2).unwrap();
/// assert_eq!(simulation.num_workers(), 2);
/// ```
#[macro_export]
macro_rules! heat_simulation {
    ($vertices:expr, $triangles:expr, $field:expr) => {{
        $crate::HeatSimulation::new(
            $vertices,
            $triangles,
            $field,
            $crate::SimulationConfig::default(),
        )
    }};
    ($vertices:expr, $triangles:expr, $field:expr, workers = $workers:expr) => {{
        $crate::HeatSimulation::new(
            $vertices,
            $triangles,
            $field,
            $crate::SimulationConfig::default().with_workers($workers),
        )
    }};
}

impl HeatSimulation {
    /// Build topology, weights and mass of the mesh, and start from `initial_field`.
    ///
    /// ## Errors
    /// Returns an error if `initial_field` does not have one value per vertex,
    /// if the mesh is rejected (the cause is a [`crate::MeshError`]), or if the worker threads cannot be spawned.
    pub fn new(
        vertices: &[Vertex3],
        triangles: &[Triangle],
        initial_field: Vec<f64>,
        config: SimulationConfig,
    ) -> HowResult<Self> {
        if initial_field.len() != vertices.len() {
            return Err(anyhow::Error::msg(format!(
                "Initial field has {} values for {} vertices",
                initial_field.len(),
                vertices.len()
            )));
        }

        #[cfg(feature = "timing")]
        let now = std::time::Instant::now();

        let topology = build_topology(triangles, vertices.len())?;

        #[cfg(feature = "timing")]
        let time_topology = now.elapsed().as_micros();
        #[cfg(feature = "timing")]
        let now = std::time::Instant::now();

        let (weights, mass) = assemble_weights(vertices, &topology)?;

        #[cfg(feature = "timing")]
        let time_assembly = now.elapsed().as_micros();

        let pool = WorkerPool::new(config.workers)?;

        #[cfg(feature = "logging")]
        log::debug!(
            "Simulating on {} with {} workers, surface area {}",
            topology,
            pool.num_workers(),
            mass.total()
        );

        HowOk(Self {
            topology,
            weights,
            mass,
            state: FieldState::new(initial_field, config.track_rate),
            pool,
            ticks: 0,
            #[cfg(feature = "timing")]
            time_topology,
            #[cfg(feature = "timing")]
            time_assembly,
            #[cfg(feature = "timing")]
            time_stepping: 0,
        })
    }

    /// Advance the field by one explicit Euler step of size `dt`.
    ///
    /// Stability is the caller's responsibility: `dt` has to stay below a bound given by the mesh resolution.
    /// On error the field is left as it was before the call.
    pub fn tick(&mut self, dt: f64) -> HowResult<()> {
        if !dt.is_finite() {
            return Err(anyhow::Error::msg(format!("Time step {dt} is not finite")));
        }

        #[cfg(feature = "timing")]
        let now = std::time::Instant::now();

        let (old_field, field_out, rate_out) = self.state.buffers();
        par_step(
            &self.pool,
            old_field,
            field_out,
            rate_out,
            dt,
            &self.topology,
            &self.weights,
            &self.mass,
        )?;
        self.state.publish();
        self.ticks += 1;

        #[cfg(feature = "timing")]
        {
            self.time_stepping += now.elapsed().as_micros();
        }

        HowOk(())
    }

    /// Run `steps` ticks of size `dt`.
    pub fn run(&mut self, steps: usize, dt: f64) -> HowResult<()> {
        for _ in 0..steps {
            self.tick(dt)?;
        }

        #[cfg(feature = "timing")]
        self.log_time();

        HowOk(())
    }

    /// The field after the last completed tick.
    pub fn field(&self) -> &[f64] {
        self.state.field()
    }

    /// A copy of the field, e.g. to hand it to a renderer while the simulation goes on.
    pub fn snapshot(&self) -> Vec<f64> {
        self.state.snapshot()
    }

    /// The rate of change `Δu / Δt` of the last tick, `None` unless enabled in the [`SimulationConfig`].
    pub fn rate(&self) -> Option<&[f64]> {
        self.state.rate()
    }

    /// Replace the field, e.g. to inject heat between ticks.
    pub fn set_field(&mut self, values: Vec<f64>) -> HowResult<()> {
        if values.len() != self.state.len() {
            return Err(anyhow::Error::msg(format!(
                "Field has {} values for {} vertices",
                values.len(),
                self.state.len()
            )));
        }

        self.state.replace(values);
        HowOk(())
    }

    /// The total heat `Σ mass(v) * field(v)`, which diffusion preserves.
    pub fn total_heat(&self) -> f64 {
        self.field()
            .iter()
            .zip(self.mass.as_slice())
            .map(|(u, m)| u * m)
            .sum()
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    pub const fn weights(&self) -> &CotanWeights {
        &self.weights
    }

    pub const fn mass(&self) -> &LumpedMass {
        &self.mass
    }

    pub const fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Check that the weights are symmetric and every non-isolated vertex has a positive mass.
    pub fn is_sound(&self) -> bool {
        let mut sound = true;

        #[allow(unused)]
        let mut check = |condition: bool, error_msg: &dyn Fn() -> String| {
            if !condition {
                #[cfg(feature = "logging")]
                log::error!("{}", error_msg());
                sound = false;
            }
        };

        for (u, v) in self.topology.edges() {
            let w_uv = self.weights.get(u, v);
            check(w_uv.is_some(), &|| format!("Missing weight for edge ({u}, {v})"));
            check(w_uv == self.weights.get(v, u), &|| {
                format!("Asymmetric weight for edge ({u}, {v})")
            });
        }

        for v in 0..self.topology.vertex_count() as u32 {
            if !self.topology.is_isolated(v) {
                check(self.mass.get(v).is_some_and(|m| m > 0.0), &|| {
                    format!("Non-positive mass at vertex {v}")
                });
            }
        }

        sound
    }

    #[cfg(feature = "timing")]
    fn log_time(&self) {
        #[cfg(feature = "logging")]
        {
            log::debug!("-------------------------------------------");
            log::debug!("Time elapsed:");
            log::debug!("Topology computed in {} μs", self.time_topology);
            log::debug!("Weights assembled in {} μs", self.time_assembly);
            log::debug!("{} ticks computed in {} μs", self.ticks, self.time_stepping);
        }
    }
}

impl core::fmt::Display for HeatSimulation {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "HeatSimulation with {} vertices and {} triangles after {} ticks",
            self.topology.vertex_count(),
            self.topology.num_triangles(),
            self.ticks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::striped, MeshError};
    use approx::assert_relative_eq;
    use heatmesh_test_utils::{grid, octahedron, sample_field, single_triangle, three_triangles_on_edge};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_single_triangle_end_to_end() {
        init_logger();
        let (vertices, triangles) = single_triangle();
        let config = SimulationConfig::new().with_rate_tracking(true);
        let mut simulation =
            HeatSimulation::new(&vertices, &triangles, vec![1.0, 0.0, 0.0], config).unwrap();

        let dt = 1e-3;
        simulation.tick(dt).unwrap();

        let field = simulation.field();
        assert_relative_eq!(field[0], 1.0 - 12.0 * dt, max_relative = 1e-5);
        assert_relative_eq!(field[1], 6.0 * dt, max_relative = 1e-5);
        assert_relative_eq!(field[2], 6.0 * dt, max_relative = 1e-5);

        let rate = simulation.rate().unwrap();
        assert_relative_eq!(rate[0], -12.0, max_relative = 1e-9);
        assert_eq!(simulation.ticks(), 1);
        assert!(simulation.is_sound());
    }

    #[test]
    fn test_diffusion_converges_to_mean() {
        init_logger();
        let (vertices, triangles) = octahedron();
        let initial = vec![6.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let mut simulation =
            heat_simulation!(&vertices, &triangles, initial, workers = 3).unwrap();
        let heat = simulation.total_heat();

        simulation.run(4000, 1e-3).unwrap();

        // all vertices have the same mass, so the equilibrium is the plain mean
        for &u in simulation.field() {
            assert_relative_eq!(u, 1.0, max_relative = 1e-3);
        }
        assert_relative_eq!(simulation.total_heat(), heat, max_relative = 1e-9);
    }

    #[test]
    fn test_worker_count_does_not_change_the_result() {
        init_logger();
        let (vertices, triangles) = grid(16, 16, Some(0.05));
        let initial = sample_field(vertices.len(), None);

        let mut results = Vec::new();
        for workers in [1, WorkerPool::available_workers()] {
            let config = SimulationConfig::new().with_workers(workers);
            let mut simulation =
                HeatSimulation::new(&vertices, &triangles, initial.clone(), config).unwrap();
            simulation.run(25, 1e-5).unwrap();
            results.push(simulation.field().iter().map(|u| u.to_bits()).collect::<Vec<_>>());
        }

        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_rejects_bad_input() {
        init_logger();
        let (vertices, triangles) = single_triangle();

        let wrong_length = HeatSimulation::new(&vertices, &triangles, vec![1.0], SimulationConfig::default());
        assert!(wrong_length.is_err());

        let (vertices, triangles) = three_triangles_on_edge();
        let non_manifold = HeatSimulation::new(
            &vertices,
            &triangles,
            vec![0.0; vertices.len()],
            SimulationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            non_manifold.downcast_ref::<MeshError>(),
            Some(MeshError::NonManifoldEdge { apex_count: 3, .. })
        ));

        let out_of_range = HeatSimulation::new(
            &vertices,
            &[[0, 1, 9]],
            vec![0.0; vertices.len()],
            SimulationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            out_of_range.downcast_ref::<MeshError>(),
            Some(MeshError::MalformedTopology(_))
        ));
    }

    #[test]
    fn test_failed_tick_keeps_field() {
        init_logger();
        let (vertices, triangles) = single_triangle();
        let mut simulation =
            heat_simulation!(&vertices, &triangles, vec![1.0, 0.0, 0.0]).unwrap();

        assert!(simulation.tick(f64::NAN).is_err());
        assert!(simulation.tick(f64::INFINITY).is_err());
        assert_eq!(simulation.field(), &[1.0, 0.0, 0.0]);
        assert_eq!(simulation.ticks(), 0);
    }

    #[test]
    fn test_striped_field_flattens() {
        init_logger();
        let (vertices, triangles) = grid(10, 10, None);
        let initial = striped(vertices.len(), 5, 10.0);
        let mut simulation = heat_simulation!(&vertices, &triangles, initial.clone()).unwrap();
        let spread = |field: &[f64]| {
            let (lo, hi) = field
                .iter()
                .fold((f64::MAX, f64::MIN), |(lo, hi), &u| (lo.min(u), hi.max(u)));
            hi - lo
        };

        let before = simulation.snapshot();
        simulation.run(100, 5e-5).unwrap();

        assert_eq!(before, initial);
        assert!(spread(simulation.field()) < spread(&initial));
        assert!(simulation.is_sound());
    }

    #[test]
    fn test_set_field() {
        init_logger();
        let (vertices, triangles) = single_triangle();
        let mut simulation =
            heat_simulation!(&vertices, &triangles, vec![1.0, 0.0, 0.0]).unwrap();

        simulation.set_field(vec![0.0, 3.0, 0.0]).unwrap();
        assert_eq!(simulation.field(), &[0.0, 3.0, 0.0]);
        assert!(simulation.set_field(vec![0.0; 5]).is_err());

        simulation.tick(1e-3).unwrap();
        assert!(simulation.field()[1] < 3.0);
        assert!(simulation.rate().is_none());
    }
}
