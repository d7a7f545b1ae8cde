#![no_main]

use heatmesh::{HeatSimulation, SimulationConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (Vec<[f64; 3]>, Vec<[u32; 3]>, f64)| {
    let (vertices, triangles, dt) = data;
    let field = vec![1.0; vertices.len()];
    let config = SimulationConfig::new().with_workers(1).with_rate_tracking(true);

    if let Ok(mut simulation) = HeatSimulation::new(&vertices, &triangles, field, config) {
        let _ = simulation.tick(dt);
        let _ = simulation.is_sound();
    }
});
