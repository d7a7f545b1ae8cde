#![no_main]

use heatmesh::{assemble_weights, build_topology};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (Vec<[f64; 3]>, Vec<[u32; 3]>)| {
    let (vertices, triangles) = data;

    if let Ok(topology) = build_topology(&triangles, vertices.len()) {
        let _ = assemble_weights(&vertices, &topology);
    }
});
