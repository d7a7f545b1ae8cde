// Type aliases for data values.
pub type Vertex3 = [f64; 3];
pub type Triangle = [VertexIdx; 3];

// Type aliases for data indices.
pub type VertexIdx = u32;

// Type aliases for table keys.
// A directed edge `(u, v)` packed as `u << 32 | v`, so it can be hashed as a single integer.
pub type EdgeKey = u64;

/// Pack the directed edge `(u, v)`.
#[inline]
pub const fn edge_key(u: VertexIdx, v: VertexIdx) -> EdgeKey {
    ((u as u64) << 32) | v as u64
}

/// Pack the undirected edge `{u, v}`, i.e. the smaller index always comes first.
#[inline]
pub const fn undirected_key(u: VertexIdx, v: VertexIdx) -> EdgeKey {
    if u <= v {
        edge_key(u, v)
    } else {
        edge_key(v, u)
    }
}

/// Unpack an [`EdgeKey`] into its `(u, v)` pair.
#[inline]
pub const fn split_key(key: EdgeKey) -> (VertexIdx, VertexIdx) {
    ((key >> 32) as VertexIdx, key as VertexIdx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_packing() {
        let key = edge_key(7, u32::MAX);
        assert_eq!(split_key(key), (7, u32::MAX));
        assert_ne!(edge_key(1, 2), edge_key(2, 1));
        assert_eq!(undirected_key(1, 2), undirected_key(2, 1));
        assert_eq!(split_key(undirected_key(9, 3)), (3, 9));
    }
}
