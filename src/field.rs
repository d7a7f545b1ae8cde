use core::mem;

/// A published buffer and a scratch buffer of equal length.
#[derive(Debug, Clone, Default)]
struct DoubleBuffer {
    front: Vec<f64>,
    back: Vec<f64>,
}

impl DoubleBuffer {
    fn new(front: Vec<f64>) -> Self {
        let back = vec![0.0; front.len()];
        Self { front, back }
    }

    fn split(&mut self) -> (&[f64], &mut [f64]) {
        (&self.front, &mut self.back)
    }

    fn swap(&mut self) {
        mem::swap(&mut self.front, &mut self.back);
    }
}

/// Banded initial field: vertex `i` is `hot` if `(i / 2) % period == 0`, otherwise `0`.
pub fn striped(vertex_count: usize, period: usize, hot: f64) -> Vec<f64> {
    let period = period.max(1);
    (0..vertex_count)
        .map(|i| if (i / 2) % period == 0 { hot } else { 0.0 })
        .collect()
}

/// The per-vertex scalar state carried from tick to tick.
///
/// Every array is double buffered: a step reads the published `front` and writes the `back`,
/// and only a completed step swaps the two.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    field: DoubleBuffer,
    /// The rate of change `Δu / Δt` of the last completed tick, if tracked.
    rate: Option<DoubleBuffer>,
}

impl FieldState {
    pub fn new(initial: Vec<f64>, track_rate: bool) -> Self {
        let rate = track_rate.then(|| DoubleBuffer::new(vec![0.0; initial.len()]));
        Self {
            field: DoubleBuffer::new(initial),
            rate,
        }
    }

    pub fn len(&self) -> usize {
        self.field.front.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.front.is_empty()
    }

    /// The current field.
    pub fn field(&self) -> &[f64] {
        &self.field.front
    }

    /// The rate of change of the last tick, `None` if not tracked.
    pub fn rate(&self) -> Option<&[f64]> {
        self.rate.as_ref().map(|rate| rate.front.as_slice())
    }

    pub const fn tracks_rate(&self) -> bool {
        self.rate.is_some()
    }

    /// A deep copy of the current field.
    pub fn snapshot(&self) -> Vec<f64> {
        self.field.front.clone()
    }

    /// Replace the current field; the rate is reset to zero.
    ///
    /// The length is not checked here, [`crate::HeatSimulation::set_field`] does that.
    pub(crate) fn replace(&mut self, values: Vec<f64>) {
        let track_rate = self.tracks_rate();
        *self = Self::new(values, track_rate);
    }

    /// The buffers of a step: the current field to read, and the output buffers of the field and the rate.
    pub(crate) fn buffers(&mut self) -> (&[f64], &mut [f64], Option<&mut [f64]>) {
        let (old, out) = self.field.split();
        let rate_out = self.rate.as_mut().map(|rate| rate.split().1);
        (old, out, rate_out)
    }

    /// Publish the output buffers written since the last [`Self::buffers`] call.
    pub(crate) fn publish(&mut self) {
        self.field.swap();
        if let Some(rate) = &mut self.rate {
            rate.swap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_swaps_buffers() {
        let mut state = FieldState::new(vec![1.0, 2.0, 3.0], true);
        assert_eq!(state.rate(), Some(&[0.0, 0.0, 0.0][..]));

        {
            let (old, out, rate) = state.buffers();
            assert_eq!(old, &[1.0, 2.0, 3.0]);
            out.copy_from_slice(&[4.0, 5.0, 6.0]);
            rate.unwrap().copy_from_slice(&[3.0, 3.0, 3.0]);
        }
        // nothing is visible before publishing
        assert_eq!(state.field(), &[1.0, 2.0, 3.0]);

        state.publish();
        assert_eq!(state.field(), &[4.0, 5.0, 6.0]);
        assert_eq!(state.rate(), Some(&[3.0, 3.0, 3.0][..]));
        assert_eq!(state.snapshot(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_untracked_rate() {
        let mut state = FieldState::new(vec![0.5; 4], false);
        assert!(!state.tracks_rate());
        assert!(state.rate().is_none());
        assert!(state.buffers().2.is_none());
    }

    #[test]
    fn test_striped() {
        assert_eq!(
            striped(8, 2, 10.0),
            vec![10.0, 10.0, 0.0, 0.0, 10.0, 10.0, 0.0, 0.0]
        );
        assert_eq!(striped(3, 0, 1.0), vec![1.0, 1.0, 1.0]);
        assert!(striped(0, 50, 1.0).is_empty());
    }
}
