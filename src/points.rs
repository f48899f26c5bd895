//! Point arrays and the permutation that groups each box's points
//! contiguously (spec.md §3 "Point arrays").

use lin_alg::f64::Vec3;

/// A reorderable array of points (and, for sources, charges), plus the
/// permutation mapping the reordered slice back to the caller's original
/// indexing.
///
/// `permutation[i]` is the *original* index of the point now stored at
/// position `i`; un-permuting an output array therefore means writing
/// `out_orig[permutation[i]] = computed[i]`.
#[derive(Debug, Clone)]
pub struct PointSet {
    pub coords: Vec<Vec3>,
    pub charges: Option<Vec<f64>>,
    pub permutation: Vec<usize>,
}

impl PointSet {
    pub fn new(coords: Vec<Vec3>, charges: Option<Vec<f64>>) -> Self {
        let permutation = (0..coords.len()).collect();
        Self {
            coords,
            charges,
            permutation,
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Applies a permutation of the currently-stored order: `new[i] =
    /// old[order[i]]`. Composes with the existing `permutation` so that the
    /// mapping back to the caller's original order is always available.
    pub fn reorder(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.coords.len());

        let coords = order.iter().map(|&i| self.coords[i]).collect();
        let charges = self
            .charges
            .as_ref()
            .map(|c| order.iter().map(|&i| c[i]).collect());
        let permutation = order.iter().map(|&i| self.permutation[i]).collect();

        self.coords = coords;
        self.charges = charges;
        self.permutation = permutation;
    }

    /// Scatters `values` (in this `PointSet`'s current, permuted order) back
    /// into an array indexed by the caller's original ordering. `fill` seeds
    /// every slot before the scatter (every index is overwritten exactly
    /// once, since `permutation` is a bijection, but a concrete value is
    /// needed up front and not every `T` this is used with implements
    /// `Default`, e.g. `lin_alg::f64::Vec3`).
    pub fn unpermute<T: Copy>(&self, values: &[T], fill: T) -> Vec<T> {
        let mut out = vec![fill; values.len()];
        for (i, &orig) in self.permutation.iter().enumerate() {
            out[orig] = values[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_then_unpermute_round_trips() {
        let coords = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        let mut pts = PointSet::new(coords, Some(vec![10.0, 20.0, 30.0]));
        pts.reorder(&[2, 0, 1]);
        assert_eq!(pts.charges.as_ref().unwrap(), &[30.0, 10.0, 20.0]);

        let computed = vec![300.0, 100.0, 200.0]; // indexed in pts's current order
        let restored = pts.unpermute(&computed, 0.0);
        assert_eq!(restored, vec![100.0, 200.0, 300.0]);
    }
}
