//! Random nodes and Fourier coefficients shared by every plan of a pass.

use rand::distributions::Uniform;
use rand::Rng;
use rustfft::num_complex::Complex64;

use crate::error::FlagsError;

/// Input data for one measurement pass.
///
/// Owned here and only ever borrowed by plans, so every plan built for the
/// pass observes the same buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSet {
    dims: usize,
    nodes: Vec<f64>,
    coefficients: Vec<Complex64>,
}

impl InputSet {
    /// Draw `m_total` nodes in `[-0.5, 0.5)^dims` and `n_total` coefficients
    /// with real and imaginary parts in `[0, 1)`.
    ///
    /// Advances `rng`; successive calls draw successive streams.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        dims: usize,
        m_total: usize,
        n_total: usize,
    ) -> Result<Self, FlagsError> {
        if dims == 0 || m_total == 0 || n_total == 0 {
            return Err(FlagsError::invalid(format!(
                "input sizes must be positive (d = {}, M = {}, N_total = {})",
                dims, m_total, n_total
            )));
        }
        let len = m_total
            .checked_mul(dims)
            .ok_or_else(|| FlagsError::invalid("node count overflows usize"))?;
        let mut nodes = reserve(len, "node coordinates")?;
        let node_dist = Uniform::new(-0.5, 0.5);
        nodes.extend((0..len).map(|_| rng.sample(node_dist)));
        let mut coefficients = reserve(n_total, "coefficients")?;
        let coef_dist = Uniform::new(0.0, 1.0);
        coefficients.extend(
            (0..n_total).map(|_| Complex64::new(rng.sample(coef_dist), rng.sample(coef_dist))),
        );
        Ok(Self {
            dims,
            nodes,
            coefficients,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len() / self.dims
    }

    /// Node coordinates, `dims` consecutive values per node.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Coordinates of node `j`.
    pub fn node(&self, j: usize) -> &[f64] {
        &self.nodes[j * self.dims..(j + 1) * self.dims]
    }

    /// Coefficients in row-major order over `[-N/2, N/2)^d`.
    pub fn coefficients(&self) -> &[Complex64] {
        &self.coefficients
    }
}

fn reserve<T>(len: usize, what: &str) -> Result<Vec<T>, FlagsError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|err| {
        FlagsError::invalid(format!("cannot hold {} {}: {}", len, what, err))
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draws_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = InputSet::generate(&mut rng, 2, 64, 16).unwrap();
        assert_eq!(input.nodes().len(), 128);
        assert_eq!(input.node_count(), 64);
        assert_eq!(input.coefficients().len(), 16);
        assert!(input.nodes().iter().all(|&x| (-0.5..0.5).contains(&x)));
        assert!(input
            .coefficients()
            .iter()
            .all(|c| (0.0..1.0).contains(&c.re) && (0.0..1.0).contains(&c.im)));
    }

    #[test]
    fn successive_draws_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = InputSet::generate(&mut rng, 1, 8, 8).unwrap();
        let b = InputSet::generate(&mut rng, 1, 8, 8).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn same_seed_reproduces_stream() {
        let a = InputSet::generate(&mut StdRng::seed_from_u64(3), 3, 8, 27).unwrap();
        let b = InputSet::generate(&mut StdRng::seed_from_u64(3), 3, 8, 27).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_sizes() {
        let mut rng = StdRng::seed_from_u64(0);
        for (d, m, n) in [(0, 4, 4), (1, 0, 4), (1, 4, 0)] {
            assert!(matches!(
                InputSet::generate(&mut rng, d, m, n),
                Err(FlagsError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn node_slices_follow_layout() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = InputSet::generate(&mut rng, 2, 3, 4).unwrap();
        assert_eq!(input.node(1), &input.nodes()[2..4]);
        assert_eq!(input.node(2).len(), 2);
    }

    #[test]
    fn unrepresentable_size_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            InputSet::generate(&mut rng, 1, 4, usize::MAX / 2),
            Err(FlagsError::InvalidConfiguration(_))
        ));
    }
}
