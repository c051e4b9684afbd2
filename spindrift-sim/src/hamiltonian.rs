//! Hamiltonians as capabilities over the build pipeline.
//!
//! A Hamiltonian is anything that can scatter the contributions of
//! `c · H|σ〉` into a [`StateBuilder`]; the diffusion driver and the energy
//! estimator are polymorphic over the trait. [`Heisenberg`] is the one
//! implementation shipped here: a sum of edge couplings
//! `Σ J · (σᵢ·σⱼ)` specified as weighted adjacency lists.

use crate::error::Result;
use num_complex::Complex64;
use spindrift_state::{ShardedState, SpinKey, StateBuilder};

/// A pair of coupled lattice sites.
pub type Edge = (usize, usize);

/// Linear operator on sparse spin states.
pub trait Hamiltonian {
    /// Emits the contributions of `coeff · H|spin〉` into the sink.
    ///
    /// Pure with respect to its inputs apart from the sink side effects; no
    /// state is retained between calls.
    fn apply(&self, spin: &SpinKey, coeff: Complex64, sink: &mut StateBuilder<'_>);
}

/// One coupling constant together with the edges it acts on.
#[derive(Debug, Clone)]
pub struct Term {
    pub coupling: Complex64,
    pub edges: Vec<Edge>,
}

/// Heisenberg Hamiltonian as a list of weighted adjacency lists.
#[derive(Debug, Clone, Default)]
pub struct Heisenberg {
    terms: Vec<Term>,
}

impl Heisenberg {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    /// Single-coupling convenience constructor.
    pub fn with_edges(coupling: Complex64, edges: Vec<Edge>) -> Self {
        Self {
            terms: vec![Term { coupling, edges }],
        }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Total number of edges across all terms.
    pub fn num_edges(&self) -> usize {
        self.terms.iter().map(|term| term.edges.len()).sum()
    }
}

impl Hamiltonian for Heisenberg {
    fn apply(&self, spin: &SpinKey, coeff: Complex64, sink: &mut StateBuilder<'_>) {
        for term in &self.terms {
            for &(i, j) in &term.edges {
                let aligned = spin.get(i) == spin.get(j);
                let sign = if aligned { 1.0 } else { -1.0 };
                sink.add(sign * coeff * term.coupling, *spin);
                if !aligned {
                    sink.add(2.0 * coeff * term.coupling, spin.flipped(&[i, j]));
                }
            }
        }
    }
}

/// Computes `〈ψ|H|ψ〉`.
///
/// `H|ψ〉` is materialised into a scratch state with ψ's parameters through
/// the usual build pipeline, then contracted against ψ with the conjugated
/// inner product. For a real state the result is real up to floating-point
/// error.
pub fn energy<H>(hamiltonian: &H, psi: &ShardedState) -> Result<Complex64>
where
    H: Hamiltonian + ?Sized,
{
    let mut h_psi = ShardedState::new(psi.config().clone())?;
    {
        let mut builder = StateBuilder::new(&mut h_psi);
        builder.start();
        for (spin, coeff) in psi.iter() {
            hamiltonian.apply(spin, *coeff, &mut builder);
        }
        builder.stop();
    }

    let mut total = Complex64::new(0.0, 0.0);
    for (spin, coeff) in psi.iter() {
        if let Some(value) = h_psi.get(spin) {
            total += coeff.conj() * value;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spindrift_state::StateConfig;

    fn two_site_state(up_down: Complex64, down_up: Complex64) -> ShardedState {
        let mut state = ShardedState::new(StateConfig::new(100)).unwrap();
        state
            .try_insert(SpinKey::from_bits(&[0, 1]), down_up)
            .unwrap();
        state
            .try_insert(SpinKey::from_bits(&[1, 0]), up_down)
            .unwrap();
        state
    }

    #[test]
    fn test_apply_aligned_pair_is_diagonal() {
        let mut out = ShardedState::new(StateConfig::new(100)).unwrap();
        let spin = SpinKey::from_bits(&[1, 1]);
        let h = Heisenberg::with_edges(Complex64::new(1.0, 0.0), vec![(0, 1)]);
        {
            let mut builder = StateBuilder::new(&mut out);
            builder.start();
            h.apply(&spin, Complex64::new(2.0, 0.0), &mut builder);
            builder.stop();
        }
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.get(&spin).unwrap().re, 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_apply_anti_aligned_pair_scatters() {
        let mut out = ShardedState::new(StateConfig::new(100)).unwrap();
        let spin = SpinKey::from_bits(&[0, 1]);
        let h = Heisenberg::with_edges(Complex64::new(0.5, 0.0), vec![(0, 1)]);
        {
            let mut builder = StateBuilder::new(&mut out);
            builder.start();
            h.apply(&spin, Complex64::new(1.0, 0.0), &mut builder);
            builder.stop();
        }
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out.get(&spin).unwrap().re, -0.5, epsilon = 1e-15);
        let flipped = SpinKey::from_bits(&[1, 0]);
        assert_relative_eq!(out.get(&flipped).unwrap().re, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_empty_hamiltonian_emits_nothing() {
        let mut out = ShardedState::new(StateConfig::new(100)).unwrap();
        let h = Heisenberg::default();
        {
            let mut builder = StateBuilder::new(&mut out);
            builder.start();
            h.apply(
                &SpinKey::from_bits(&[0, 1, 0]),
                Complex64::new(1.0, 0.0),
                &mut builder,
            );
            builder.stop();
        }
        assert!(out.is_empty());
        assert_eq!(h.num_edges(), 0);
    }

    #[test]
    fn test_singlet_energy() {
        let inv_sqrt2 = 1.0 / 2.0_f64.sqrt();
        let psi = two_site_state(
            Complex64::new(-inv_sqrt2, 0.0),
            Complex64::new(inv_sqrt2, 0.0),
        );
        let h = Heisenberg::with_edges(Complex64::new(1.0, 0.0), vec![(0, 1)]);
        let e = energy(&h, &psi).unwrap();
        assert_relative_eq!(e.re, -3.0, epsilon = 1e-12);
        assert_relative_eq!(e.im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_triplet_energy() {
        let inv_sqrt2 = 1.0 / 2.0_f64.sqrt();
        let psi = two_site_state(
            Complex64::new(inv_sqrt2, 0.0),
            Complex64::new(inv_sqrt2, 0.0),
        );
        let h = Heisenberg::with_edges(Complex64::new(1.0, 0.0), vec![(0, 1)]);
        let e = energy(&h, &psi).unwrap();
        assert_relative_eq!(e.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(e.im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_energy_is_real_for_real_states() {
        let mut psi = ShardedState::new(StateConfig::new(100)).unwrap();
        psi.try_insert(SpinKey::from_bits(&[0, 1, 1, 0]), Complex64::new(0.3, 0.0))
            .unwrap();
        psi.try_insert(SpinKey::from_bits(&[1, 0, 1, 0]), Complex64::new(-0.9, 0.0))
            .unwrap();
        psi.try_insert(SpinKey::from_bits(&[1, 1, 0, 0]), Complex64::new(0.4, 0.0))
            .unwrap();
        psi.normalize().unwrap();
        let h = Heisenberg::new(vec![
            Term {
                coupling: Complex64::new(1.0, 0.0),
                edges: vec![(0, 1), (1, 2), (2, 3)],
            },
            Term {
                coupling: Complex64::new(-0.5, 0.0),
                edges: vec![(0, 3)],
            },
        ]);
        let e = energy(&h, &psi).unwrap();
        assert_relative_eq!(e.im, 0.0, epsilon = 1e-12);
    }
}
