//! Power iteration with the diffusion operator (Λ − H).
//!
//! One step streams the current state through the Hamiltonian into a fresh
//! table, adds the Λ-scaled diagonal, then truncates and renormalises.
//! Repeating the step projects onto the eigenvector of H whose shifted
//! eigenvalue |Λ − E| is largest.

use crate::error::{Result, SimError};
use crate::hamiltonian::Hamiltonian;
use spindrift_state::{ShardedState, StateBuilder};
use std::time::{Duration, Instant};

/// Applies (Λ − H) once: builds `λ·ψ − H·ψ`, shrinks to the soft cap and
/// renormalises.
pub fn diffusion_step<H>(lambda: f64, hamiltonian: &H, psi: &ShardedState) -> Result<ShardedState>
where
    H: Hamiltonian + ?Sized,
{
    let mut next = ShardedState::new(psi.config().clone())?;
    {
        let mut builder = StateBuilder::new(&mut next);
        builder.start();
        for (spin, coeff) in psi.iter() {
            hamiltonian.apply(spin, -*coeff, &mut builder);
            builder.add(*coeff * lambda, *spin);
        }
        builder.stop();
    }
    next.shrink()?;
    next.normalize()?;
    Ok(next)
}

/// Runs [`diffusion_step`] `iterations` times.
///
/// The first step accepts an unnormalised input; every returned state has
/// unit norm. Progress is logged per step with an ETA derived from the
/// slowest step seen so far.
pub fn diffusion_loop<H>(
    lambda: f64,
    hamiltonian: &H,
    psi: ShardedState,
    iterations: usize,
) -> Result<ShardedState>
where
    H: Hamiltonian + ?Sized,
{
    if iterations == 0 {
        return Err(SimError::NoIterations);
    }

    let mut state = psi;
    let mut slowest = Duration::ZERO;
    for step in 1..=iterations {
        let started = Instant::now();
        state = diffusion_step(lambda, hamiltonian, &state)?;
        let elapsed = started.elapsed();
        if elapsed > slowest {
            slowest = elapsed;
        }
        let eta = slowest * (iterations - step) as u32;
        tracing::info!(
            step,
            total = iterations,
            entries = state.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            eta_s = eta.as_secs(),
            "applied diffusion operator"
        );
    }
    Ok(state)
}
