//! Diffusion-operator power iteration for Heisenberg spin systems.
//!
//! Given an initial sparse state |ψ₀〉, a Heisenberg Hamiltonian H as
//! weighted adjacency lists, a shift Λ and an iteration count n, this crate
//! computes (Λ − H)ⁿ|ψ₀〉, truncating and renormalising after every
//! application so the working set stays bounded. For large enough n the
//! result approximates the eigenvector of H whose shifted eigenvalue
//! |Λ − E| dominates — with a suitable Λ, the ground state.
//!
//! The storage and concurrency machinery lives in `spindrift-state`; this
//! crate adds the operator ([`Heisenberg`]), the driver
//! ([`diffusion_loop`]), the energy estimator ([`energy`]) and the text
//! formats ([`io`]).

pub mod diffusion;
pub mod error;
pub mod hamiltonian;
pub mod io;

pub use diffusion::{diffusion_loop, diffusion_step};
pub use error::{Result, SimError};
pub use hamiltonian::{energy, Edge, Hamiltonian, Heisenberg, Term};
pub use io::{read_hamiltonian, read_state, write_state};
