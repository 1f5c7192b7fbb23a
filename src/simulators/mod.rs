//! Quantum circuit simulators
//!
//! Evaluation backend for objectives and their derivatives. The gradient engine never
//! calls it; tests and callers do.

pub mod statevector;

pub use statevector::{simulate, simulate_derivative, StatevectorSimulator};
