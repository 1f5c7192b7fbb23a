// src/quantum/mod.rs
//! Circuits, gates, observables and their differentiation
//!
//! This module holds the parameterized circuit model, the decomposition pre-pass that
//! makes circuits differentiable, the parameter-shift gradient engine, and the
//! statevector the simulator runs on.

pub mod variable;
pub mod pauli;
pub mod gate;
pub mod circuit;
pub mod state;
pub mod compiler;
pub mod differentiation;

pub use variable::Variable;
pub use pauli::{Hamiltonian, Pauli, PauliString};
pub use gate::{Axis, Gate, GateKind, PowerBase, ShiftRule};
pub use circuit::QCircuit;
pub use state::StateVector;
pub use compiler::{Compiler, CompilerOptions};
pub use differentiation::{grad, grad_all, Gradient, GradientEngine, GradientPass};

/// Re-export commonly used types
pub mod prelude {
    pub use super::{Axis, Compiler, Gate, GateKind, PowerBase, QCircuit};
    pub use super::{Hamiltonian, Pauli, PauliString, Variable};
    pub use super::{grad, grad_all, Gradient, GradientEngine};
}
