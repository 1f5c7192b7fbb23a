//! Parameter-shift gradients of quantum objectives
//!
//! This crate computes analytic gradients of parameterized expectation values with
//! respect to named variables. Expectation values combine into objectives through
//! differentiable transformations, and the gradient of an objective is itself an
//! objective: it can be simulated, composed further, or differentiated again.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use shiftgrad::prelude::*;
//!
//! let a = Variable::new("a");
//! let e = Objective::expectation_value(QCircuit::from(Gate::rx(&a, 0)), Hamiltonian::z(0));
//! let d = grad(&e, &a).unwrap();
//! let value = simulate_derivative(&d, &HashMap::from([(a, 0.5)])).unwrap();
//! assert!((value + 0.5f64.sin()).abs() < 1e-10);
//! ```

pub mod error;
pub mod config;
pub mod objective;
pub mod quantum;
pub mod simulators;

pub use config::GradientConfig;
pub use error::{CircuitError, CompilerContractViolation, CompilerError, GradientError, Result, SimulationError};

// Create a prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CompilerOptions, GradientConfig};
    pub use crate::objective::{BackendKind, Derivative, ExpectationValue, Node, Objective};
    pub use crate::quantum::prelude::*;
    pub use crate::simulators::{simulate, simulate_derivative, StatevectorSimulator};
}

// Version and crate information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
