//! Objectives built from expectation values
//!
//! This module holds the expression DAG the gradient engine differentiates: the
//! expectation-value leaves, the objectives combining them, and the
//! automatic-differentiation backends for the combining transformations.

pub mod backend;
pub mod expectation;
pub mod graph;
pub mod transform;

pub use backend::{BackendKind, DifferentiationBackend, DualBackend, SymbolicBackend};
pub use expectation::{ExpectationValue, NodeId};
pub use graph::{Argument, Derivative, Node, Objective};
pub use transform::{Dual, Expr, Real, Transformation, UnaryFn};
