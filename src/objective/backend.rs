//! Automatic-differentiation backends for objective transformations
//!
//! The gradient engine needs `∂T/∂x_i` for the transformation `T` of every compound
//! objective. Two interchangeable backends provide it:
//!
//! * [`SymbolicBackend`] builds the derivative graph up front (delayed graph).
//! * [`DualBackend`] defers the derivative into a `Partial` node that is traced with
//!   dual numbers whenever the objective is evaluated.
//!
//! The engine receives the backend through its configuration and never falls back to
//! a default on its own.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::transform::{Expr, Transformation};

/// Computes partial derivatives of transformations
pub trait DifferentiationBackend: Debug + Send + Sync {
    /// The transformation `∂f/∂x_index`
    fn partial(&self, f: &Transformation, index: usize) -> Transformation;

    /// Which backend this is
    fn kind(&self) -> BackendKind;
}

/// Selects a backend in configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Symbolic,
    Dual,
}

impl BackendKind {
    /// The backend instance for this kind
    pub fn backend(&self) -> &'static dyn DifferentiationBackend {
        match self {
            BackendKind::Symbolic => &SymbolicBackend,
            BackendKind::Dual => &DualBackend,
        }
    }
}

/// Delayed-graph backend: symbolic differentiation of the expression graph
#[derive(Clone, Copy, Debug, Default)]
pub struct SymbolicBackend;

impl DifferentiationBackend for SymbolicBackend {
    fn partial(&self, f: &Transformation, index: usize) -> Transformation {
        Arc::new(f.derivative(index))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Symbolic
    }
}

/// Trace-based backend: forward-mode dual numbers at evaluation time
#[derive(Clone, Copy, Debug, Default)]
pub struct DualBackend;

impl DifferentiationBackend for DualBackend {
    fn partial(&self, f: &Transformation, index: usize) -> Transformation {
        if !f.depends_on(index) {
            return Arc::new(Expr::Const(0.0));
        }
        if let Expr::Input(i) = f.as_ref() {
            if *i == index {
                return Arc::new(Expr::Const(1.0));
            }
        }
        Arc::new(Expr::Partial {
            body: Arc::clone(f),
            index,
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Dual
    }
}
