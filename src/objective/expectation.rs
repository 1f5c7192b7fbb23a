//! Expectation-value leaves
//!
//! An [`ExpectationValue`] pairs a parameterized unitary with a fixed observable. Each
//! instance receives a [`NodeId`] at construction; clones and shared `Arc`s keep it, so
//! the id identifies the leaf wherever it appears in an objective DAG.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::quantum::circuit::QCircuit;
use crate::quantum::pauli::Hamiltonian;
use crate::quantum::variable::Variable;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of an expectation-value leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The expectation value `⟨0|U† H U|0⟩`
#[derive(Clone, Debug)]
pub struct ExpectationValue {
    id: NodeId,
    unitary: QCircuit,
    observable: Arc<Hamiltonian>,
}

impl ExpectationValue {
    pub fn new(unitary: QCircuit, observable: impl Into<Arc<Hamiltonian>>) -> Self {
        ExpectationValue {
            id: NodeId::fresh(),
            unitary,
            observable: observable.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The unitary `U`
    pub fn unitary(&self) -> &QCircuit {
        &self.unitary
    }

    /// The observable `H`
    pub fn observable(&self) -> &Arc<Hamiltonian> {
        &self.observable
    }

    /// Free variables; the observable is parameter free
    pub fn extract_variables(&self) -> BTreeSet<Variable> {
        self.unitary.extract_variables()
    }

    /// Same observable, different unitary, new identity
    pub fn with_unitary(&self, unitary: QCircuit) -> Self {
        ExpectationValue::new(unitary, Arc::clone(&self.observable))
    }
}

impl Display for ExpectationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E(U=[{}], H={})", self.unitary, self.observable)
    }
}
