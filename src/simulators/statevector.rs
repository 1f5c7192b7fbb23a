//! Statevector simulation of objectives
//!
//! Evaluates objectives, expectation values and derivatives for a fixed assignment of
//! variables. Every expectation value runs its circuit from `|0…0⟩`; a value shared by
//! several arguments is computed once per simulator.

use std::collections::HashMap;

use num_complex::Complex64;

use crate::error::SimulationError;
use crate::objective::{Argument, Derivative, ExpectationValue, Node, NodeId, Objective};
use crate::quantum::circuit::QCircuit;
use crate::quantum::gate::{phase_matrix, Gate, GateKind};
use crate::quantum::state::StateVector;
use crate::quantum::variable::Variable;

/// A statevector simulator bound to one variable assignment
#[derive(Clone, Debug, Default)]
pub struct StatevectorSimulator {
    variables: HashMap<Variable, f64>,
    cache: HashMap<NodeId, f64>,
}

impl StatevectorSimulator {
    pub fn new(variables: HashMap<Variable, f64>) -> Self {
        StatevectorSimulator {
            variables,
            cache: HashMap::new(),
        }
    }

    pub fn variables(&self) -> &HashMap<Variable, f64> {
        &self.variables
    }

    fn variable(&self, v: &Variable) -> Result<f64, SimulationError> {
        self.variables
            .get(v)
            .copied()
            .ok_or_else(|| SimulationError::UnassignedVariable(v.clone()))
    }

    /// Value of any node
    pub fn node(&mut self, node: &Node) -> Result<f64, SimulationError> {
        match node {
            Node::Objective(o) => self.objective(o),
            Node::Expectation(e) => self.expectation_value(e),
            Node::Variable(v) => self.variable(v),
        }
    }

    pub fn derivative(&mut self, derivative: &Derivative) -> Result<f64, SimulationError> {
        match derivative {
            Derivative::Constant(c) => Ok(*c),
            Derivative::Objective(o) => self.objective(o),
        }
    }

    pub fn objective(&mut self, objective: &Objective) -> Result<f64, SimulationError> {
        let mut values = Vec::with_capacity(objective.args().len());
        for arg in objective.args() {
            let value = match arg {
                Argument::Variable(v) => self.variable(v)?,
                Argument::Expectation(e) => self.expectation_value(e)?,
                Argument::Objective(o) => self.objective(o)?,
            };
            values.push(value);
        }

        let value = match objective.transformation() {
            Some(t) => t.eval(values.as_slice())?,
            None => values
                .first()
                .copied()
                .ok_or(SimulationError::MissingArgument { index: 0, len: 0 })?,
        };
        if !value.is_finite() {
            return Err(SimulationError::NonFinite(objective.to_string()));
        }
        Ok(value)
    }

    /// ⟨0|U† H U|0⟩, cached by node id
    pub fn expectation_value(&mut self, e: &ExpectationValue) -> Result<f64, SimulationError> {
        if let Some(value) = self.cache.get(&e.id()) {
            return Ok(*value);
        }
        let qubit_count = e.unitary().qubit_count().max(e.observable().qubit_count());
        let state = self.run_circuit(e.unitary(), qubit_count)?;
        let value = state.expectation(e.observable())?;
        self.cache.insert(e.id(), value);
        Ok(value)
    }

    /// The state `U|0…0⟩` on `qubit_count` qubits
    pub fn run_circuit(&mut self, circuit: &QCircuit, qubit_count: usize) -> Result<StateVector, SimulationError> {
        let mut state = StateVector::zero_state(qubit_count);
        for gate in circuit.gates() {
            self.apply_gate(&mut state, gate)?;
        }
        Ok(state)
    }

    fn parameter_value(&mut self, gate: &Gate) -> Result<Option<f64>, SimulationError> {
        gate.parameter().map(|p| self.objective(p)).transpose()
    }

    pub fn apply_gate(&mut self, state: &mut StateVector, gate: &Gate) -> Result<(), SimulationError> {
        let parameter = self.parameter_value(gate)?;
        let controls = gate.controls();
        let theta = parameter.unwrap_or(1.0);

        match gate.kind() {
            GateKind::Power(base) => {
                let matrix = match parameter {
                    Some(t) => base.power_matrix(t),
                    None => base.matrix(),
                };
                for &target in gate.targets() {
                    state.apply_single(&matrix, target, controls)?;
                }
            }
            GateKind::Rotation(axis) => {
                let matrix = axis.rotation_matrix(theta);
                for &target in gate.targets() {
                    state.apply_single(&matrix, target, controls)?;
                }
            }
            GateKind::Phase => {
                let matrix = phase_matrix(theta);
                for &target in gate.targets() {
                    state.apply_single(&matrix, target, controls)?;
                }
            }
            GateKind::ExpPauli(generator) => {
                state.apply_pauli_rotation(theta, generator, controls)?;
            }
            GateKind::Trotterized { generator, steps } => {
                let step = theta / *steps as f64;
                for _ in 0..*steps {
                    for (coefficient, pauli) in generator.terms() {
                        let angle = step * coefficient;
                        if pauli.is_identity() {
                            state.apply_phase(Complex64::new(0.0, -angle / 2.0).exp(), controls)?;
                        } else {
                            state.apply_pauli_rotation(angle, pauli, controls)?;
                        }
                    }
                }
            }
            GateKind::GeneralizedRotation { generator, projector } => {
                let conditions: Vec<usize> = controls.iter().chain(projector).copied().collect();
                state.apply_pauli_rotation(theta, generator, &conditions)?;
            }
        }
        Ok(())
    }
}

/// Evaluate a node for one variable assignment
pub fn simulate(node: impl Into<Node>, variables: &HashMap<Variable, f64>) -> Result<f64, SimulationError> {
    StatevectorSimulator::new(variables.clone()).node(&node.into())
}

/// Evaluate a derivative for one variable assignment
pub fn simulate_derivative(derivative: &Derivative, variables: &HashMap<Variable, f64>) -> Result<f64, SimulationError> {
    StatevectorSimulator::new(variables.clone()).derivative(derivative)
}
