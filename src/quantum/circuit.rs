// src/quantum/circuit.rs
//! Parameterized circuits
//!
//! A [`QCircuit`] is an ordered gate sequence. Editing operations return new
//! circuits and leave the receiver untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display};
use std::ops::Add;

use crate::error::CircuitError;
use crate::quantum::gate::Gate;
use crate::quantum::variable::Variable;

/// A quantum circuit consisting of a sequence of gates
#[derive(Clone, Debug, Default)]
pub struct QCircuit {
    gates: Vec<Gate>,
}

impl QCircuit {
    /// Create a new empty circuit
    pub fn new() -> Self {
        QCircuit { gates: Vec::new() }
    }

    pub fn from_gates(gates: impl IntoIterator<Item = Gate>) -> Self {
        QCircuit {
            gates: gates.into_iter().collect(),
        }
    }

    pub fn add_gate(&mut self, gate: Gate) {
        self.gates.push(gate);
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Get the number of gates in the circuit
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Number of qubits spanned by the gates
    pub fn qubit_count(&self) -> usize {
        self.gates
            .iter()
            .flat_map(|g| g.qubits())
            .max()
            .map_or(0, |q| q + 1)
    }

    /// Every variable some gate parameter depends on
    pub fn extract_variables(&self) -> BTreeSet<Variable> {
        self.gates.iter().flat_map(|g| g.extract_variables()).collect()
    }

    pub fn depends_on(&self, variable: &Variable) -> bool {
        self.gates.iter().any(|g| g.extract_variables().contains(variable))
    }

    /// For each variable, the gates depending on it with their positions, in circuit order
    pub fn parameter_map(&self) -> BTreeMap<Variable, Vec<(usize, Gate)>> {
        let mut map: BTreeMap<Variable, Vec<(usize, Gate)>> = BTreeMap::new();
        for (position, gate) in self.gates.iter().enumerate() {
            for variable in gate.extract_variables() {
                map.entry(variable).or_default().push((position, gate.clone()));
            }
        }
        map
    }

    /// Replace the gate at each position with the gates of the matching circuit
    ///
    /// Positions refer to the receiver; the result may have a different length.
    pub fn replace_gates(&self, positions: &[usize], circuits: Vec<QCircuit>) -> Result<QCircuit, CircuitError> {
        if positions.len() != circuits.len() {
            return Err(CircuitError::ReplacementMismatch {
                positions: positions.len(),
                circuits: circuits.len(),
            });
        }

        let mut replacements = HashMap::with_capacity(positions.len());
        for (&position, circuit) in positions.iter().zip(circuits) {
            if position >= self.gates.len() {
                return Err(CircuitError::PositionOutOfRange {
                    position,
                    len: self.gates.len(),
                });
            }
            replacements.insert(position, circuit);
        }

        let mut gates = Vec::with_capacity(self.gates.len());
        for (position, gate) in self.gates.iter().enumerate() {
            match replacements.remove(&position) {
                Some(circuit) => gates.extend(circuit.gates),
                None => gates.push(gate.clone()),
            }
        }
        Ok(QCircuit { gates })
    }

    /// Replace a single gate by another gate
    pub fn replace_gate(&self, position: usize, gate: Gate) -> Result<QCircuit, CircuitError> {
        self.replace_gates(&[position], vec![QCircuit::from(gate)])
    }

    /// Structural check of every gate
    pub fn validate(&self) -> Result<(), CircuitError> {
        self.gates.iter().try_for_each(|g| g.check())
    }

    pub fn verify(&self) -> bool {
        self.validate().is_ok()
    }
}

impl From<Gate> for QCircuit {
    fn from(gate: Gate) -> Self {
        QCircuit { gates: vec![gate] }
    }
}

impl FromIterator<Gate> for QCircuit {
    fn from_iter<I: IntoIterator<Item = Gate>>(iter: I) -> Self {
        QCircuit::from_gates(iter)
    }
}

impl Add<Gate> for QCircuit {
    type Output = QCircuit;

    fn add(mut self, gate: Gate) -> QCircuit {
        self.gates.push(gate);
        self
    }
}

impl Add<QCircuit> for QCircuit {
    type Output = QCircuit;

    fn add(mut self, other: QCircuit) -> QCircuit {
        self.gates.extend(other.gates);
        self
    }
}

impl Add<Gate> for Gate {
    type Output = QCircuit;

    fn add(self, other: Gate) -> QCircuit {
        QCircuit::from_gates([self, other])
    }
}

impl Add<QCircuit> for Gate {
    type Output = QCircuit;

    fn add(self, other: QCircuit) -> QCircuit {
        QCircuit::from(self) + other
    }
}

impl Display for QCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gates: Vec<String> = self.gates.iter().map(|g| g.to_string()).collect();
        write!(f, "{}", gates.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::gate::GateKind;

    fn circuit() -> QCircuit {
        Gate::h(0) + Gate::rx(Variable::new("a"), 0) + Gate::ry(Variable::new("b"), 1) + Gate::rz(Variable::new("a"), 1)
    }

    #[test]
    fn test_parameter_map_positions() {
        let map = circuit().parameter_map();
        let a: Vec<usize> = map[&Variable::new("a")].iter().map(|(p, _)| *p).collect();
        let b: Vec<usize> = map[&Variable::new("b")].iter().map(|(p, _)| *p).collect();
        assert_eq!(a, vec![1, 3]);
        assert_eq!(b, vec![2]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_replace_gates_is_pure() {
        let original = circuit();
        let replaced = original
            .replace_gates(&[0, 2], vec![QCircuit::new(), Gate::x(0) + Gate::x(1)])
            .unwrap();
        assert_eq!(original.gate_count(), 4);
        assert_eq!(replaced.gate_count(), 4);
        assert!(matches!(replaced.gates()[0].kind(), GateKind::Rotation(_)));
        assert_eq!(replaced.extract_variables().len(), 1);
    }

    #[test]
    fn test_replace_gates_errors() {
        let c = circuit();
        assert!(matches!(
            c.replace_gates(&[7], vec![QCircuit::new()]),
            Err(CircuitError::PositionOutOfRange { position: 7, len: 4 })
        ));
        assert!(matches!(
            c.replace_gates(&[0, 1], vec![QCircuit::new()]),
            Err(CircuitError::ReplacementMismatch { .. })
        ));
    }

    #[test]
    fn test_qubit_count_and_verify() {
        let c = circuit() + Gate::cnot(0, 3).unwrap();
        assert_eq!(c.qubit_count(), 4);
        assert!(c.verify());
        assert_eq!(QCircuit::new().qubit_count(), 0);
    }
}
