// src/quantum/compiler.rs
//! Decomposition pre-pass for differentiation
//!
//! The parameter-shift rule applies to uncontrolled single-target rotations, phases,
//! Pauli exponentials and generalized rotations. The [`Compiler`] rewrites every other
//! parameterized gate into such gates without changing the unitary. Only gates that
//! depend on the requested variables are touched.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_4, PI};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompilerError;
use crate::objective::{Argument, ExpectationValue, Node, NodeId, Objective};
use crate::quantum::circuit::QCircuit;
use crate::quantum::gate::{Axis, Gate, GateKind, PowerBase};
use crate::quantum::pauli::PauliString;
use crate::quantum::variable::Variable;

/// Which decompositions the compiler applies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Split multi-target rotations and powers into one gate per target
    pub multitarget: bool,
    /// Expand Trotterized exponentials into Pauli exponentials
    pub trotterized: bool,
    /// Rewrite `H^t` as Y and Z rotations
    pub hadamard_power: bool,
    /// Rewrite `X^t`, `Y^t`, `Z^t` as rotations
    pub power: bool,
    /// Move controls off phase gates
    pub controlled_phase: bool,
    /// Remove controls from rotations and Pauli exponentials
    pub controlled_rotation: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            multitarget: true,
            trotterized: true,
            hadamard_power: true,
            power: true,
            controlled_phase: true,
            controlled_rotation: true,
        }
    }
}

impl CompilerOptions {
    /// Every decomposition disabled
    pub fn none() -> Self {
        CompilerOptions {
            multitarget: false,
            trotterized: false,
            hadamard_power: false,
            power: false,
            controlled_phase: false,
            controlled_rotation: false,
        }
    }

    pub fn all_enabled(&self) -> bool {
        *self == CompilerOptions::default()
    }
}

/// The decomposition pre-pass
#[derive(Clone, Copy, Debug, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Compiler { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile any node; with `variables == None` every parameterized gate is considered
    pub fn compile_node(&self, node: &Node, variables: Option<&[Variable]>) -> Result<Node, CompilerError> {
        let mut session = Session::new(self, variables);
        Ok(match node {
            Node::Objective(o) => Node::Objective(session.objective(o)?.0),
            Node::Expectation(e) => Node::Expectation(session.expectation(e)?),
            Node::Variable(v) => Node::Variable(v.clone()),
        })
    }

    pub fn compile_objective(&self, objective: &Objective, variables: Option<&[Variable]>) -> Result<Objective, CompilerError> {
        Ok(Session::new(self, variables).objective(objective)?.0)
    }

    pub fn compile_circuit(&self, circuit: &QCircuit, variables: Option<&[Variable]>) -> Result<QCircuit, CompilerError> {
        Ok(self.circuit(circuit, variables)?.unwrap_or_else(|| circuit.clone()))
    }

    /// Compiled circuit, or `None` when no gate needed rewriting
    fn circuit(&self, circuit: &QCircuit, variables: Option<&[Variable]>) -> Result<Option<QCircuit>, CompilerError> {
        let mut changed = false;
        let mut gates = Vec::with_capacity(circuit.gate_count());
        for gate in circuit.gates() {
            match self.gate(gate, variables)? {
                Some(replacement) => {
                    changed = true;
                    gates.extend(replacement.gates().iter().cloned());
                }
                None => gates.push(gate.clone()),
            }
        }
        Ok(changed.then(|| QCircuit::from_gates(gates)))
    }

    fn is_relevant(gate: &Gate, variables: Option<&[Variable]>) -> bool {
        if !gate.is_parameterized() {
            return false;
        }
        match variables {
            None => true,
            Some(vars) => {
                let own = gate.extract_variables();
                vars.iter().any(|v| own.contains(v))
            }
        }
    }

    /// Decompose one gate; `None` leaves it as is
    ///
    /// Emitted gates are compiled again until no rule applies.
    fn gate(&self, gate: &Gate, variables: Option<&[Variable]>) -> Result<Option<QCircuit>, CompilerError> {
        if !Self::is_relevant(gate, variables) {
            return Ok(None);
        }

        let rewritten = match self.rewrite(gate)? {
            Some(circuit) => circuit,
            None => {
                if gate.shift().is_none() && self.options.all_enabled() {
                    return Err(CompilerError::Unsupported(gate.to_string()));
                }
                return Ok(None);
            }
        };
        debug!(gate = %gate, gates = rewritten.gate_count(), "decomposed gate");

        // the emitted gates may need further decomposition
        Ok(Some(self.compile_circuit(&rewritten, variables)?))
    }

    fn rewrite(&self, gate: &Gate) -> Result<Option<QCircuit>, CompilerError> {
        let options = &self.options;
        let parameter = match gate.parameter() {
            Some(p) => p.clone(),
            None => return Ok(None),
        };
        let controls = gate.controls();

        match gate.kind() {
            GateKind::Rotation(_) | GateKind::Power(_) if options.multitarget && gate.targets().len() > 1 => {
                let split = gate
                    .targets()
                    .iter()
                    .map(|&t| Gate::new(gate.kind().clone(), vec![t], controls.to_vec(), Some(parameter.clone())))
                    .collect::<Result<QCircuit, _>>()?;
                Ok(Some(split))
            }
            GateKind::Trotterized { generator, steps } if options.trotterized => {
                let mut circuit = QCircuit::new();
                for _ in 0..*steps {
                    for (coefficient, pauli) in generator.terms() {
                        let angle = parameter.clone() * (*coefficient / *steps as f64);
                        if pauli.is_identity() {
                            // exp(-iθc/2) on the control subspace
                            circuit = circuit + controlled_global_phase(-(angle * 0.5), controls)?;
                        } else {
                            circuit.add_gate(Gate::exp_pauli(angle, pauli.clone())?.controlled_by(controls.iter().copied())?);
                        }
                    }
                }
                Ok(Some(circuit))
            }
            GateKind::Power(PowerBase::H) if options.hadamard_power && gate.targets().len() == 1 => {
                let target = gate.targets()[0];
                let circuit = Gate::ry(-FRAC_PI_4, target)
                    + Gate::rz(parameter.clone() * PI, target).controlled_by(controls.iter().copied())?
                    + Gate::ry(FRAC_PI_4, target)
                    + controlled_global_phase(parameter * (PI / 2.0), controls)?;
                Ok(Some(circuit))
            }
            GateKind::Power(base) if options.power && gate.targets().len() == 1 => {
                let axis = match base {
                    PowerBase::X => Axis::X,
                    PowerBase::Y => Axis::Y,
                    PowerBase::Z => Axis::Z,
                    PowerBase::H => return Ok(None),
                };
                let rotation = Gate::rotation(axis, parameter.clone() * PI, gate.targets().iter().copied())?
                    .controlled_by(controls.iter().copied())?;
                Ok(Some(rotation + controlled_global_phase(parameter * (PI / 2.0), controls)?))
            }
            GateKind::Phase if options.controlled_phase && gate.is_controlled() => {
                let target = gate.targets()[0];
                let circuit = controlled_global_phase(parameter.clone() * 0.5, controls)?
                    + Gate::rz(parameter, target).controlled_by(controls.iter().copied())?;
                Ok(Some(circuit))
            }
            GateKind::Rotation(axis) if options.controlled_rotation && gate.is_controlled() && gate.targets().len() == 1 => {
                let target = gate.targets()[0];
                if controls.len() > 1 {
                    let generator = PauliString::single(target, axis.pauli());
                    return Ok(Some(Gate::generalized_rotation(parameter, generator, controls.iter().copied())?.into()));
                }
                let control = controls[0];
                let circuit = match axis {
                    Axis::X => {
                        Gate::h(target)
                            + Gate::rz(parameter, target).controlled_by([control])?
                            + Gate::h(target)
                    }
                    Axis::Y | Axis::Z => {
                        let half = parameter * 0.5;
                        Gate::rotation(*axis, half.clone(), [target])?
                            + Gate::cnot(control, target)?
                            + Gate::rotation(*axis, -half, [target])?
                            + Gate::cnot(control, target)?
                    }
                };
                Ok(Some(circuit))
            }
            GateKind::ExpPauli(generator) if options.controlled_rotation && gate.is_controlled() => Ok(Some(
                Gate::generalized_rotation(parameter, generator.clone(), controls.iter().copied())?.into(),
            )),
            GateKind::GeneralizedRotation { generator, projector } if options.controlled_rotation && gate.is_controlled() => {
                let merged = projector.iter().chain(controls).copied();
                Ok(Some(Gate::generalized_rotation(parameter, generator.clone(), merged)?.into()))
            }
            _ => Ok(None),
        }
    }
}

/// `e^{i·angle}` on the subspace where every control is |1⟩; empty without controls
fn controlled_global_phase(angle: Objective, controls: &[usize]) -> Result<QCircuit, CompilerError> {
    match controls.split_last() {
        None => Ok(QCircuit::new()),
        Some((&last, rest)) => Ok(Gate::phase(angle, last).controlled_by(rest.iter().copied())?.into()),
    }
}

/// One compilation over an objective; shared expectation values compile once
struct Session<'a> {
    compiler: &'a Compiler,
    variables: Option<&'a [Variable]>,
    compiled: HashMap<NodeId, Arc<ExpectationValue>>,
}

impl<'a> Session<'a> {
    fn new(compiler: &'a Compiler, variables: Option<&'a [Variable]>) -> Self {
        Session {
            compiler,
            variables,
            compiled: HashMap::new(),
        }
    }

    fn expectation(&mut self, e: &Arc<ExpectationValue>) -> Result<Arc<ExpectationValue>, CompilerError> {
        if let Some(done) = self.compiled.get(&e.id()) {
            return Ok(Arc::clone(done));
        }
        let compiled = match self.compiler.circuit(e.unitary(), self.variables)? {
            Some(unitary) => Arc::new(e.with_unitary(unitary)),
            None => Arc::clone(e),
        };
        self.compiled.insert(e.id(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Compiled objective and whether anything changed
    fn objective(&mut self, objective: &Objective) -> Result<(Objective, bool), CompilerError> {
        let mut changed = false;
        let mut args = Vec::with_capacity(objective.args().len());
        for arg in objective.args() {
            let compiled = match arg {
                Argument::Variable(v) => Argument::Variable(v.clone()),
                Argument::Expectation(e) => {
                    let compiled = self.expectation(e)?;
                    changed |= !Arc::ptr_eq(&compiled, e);
                    Argument::Expectation(compiled)
                }
                Argument::Objective(inner) => {
                    let (compiled, inner_changed) = self.objective(inner)?;
                    if inner_changed {
                        changed = true;
                        Argument::Objective(Arc::new(compiled))
                    } else {
                        Argument::Objective(Arc::clone(inner))
                    }
                }
            };
            args.push(compiled);
        }
        if changed {
            Ok((objective.with_args(args), true))
        } else {
            Ok((objective.clone(), false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::pauli::Hamiltonian;

    fn a() -> Variable {
        Variable::new("a")
    }

    fn eligible(circuit: &QCircuit) -> bool {
        circuit
            .gates()
            .iter()
            .filter(|g| g.is_parameterized())
            .all(|g| g.shift().is_some())
    }

    #[test]
    fn test_full_compiler_makes_gates_eligible() {
        let gates = vec![
            Gate::rotation(Axis::X, a(), [0, 1]).unwrap(),
            Gate::power(PowerBase::H, a(), 0),
            Gate::power(PowerBase::Y, a(), 1).controlled_by([0]).unwrap(),
            Gate::phase(a(), 2).controlled_by([0, 1]).unwrap(),
            Gate::rx(a(), 2).controlled_by([0]).unwrap(),
            Gate::rz(a(), 2).controlled_by([0, 1]).unwrap(),
            Gate::trotterized(a(), Hamiltonian::z(0) + 0.5 * Hamiltonian::x(1) + Hamiltonian::unit(), 2).unwrap(),
        ];
        let compiler = Compiler::default();
        for gate in gates {
            let compiled = compiler.compile_circuit(&QCircuit::from(gate.clone()), None).unwrap();
            assert!(eligible(&compiled), "{} compiled to {}", gate, compiled);
            assert!(compiled.depends_on(&a()));
        }
    }

    #[test]
    fn test_only_listed_variables_are_touched() {
        let b = Variable::new("b");
        let circuit = Gate::rx(a(), 1).controlled_by([0]).unwrap() + Gate::ry(b.clone(), 1).controlled_by([0]).unwrap();
        let compiled = Compiler::default().compile_circuit(&circuit, Some(&[b][..])).unwrap();
        assert!(compiled.gates()[0].is_controlled());
        assert!(eligible(&QCircuit::from_gates(compiled.gates()[1..].iter().cloned())));
    }

    #[test]
    fn test_disabled_options_leave_gates() {
        let circuit = QCircuit::from(Gate::rx(a(), 1).controlled_by([0]).unwrap());
        let compiled = Compiler::new(CompilerOptions::none()).compile_circuit(&circuit, None).unwrap();
        assert_eq!(compiled.gate_count(), 1);
        assert!(compiled.gates()[0].is_controlled());
    }

    #[test]
    fn test_shared_expectation_compiles_once() {
        let e = Arc::new(ExpectationValue::new(
            QCircuit::from(Gate::ry(a(), 1).controlled_by([0]).unwrap()),
            Hamiltonian::z(1),
        ));
        let o = Objective::from(Arc::clone(&e)) + Objective::from(Arc::clone(&e)).sin();
        assert_eq!(o.count_expectation_values(), 1);
        let compiled = Compiler::default().compile_objective(&o, None).unwrap();
        assert_eq!(compiled.count_expectation_values(), 1);
    }

    #[test]
    fn test_untouched_expectation_keeps_identity() {
        let e = Arc::new(ExpectationValue::new(QCircuit::from(Gate::rx(a(), 0)), Hamiltonian::z(0)));
        let node = Compiler::default().compile_node(&Node::Expectation(Arc::clone(&e)), None).unwrap();
        match node {
            Node::Expectation(compiled) => assert_eq!(compiled.id(), e.id()),
            other => panic!("unexpected node {:?}", other),
        }
    }
}
