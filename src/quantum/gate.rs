// src/quantum/gate.rs
//! Quantum gates and their shift-rule metadata
//!
//! A [`Gate`] is an immutable value: a [`GateKind`], target and control qubits, and an
//! optional parameter. The parameter is an [`Objective`] over variables (a bare
//! variable, a constant, or arithmetic of variables). Gates whose expectation values
//! obey a parameter-shift rule expose it through [`Gate::shift`].

use std::collections::{BTreeSet, HashSet};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt::{self, Display};

use num_complex::Complex64;
use ndarray::{array, Array2};

use crate::error::CircuitError;
use crate::objective::Objective;
use crate::quantum::pauli::{Hamiltonian, Pauli, PauliString};
use crate::quantum::variable::Variable;

/// Common complex numbers used in quantum gates
pub mod constants {
    use num_complex::Complex64;

    /// The imaginary unit i
    pub const I: Complex64 = Complex64::new(0.0, 1.0);

    /// 1/sqrt(2)
    pub const FRAC_1_SQRT_2: f64 = 0.7071067811865475;
}

/// Rotation axis of a single-qubit rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// The Pauli generating rotations about this axis
    pub fn pauli(&self) -> Pauli {
        match self {
            Axis::X => Pauli::X,
            Axis::Y => Pauli::Y,
            Axis::Z => Pauli::Z,
        }
    }

    /// Matrix of `exp(-iθ/2 σ)`
    pub fn rotation_matrix(&self, theta: f64) -> Array2<Complex64> {
        let cos = (theta / 2.0).cos();
        let sin = (theta / 2.0).sin();
        match self {
            Axis::X => array![
                [Complex64::new(cos, 0.0), Complex64::new(0.0, -sin)],
                [Complex64::new(0.0, -sin), Complex64::new(cos, 0.0)]
            ],
            Axis::Y => array![
                [Complex64::new(cos, 0.0), Complex64::new(-sin, 0.0)],
                [Complex64::new(sin, 0.0), Complex64::new(cos, 0.0)]
            ],
            Axis::Z => {
                let phase_pos = Complex64::new(0.0, theta / 2.0).exp();
                let phase_neg = Complex64::new(0.0, -theta / 2.0).exp();
                array![
                    [phase_neg, Complex64::new(0.0, 0.0)],
                    [Complex64::new(0.0, 0.0), phase_pos]
                ]
            }
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pauli())
    }
}

/// Matrix of `diag(1, e^{iθ})`
pub fn phase_matrix(theta: f64) -> Array2<Complex64> {
    array![
        [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
        [Complex64::new(0.0, 0.0), Complex64::new(0.0, theta).exp()]
    ]
}

/// Involutory single-qubit gates that may be raised to a power
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerBase {
    X,
    Y,
    Z,
    H,
}

impl PowerBase {
    /// Matrix of the gate itself
    pub fn matrix(&self) -> Array2<Complex64> {
        use constants::FRAC_1_SQRT_2;
        match self {
            PowerBase::X => Pauli::X.matrix(),
            PowerBase::Y => Pauli::Y.matrix(),
            PowerBase::Z => Pauli::Z.matrix(),
            PowerBase::H => array![
                [Complex64::new(FRAC_1_SQRT_2, 0.0), Complex64::new(FRAC_1_SQRT_2, 0.0)],
                [Complex64::new(FRAC_1_SQRT_2, 0.0), Complex64::new(-FRAC_1_SQRT_2, 0.0)]
            ],
        }
    }

    /// Matrix of `B^t = e^{iπt/2} (cos(πt/2) I - i sin(πt/2) B)`
    pub fn power_matrix(&self, t: f64) -> Array2<Complex64> {
        use constants::I;
        let half = PI * t / 2.0;
        let global = Complex64::new(0.0, half).exp();
        let identity = Array2::<Complex64>::eye(2);
        let rotation = identity * Complex64::new(half.cos(), 0.0) - self.matrix() * (I * half.sin());
        rotation * global
    }
}

/// What a gate does; qubits and parameter live on [`Gate`]
#[derive(Clone, Debug, PartialEq)]
pub enum GateKind {
    /// X, Y, Z or H raised to the parameter (no parameter means exponent one)
    Power(PowerBase),
    /// `exp(-iθ/2 σ)` applied to every target
    Rotation(Axis),
    /// `diag(1, e^{iθ})`
    Phase,
    /// `exp(-iθ/2 P)` for a Pauli string `P`
    ExpPauli(PauliString),
    /// First-order Trotter product for `exp(-iθ/2 Σ c_k P_k)`
    Trotterized { generator: Hamiltonian, steps: usize },
    /// `exp(-iθ/2 Π⊗P)` with `Π` the projector onto `|1…1⟩` of `projector`
    GeneralizedRotation { generator: PauliString, projector: Vec<usize> },
}

/// Parameter-shift rule of a gate
#[derive(Clone, Debug)]
pub enum ShiftRule {
    /// `df/dθ = s·[f(θ + π/(4s)) − f(θ − π/(4s))]`
    Simple(f64),
    /// `df/dθ = Σ w·f(shifted gate)`
    Generalized(Vec<(f64, Gate)>),
}

/// Shifts of the four-term rule for generators with spectrum {-1, 0, 1}
pub const GENERALIZED_SHIFTS: [f64; 4] = [FRAC_PI_2, -FRAC_PI_2, 3.0 * FRAC_PI_2, -3.0 * FRAC_PI_2];

/// Weights matching [`GENERALIZED_SHIFTS`]
pub fn generalized_weights() -> [f64; 4] {
    let root = 32.0f64.sqrt();
    let c1 = (2.0f64.sqrt() + 1.0) / root;
    let c2 = (2.0f64.sqrt() - 1.0) / root;
    [c1, -c1, -c2, c2]
}

/// A gate placed on qubits
#[derive(Clone, Debug)]
pub struct Gate {
    kind: GateKind,
    targets: Vec<usize>,
    controls: Vec<usize>,
    parameter: Option<Objective>,
}

impl Gate {
    /// Create and validate a gate
    pub fn new(
        kind: GateKind,
        targets: Vec<usize>,
        controls: Vec<usize>,
        parameter: Option<Objective>,
    ) -> Result<Gate, CircuitError> {
        let gate = Gate {
            kind,
            targets,
            controls,
            parameter,
        };
        gate.check()?;
        Ok(gate)
    }

    /// Single-target gate without validation
    ///
    /// One target can never collide with itself, so only the parameter can be wrong.
    /// Parameters are checked by [`QCircuit::validate`](crate::quantum::QCircuit::validate),
    /// which runs before each expectation value is differentiated.
    fn single(kind: GateKind, target: usize, parameter: Option<Objective>) -> Gate {
        Gate {
            kind,
            targets: vec![target],
            controls: Vec::new(),
            parameter,
        }
    }

    pub fn rx(angle: impl Into<Objective>, target: usize) -> Gate {
        Gate::single(GateKind::Rotation(Axis::X), target, Some(angle.into()))
    }

    pub fn ry(angle: impl Into<Objective>, target: usize) -> Gate {
        Gate::single(GateKind::Rotation(Axis::Y), target, Some(angle.into()))
    }

    pub fn rz(angle: impl Into<Objective>, target: usize) -> Gate {
        Gate::single(GateKind::Rotation(Axis::Z), target, Some(angle.into()))
    }

    /// Rotation applied to several targets at once
    pub fn rotation(
        axis: Axis,
        angle: impl Into<Objective>,
        targets: impl IntoIterator<Item = usize>,
    ) -> Result<Gate, CircuitError> {
        Gate::new(
            GateKind::Rotation(axis),
            targets.into_iter().collect(),
            Vec::new(),
            Some(angle.into()),
        )
    }

    pub fn phase(angle: impl Into<Objective>, target: usize) -> Gate {
        Gate::single(GateKind::Phase, target, Some(angle.into()))
    }

    pub fn x(target: usize) -> Gate {
        Gate::single(GateKind::Power(PowerBase::X), target, None)
    }

    pub fn y(target: usize) -> Gate {
        Gate::single(GateKind::Power(PowerBase::Y), target, None)
    }

    pub fn z(target: usize) -> Gate {
        Gate::single(GateKind::Power(PowerBase::Z), target, None)
    }

    pub fn h(target: usize) -> Gate {
        Gate::single(GateKind::Power(PowerBase::H), target, None)
    }

    /// `base^exponent` on one qubit
    pub fn power(base: PowerBase, exponent: impl Into<Objective>, target: usize) -> Gate {
        Gate::single(GateKind::Power(base), target, Some(exponent.into()))
    }

    pub fn cnot(control: usize, target: usize) -> Result<Gate, CircuitError> {
        Gate::x(target).controlled_by([control])
    }

    pub fn exp_pauli(angle: impl Into<Objective>, generator: PauliString) -> Result<Gate, CircuitError> {
        let targets = generator.qubits();
        Gate::new(GateKind::ExpPauli(generator), targets, Vec::new(), Some(angle.into()))
    }

    pub fn trotterized(
        angle: impl Into<Objective>,
        generator: Hamiltonian,
        steps: usize,
    ) -> Result<Gate, CircuitError> {
        let targets: BTreeSet<usize> = generator.terms().iter().flat_map(|(_, p)| p.qubits()).collect();
        Gate::new(
            GateKind::Trotterized { generator, steps },
            targets.into_iter().collect(),
            Vec::new(),
            Some(angle.into()),
        )
    }

    pub fn generalized_rotation(
        angle: impl Into<Objective>,
        generator: PauliString,
        projector: impl IntoIterator<Item = usize>,
    ) -> Result<Gate, CircuitError> {
        let targets = generator.qubits();
        Gate::new(
            GateKind::GeneralizedRotation {
                generator,
                projector: projector.into_iter().collect(),
            },
            targets,
            Vec::new(),
            Some(angle.into()),
        )
    }

    /// The same gate with additional control qubits
    pub fn controlled_by(mut self, controls: impl IntoIterator<Item = usize>) -> Result<Gate, CircuitError> {
        self.controls.extend(controls);
        self.check()?;
        Ok(self)
    }

    /// The same gate with a different parameter; `self` is left untouched
    pub fn with_parameter(&self, parameter: Objective) -> Gate {
        Gate {
            kind: self.kind.clone(),
            targets: self.targets.clone(),
            controls: self.controls.clone(),
            parameter: Some(parameter),
        }
    }

    pub fn kind(&self) -> &GateKind {
        &self.kind
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn controls(&self) -> &[usize] {
        &self.controls
    }

    pub fn parameter(&self) -> Option<&Objective> {
        self.parameter.as_ref()
    }

    pub fn is_controlled(&self) -> bool {
        !self.controls.is_empty()
    }

    /// True if the parameter depends on at least one variable
    pub fn is_parameterized(&self) -> bool {
        self.parameter
            .as_ref()
            .map_or(false, |p| !p.extract_variables().is_empty())
    }

    pub fn extract_variables(&self) -> BTreeSet<Variable> {
        self.parameter
            .as_ref()
            .map(|p| p.extract_variables())
            .unwrap_or_default()
    }

    /// Every qubit the gate touches
    pub fn qubits(&self) -> Vec<usize> {
        let mut qubits: Vec<usize> = self.targets.iter().chain(&self.controls).copied().collect();
        if let GateKind::GeneralizedRotation { projector, .. } = &self.kind {
            qubits.extend(projector);
        }
        qubits
    }

    /// The parameter-shift rule, if the gate is eligible for one
    ///
    /// Controlled gates, multi-target rotations, power gates and Trotterized
    /// exponentials have none; the compiler must decompose them first.
    pub fn shift(&self) -> Option<ShiftRule> {
        if self.is_controlled() || self.parameter.is_none() {
            return None;
        }
        match &self.kind {
            GateKind::Rotation(_) if self.targets.len() == 1 => Some(ShiftRule::Simple(0.5)),
            GateKind::Phase | GateKind::ExpPauli(_) => Some(ShiftRule::Simple(0.5)),
            GateKind::GeneralizedRotation { .. } => self.shifted_gates().map(ShiftRule::Generalized),
            _ => None,
        }
    }

    /// Weighted shifted copies reconstructing the derivative, for gates with a
    /// generalized rule
    pub fn shifted_gates(&self) -> Option<Vec<(f64, Gate)>> {
        let parameter = self.parameter.as_ref()?;
        if !matches!(self.kind, GateKind::GeneralizedRotation { .. }) || self.is_controlled() {
            return None;
        }
        let shifted = GENERALIZED_SHIFTS
            .iter()
            .zip(generalized_weights())
            .map(|(shift, weight)| (weight, self.with_parameter(parameter.clone() + *shift)))
            .collect();
        Some(shifted)
    }

    /// Display name, with one `C` per control
    pub fn name(&self) -> String {
        let base = match &self.kind {
            GateKind::Power(base) => format!("{:?}", base),
            GateKind::Rotation(axis) => format!("R{}", axis.to_string().to_lowercase()),
            GateKind::Phase => "Phase".to_string(),
            GateKind::ExpPauli(p) => format!("Exp-Pauli[{}]", p),
            GateKind::Trotterized { steps, .. } => format!("Trotterized[{}]", steps),
            GateKind::GeneralizedRotation { generator, .. } => format!("GenRot[{}]", generator),
        };
        format!("{}{}", "C".repeat(self.controls.len()), base)
    }

    /// Structural validity: qubits, parameter presence, kind-specific shape
    pub fn check(&self) -> Result<(), CircuitError> {
        let name = self.name();
        if self.targets.is_empty() {
            return Err(CircuitError::NoTargets(name));
        }

        let mut seen = HashSet::new();
        for q in self.qubits() {
            if !seen.insert(q) {
                return Err(CircuitError::DuplicateQubit { gate: name, qubit: q });
            }
        }

        match &self.kind {
            GateKind::Power(_) => {}
            GateKind::Rotation(_) => {}
            GateKind::Phase => {
                if self.targets.len() != 1 {
                    return Err(CircuitError::invalid_qubit_count(name, 1, self.targets.len()));
                }
            }
            GateKind::ExpPauli(generator) | GateKind::GeneralizedRotation { generator, .. } => {
                let expected = generator.qubits();
                if generator.is_identity() || expected != self.targets {
                    return Err(CircuitError::invalid_qubit_count(name, expected.len(), self.targets.len()));
                }
            }
            GateKind::Trotterized { steps, .. } => {
                if *steps == 0 {
                    return Err(CircuitError::invalid_qubit_count(name, 1, 0));
                }
            }
        }

        match &self.parameter {
            None if !matches!(self.kind, GateKind::Power(_)) => Err(CircuitError::MissingParameter(name)),
            Some(p) if p.has_expectation_values() => Err(CircuitError::InvalidParameter(p.to_string())),
            _ => Ok(()),
        }
    }
}

impl Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(p) = &self.parameter {
            write!(f, "({})", p)?;
        }
        write!(f, " target={:?}", self.targets)?;
        if !self.controls.is_empty() {
            write!(f, " control={:?}", self.controls)?;
        }
        if let GateKind::GeneralizedRotation { projector, .. } = &self.kind {
            if !projector.is_empty() {
                write!(f, " projector={:?}", projector)?;
            }
        }
        Ok(())
    }
}
