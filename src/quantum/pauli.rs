//! Pauli strings and qubit Hamiltonians
//!
//! Observables of expectation values are real-weighted sums of Pauli strings. Pauli
//! strings also serve as generators of `ExpPauli`, `Trotterized` and
//! `GeneralizedRotation` gates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::ops::{Add, Mul, Neg};

use num_complex::Complex64;
use ndarray::{array, Array2};

/// Single-qubit Pauli operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pauli {
    X,
    Y,
    Z,
}

impl Pauli {
    /// 2x2 matrix of this operator
    pub fn matrix(&self) -> Array2<Complex64> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::new(0.0, 1.0);
        match self {
            Pauli::X => array![[zero, one], [one, zero]],
            Pauli::Y => array![[zero, -i], [i, zero]],
            Pauli::Z => array![[one, zero], [zero, -one]],
        }
    }

    /// Action on a computational basis bit: returns (flipped bit, phase)
    pub fn act(&self, bit: usize) -> (usize, Complex64) {
        match (self, bit) {
            (Pauli::X, b) => (b ^ 1, Complex64::new(1.0, 0.0)),
            (Pauli::Y, 0) => (1, Complex64::new(0.0, 1.0)),
            (Pauli::Y, _) => (0, Complex64::new(0.0, -1.0)),
            (Pauli::Z, 0) => (0, Complex64::new(1.0, 0.0)),
            (Pauli::Z, _) => (1, Complex64::new(-1.0, 0.0)),
        }
    }
}

impl Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pauli::X => write!(f, "X"),
            Pauli::Y => write!(f, "Y"),
            Pauli::Z => write!(f, "Z"),
        }
    }
}

/// Tensor product of Paulis on distinct qubits; the empty string is the identity
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PauliString {
    ops: BTreeMap<usize, Pauli>,
}

impl PauliString {
    /// The identity string
    pub fn identity() -> Self {
        PauliString::default()
    }

    /// A single Pauli on one qubit
    pub fn single(qubit: usize, pauli: Pauli) -> Self {
        let mut ops = BTreeMap::new();
        ops.insert(qubit, pauli);
        PauliString { ops }
    }

    /// Build from (qubit, Pauli) pairs; a later pair on the same qubit wins
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, Pauli)>) -> Self {
        PauliString {
            ops: pairs.into_iter().collect(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Qubits this string acts on non-trivially, in ascending order
    pub fn qubits(&self) -> Vec<usize> {
        self.ops.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Pauli)> + '_ {
        self.ops.iter().map(|(q, p)| (*q, *p))
    }

    /// Highest qubit index touched, if any
    pub fn max_qubit(&self) -> Option<usize> {
        self.ops.keys().next_back().copied()
    }
}

impl Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "I");
        }
        for (q, p) in &self.ops {
            write!(f, "{}({})", p, q)?;
        }
        Ok(())
    }
}

/// A Hermitian observable as a real-weighted sum of Pauli strings
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hamiltonian {
    terms: Vec<(f64, PauliString)>,
}

impl Hamiltonian {
    /// Build from weighted terms
    pub fn new(terms: impl IntoIterator<Item = (f64, PauliString)>) -> Self {
        Hamiltonian {
            terms: terms.into_iter().collect(),
        }
    }

    pub fn x(qubit: usize) -> Self {
        Self::new([(1.0, PauliString::single(qubit, Pauli::X))])
    }

    pub fn y(qubit: usize) -> Self {
        Self::new([(1.0, PauliString::single(qubit, Pauli::Y))])
    }

    pub fn z(qubit: usize) -> Self {
        Self::new([(1.0, PauliString::single(qubit, Pauli::Z))])
    }

    /// The identity observable
    pub fn unit() -> Self {
        Self::new([(1.0, PauliString::identity())])
    }

    pub fn terms(&self) -> &[(f64, PauliString)] {
        &self.terms
    }

    /// Number of qubits needed to measure this observable
    pub fn qubit_count(&self) -> usize {
        self.terms
            .iter()
            .filter_map(|(_, p)| p.max_qubit())
            .max()
            .map_or(0, |q| q + 1)
    }
}

impl Display for Hamiltonian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(c, p)| format!("{:+}{}", c, p))
            .collect();
        write!(f, "{}", parts.join(""))
    }
}

impl Add for Hamiltonian {
    type Output = Hamiltonian;

    fn add(mut self, other: Hamiltonian) -> Hamiltonian {
        self.terms.extend(other.terms);
        self
    }
}

impl Mul<Hamiltonian> for f64 {
    type Output = Hamiltonian;

    fn mul(self, h: Hamiltonian) -> Hamiltonian {
        Hamiltonian {
            terms: h.terms.into_iter().map(|(c, p)| (self * c, p)).collect(),
        }
    }
}

impl Neg for Hamiltonian {
    type Output = Hamiltonian;

    fn neg(self) -> Hamiltonian {
        -1.0 * self
    }
}
