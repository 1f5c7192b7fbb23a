// src/quantum/state.rs
//! Statevector representation
//!
//! Qubit 0 is the most significant bit of a basis index, so `|q0 q1 … q_{n-1}⟩`
//! reads left to right.

use num_complex::Complex64;
use ndarray::{Array1, Array2};

use crate::error::SimulationError;
use crate::quantum::pauli::{Hamiltonian, PauliString};

/// State vector representation of a quantum state
#[derive(Clone, Debug)]
pub struct StateVector {
    /// Number of qubits
    pub qubit_count: usize,

    /// The state vector as an array of complex amplitudes
    amplitudes: Array1<Complex64>,
}

impl StateVector {
    /// Create the zero state |00...0⟩
    pub fn zero_state(qubit_count: usize) -> Self {
        let mut amplitudes = Array1::zeros(1 << qubit_count);
        amplitudes[0] = Complex64::new(1.0, 0.0);
        StateVector {
            qubit_count,
            amplitudes,
        }
    }

    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Dimension of the Hilbert space (2^n for n qubits)
    pub fn dimension(&self) -> usize {
        1 << self.qubit_count
    }

    /// Get a reference to the amplitudes
    pub fn amplitudes(&self) -> &Array1<Complex64> {
        &self.amplitudes
    }

    /// Calculate the probability of measuring the given bit string
    pub fn probability(&self, bit_string: usize) -> f64 {
        if bit_string >= self.dimension() {
            return 0.0;
        }
        self.amplitudes[bit_string].norm_sqr()
    }

    /// Inner product ⟨self|other⟩
    pub fn inner_product(&self, other: &Self) -> Complex64 {
        self.amplitudes
            .iter()
            .zip(other.amplitudes.iter())
            .map(|(a, b)| a.conj() * b)
            .sum()
    }

    /// Bit of `qubit` within a basis index
    fn mask(&self, qubit: usize) -> Result<usize, SimulationError> {
        if qubit >= self.qubit_count {
            return Err(SimulationError::QubitOutOfRange {
                qubit,
                qubit_count: self.qubit_count,
            });
        }
        Ok(1 << (self.qubit_count - 1 - qubit))
    }

    fn control_mask(&self, controls: &[usize]) -> Result<usize, SimulationError> {
        controls.iter().try_fold(0, |acc, &c| Ok(acc | self.mask(c)?))
    }

    /// Apply a 2x2 matrix to `target`, conditioned on every control being |1⟩
    pub fn apply_single(
        &mut self,
        matrix: &Array2<Complex64>,
        target: usize,
        controls: &[usize],
    ) -> Result<(), SimulationError> {
        let t = self.mask(target)?;
        let cmask = self.control_mask(controls)?;
        for i in 0..self.dimension() {
            if i & t != 0 || i & cmask != cmask {
                continue;
            }
            let j = i | t;
            let a0 = self.amplitudes[i];
            let a1 = self.amplitudes[j];
            self.amplitudes[i] = matrix[[0, 0]] * a0 + matrix[[0, 1]] * a1;
            self.amplitudes[j] = matrix[[1, 0]] * a0 + matrix[[1, 1]] * a1;
        }
        Ok(())
    }

    /// Multiply the amplitudes of the control subspace by `phase`
    pub fn apply_phase(&mut self, phase: Complex64, controls: &[usize]) -> Result<(), SimulationError> {
        let cmask = self.control_mask(controls)?;
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & cmask == cmask {
                *amp *= phase;
            }
        }
        Ok(())
    }

    /// The vector `P|ψ⟩`
    pub fn apply_pauli_string(&self, pauli: &PauliString) -> Result<Array1<Complex64>, SimulationError> {
        let ops = pauli
            .iter()
            .map(|(q, p)| Ok((self.mask(q)?, p)))
            .collect::<Result<Vec<_>, SimulationError>>()?;

        let mut out = Array1::zeros(self.dimension());
        for (i, amp) in self.amplitudes.iter().enumerate() {
            let mut index = i;
            let mut phase = Complex64::new(1.0, 0.0);
            for (mask, p) in &ops {
                let bit = usize::from(index & mask != 0);
                let (flipped, factor) = p.act(bit);
                index = if flipped == 1 { index | mask } else { index & !mask };
                phase *= factor;
            }
            out[index] += phase * amp;
        }
        Ok(out)
    }

    /// Apply `exp(-iθ/2 P)` on the subspace where every control is |1⟩
    ///
    /// The controls must be disjoint from the qubits of `pauli`.
    pub fn apply_pauli_rotation(
        &mut self,
        theta: f64,
        pauli: &PauliString,
        controls: &[usize],
    ) -> Result<(), SimulationError> {
        let cmask = self.control_mask(controls)?;
        let rotated = self.apply_pauli_string(pauli)?;
        let cos = Complex64::new((theta / 2.0).cos(), 0.0);
        let sin = Complex64::new(0.0, -(theta / 2.0).sin());
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & cmask == cmask {
                *amp = cos * *amp + sin * rotated[i];
            }
        }
        Ok(())
    }

    /// ⟨ψ|H|ψ⟩
    pub fn expectation(&self, observable: &Hamiltonian) -> Result<f64, SimulationError> {
        let mut value = 0.0;
        for (coefficient, pauli) in observable.terms() {
            let rotated = self.apply_pauli_string(pauli)?;
            let overlap: Complex64 = self
                .amplitudes
                .iter()
                .zip(rotated.iter())
                .map(|(a, b)| a.conj() * b)
                .sum();
            value += coefficient * overlap.re;
        }
        Ok(value)
    }
}
