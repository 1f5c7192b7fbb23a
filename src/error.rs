//! Error types for shiftgrad
//!
//! Every failure the gradient engine can report is a precondition violated by the
//! caller or by an upstream collaborator (circuit, compiler, backend). None of them
//! are retried.

use thiserror::Error;

use crate::quantum::variable::Variable;

/// Errors raised while building or editing circuits
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CircuitError {
    /// A gate was constructed without any target qubit
    #[error("Gate '{0}' has no target qubits")]
    NoTargets(String),

    /// A qubit appears twice among the targets and controls of one gate
    #[error("Qubit {qubit} is used more than once in gate '{gate}'")]
    DuplicateQubit { gate: String, qubit: usize },

    /// Gate kind and qubit list disagree
    #[error("Gate '{gate}' requires {expected} target qubits, but {actual} were provided")]
    InvalidQubitCount {
        gate: String,
        expected: usize,
        actual: usize,
    },

    /// A parameterized gate kind was built without a parameter
    #[error("Gate '{0}' requires a parameter")]
    MissingParameter(String),

    /// A gate parameter refers to something other than variables
    #[error("Gate parameter must depend on variables only, found {0}")]
    InvalidParameter(String),

    /// `replace_gates` was called with a position outside the circuit
    #[error("Gate position {position} out of range for circuit with {len} gates")]
    PositionOutOfRange { position: usize, len: usize },

    /// `replace_gates` was called with mismatched positions and circuits
    #[error("Got {positions} positions but {circuits} replacement circuits")]
    ReplacementMismatch { positions: usize, circuits: usize },
}

impl CircuitError {
    /// Create an invalid qubit count error
    pub fn invalid_qubit_count(gate: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InvalidQubitCount {
            gate: gate.into(),
            expected,
            actual,
        }
    }
}

/// Errors raised by the decomposition pre-pass
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerError {
    /// A decomposition produced an invalid gate
    #[error("Decomposition failed: {0}")]
    Circuit(#[from] CircuitError),

    /// The pre-pass does not know how to make this gate shift-rule eligible
    #[error("Cannot decompose gate {0}")]
    Unsupported(String),
}

/// The compiler pre-pass did not establish the shift rule's preconditions
///
/// Always a defect in the compiler (or a caller that skipped it), never a user error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerContractViolation {
    /// The target variable vanished from the compiled objective
    #[error("Objective does not depend on variable {0} after compilation")]
    VariableLost(Variable),

    /// A controlled gate reached leaf differentiation
    #[error("Controlled gate in gradient, the compiler was not called. Gate is {0}")]
    ControlledGate(String),

    /// A parameterized gate without any shift rule reached leaf differentiation
    #[error("No shift rule found for gate {0}")]
    NoShiftRule(String),
}

/// Errors raised by the gradient engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradientError {
    /// The total gradient was requested for an objective without free variables
    #[error("Objective has no variables")]
    NoVariables,

    #[error(transparent)]
    Contract(#[from] CompilerContractViolation),

    /// No automatic-differentiation backend is configured
    #[error("Can't differentiate a transformation without an automatic differentiation backend")]
    BackendUnavailable,

    /// Differentiation was requested on a node that is neither an objective nor an
    /// expectation value
    #[error("Gradient not implemented for {0}, only for expectation values and objectives")]
    UnsupportedNode(String),

    /// A unitary failed its structural validity check
    #[error("Unitary failed verification: {0}")]
    InvalidUnitary(String),

    /// Every chain-rule term was zero even though the objective depends on the variable
    #[error("No non-zero derivative term for {0}")]
    NoLiveTerms(String),

    #[error("Compilation failed: {0}")]
    Compiler(#[from] CompilerError),

    #[error("Invalid derivative circuit: {0}")]
    Circuit(#[from] CircuitError),
}

/// Errors raised while evaluating objectives on the statevector simulator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// A variable has no assigned value
    #[error("No value assigned to variable {0}")]
    UnassignedVariable(Variable),

    /// The observable acts on a qubit the circuit does not have
    #[error("Qubit index {qubit} out of range for {qubit_count}-qubit state")]
    QubitOutOfRange { qubit: usize, qubit_count: usize },

    /// Evaluation produced NaN or infinity
    #[error("Evaluation produced a non-finite value for {0}")]
    NonFinite(String),

    /// A transformation refers to an argument index the objective does not have
    #[error("Transformation reads argument {index} but objective has {len} arguments")]
    MissingArgument { index: usize, len: usize },
}

/// Result alias defaulting to [`GradientError`]
pub type Result<T, E = GradientError> = std::result::Result<T, E>;
