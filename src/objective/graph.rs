//! Objectives: differentiable post-processing of expectation values
//!
//! An [`Objective`] holds an ordered list of arguments and a transformation over
//! their values. Arithmetic on objectives concatenates the argument lists and
//! re-indexes the right operand's transformation, so a leaf keeps its identity (and
//! its memoized derivative) no matter how often it is reused.

use std::collections::{BTreeSet, HashSet};
use std::fmt::{self, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use super::expectation::{ExpectationValue, NodeId};
use super::transform::{Expr, Transformation, UnaryFn};
use crate::quantum::circuit::QCircuit;
use crate::quantum::pauli::Hamiltonian;
use crate::quantum::variable::Variable;

/// One input of an objective
#[derive(Clone, Debug)]
pub enum Argument {
    Variable(Variable),
    Expectation(Arc<ExpectationValue>),
    Objective(Arc<Objective>),
}

impl Argument {
    pub fn extract_variables(&self) -> BTreeSet<Variable> {
        match self {
            Argument::Variable(v) => BTreeSet::from([v.clone()]),
            Argument::Expectation(e) => e.extract_variables(),
            Argument::Objective(o) => o.extract_variables(),
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Variable(v) => write!(f, "{}", v),
            Argument::Expectation(e) => write!(f, "{}", e),
            Argument::Objective(o) => write!(f, "[{}]", o),
        }
    }
}

/// A differentiable function of variables and expectation values
///
/// `transformation == None` means the objective passes its single argument through.
#[derive(Clone, Debug)]
pub struct Objective {
    args: Vec<Argument>,
    transformation: Option<Transformation>,
}

impl Objective {
    /// Objective applying `transformation` to `args`
    pub fn new(args: Vec<Argument>, transformation: impl Into<Transformation>) -> Self {
        Objective {
            args,
            transformation: Some(transformation.into()),
        }
    }

    /// Pass-through objective over a single argument
    pub fn identity(arg: Argument) -> Self {
        Objective {
            args: vec![arg],
            transformation: None,
        }
    }

    /// Objective without arguments
    pub fn constant(value: f64) -> Self {
        Objective::new(Vec::new(), Expr::Const(value))
    }

    /// Objective wrapping the expectation value of `unitary` against `observable`
    pub fn expectation_value(unitary: QCircuit, observable: impl Into<Arc<Hamiltonian>>) -> Self {
        Objective::identity(Argument::Expectation(Arc::new(ExpectationValue::new(unitary, observable))))
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    pub fn transformation(&self) -> Option<&Transformation> {
        self.transformation.as_ref()
    }

    /// The transformation as an expression, with the identity made explicit
    pub fn expr(&self) -> Expr {
        match &self.transformation {
            Some(t) => t.as_ref().clone(),
            None if self.args.is_empty() => Expr::Const(0.0),
            None => Expr::Input(0),
        }
    }

    /// The wrapped expectation value, if this objective only wraps one
    pub fn as_expectation_value(&self) -> Option<&Arc<ExpectationValue>> {
        match (self.args.as_slice(), &self.transformation) {
            ([Argument::Expectation(e)], None) => Some(e),
            _ => None,
        }
    }

    pub fn is_expectation_value(&self) -> bool {
        self.as_expectation_value().is_some()
    }

    /// The wrapped variable, if this objective is a bare variable
    pub fn as_variable(&self) -> Option<&Variable> {
        match (self.args.as_slice(), &self.transformation) {
            ([Argument::Variable(v)], None) => Some(v),
            _ => None,
        }
    }

    /// The value of an objective whose transformation reads none of its arguments
    pub fn constant_value(&self) -> Option<f64> {
        let expr = self.expr();
        if !expr.is_constant() {
            return None;
        }
        expr.eval::<f64>(&[]).ok()
    }

    /// Every free variable of this objective
    pub fn extract_variables(&self) -> BTreeSet<Variable> {
        self.args.iter().flat_map(|a| a.extract_variables()).collect()
    }

    /// True if some argument, at any depth, is an expectation value
    pub fn has_expectation_values(&self) -> bool {
        self.args.iter().any(|a| match a {
            Argument::Variable(_) => false,
            Argument::Expectation(_) => true,
            Argument::Objective(o) => o.has_expectation_values(),
        })
    }

    /// Number of distinct expectation values in the DAG
    pub fn count_expectation_values(&self) -> usize {
        let mut seen = HashSet::new();
        self.collect_expectation_ids(&mut seen);
        seen.len()
    }

    fn collect_expectation_ids(&self, seen: &mut HashSet<NodeId>) {
        for arg in &self.args {
            match arg {
                Argument::Variable(_) => {}
                Argument::Expectation(e) => {
                    seen.insert(e.id());
                }
                Argument::Objective(o) => o.collect_expectation_ids(seen),
            }
        }
    }

    /// Same arguments, different transformation
    pub fn with_transformation(&self, transformation: Transformation) -> Self {
        Objective {
            args: self.args.clone(),
            transformation: Some(transformation),
        }
    }

    /// Same transformation, different arguments
    pub fn with_args(&self, args: Vec<Argument>) -> Self {
        Objective {
            args,
            transformation: self.transformation.clone(),
        }
    }

    /// Combine two objectives with a binary operation on their values
    pub fn binary(self, other: Objective, op: impl FnOnce(Expr, Expr) -> Expr) -> Objective {
        let offset = self.args.len();
        let lhs = self.expr();
        let rhs = other.expr().shift_inputs(offset);
        let mut args = self.args;
        args.extend(other.args);
        Objective::new(args, op(lhs, rhs))
    }

    /// Apply an elementary function
    pub fn apply(self, f: UnaryFn) -> Objective {
        let expr = Expr::apply(f, self.expr());
        Objective::new(self.args, expr)
    }

    pub fn sin(self) -> Objective {
        self.apply(UnaryFn::Sin)
    }

    pub fn cos(self) -> Objective {
        self.apply(UnaryFn::Cos)
    }

    pub fn exp(self) -> Objective {
        self.apply(UnaryFn::Exp)
    }

    pub fn ln(self) -> Objective {
        self.apply(UnaryFn::Ln)
    }

    pub fn sqrt(self) -> Objective {
        self.apply(UnaryFn::Sqrt)
    }

    pub fn tanh(self) -> Objective {
        self.apply(UnaryFn::Tanh)
    }

    /// Raise to a power that may itself be an objective
    pub fn pow(self, exponent: impl Into<Objective>) -> Objective {
        self.binary(exponent.into(), Expr::pow)
    }

    pub fn powf(self, exponent: f64) -> Objective {
        let expr = Expr::pow(self.expr(), Expr::Const(exponent));
        Objective::new(self.args, expr)
    }
}

impl Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        match &self.transformation {
            None => write!(f, "{}", args.join(", ")),
            Some(t) => write!(f, "f({}) with f = {}", args.join(", "), t),
        }
    }
}

impl From<Variable> for Objective {
    fn from(v: Variable) -> Self {
        Objective::identity(Argument::Variable(v))
    }
}

impl From<&Variable> for Objective {
    fn from(v: &Variable) -> Self {
        Objective::identity(Argument::Variable(v.clone()))
    }
}

impl From<f64> for Objective {
    fn from(value: f64) -> Self {
        Objective::constant(value)
    }
}

impl From<ExpectationValue> for Objective {
    fn from(e: ExpectationValue) -> Self {
        Objective::identity(Argument::Expectation(Arc::new(e)))
    }
}

impl From<Arc<ExpectationValue>> for Objective {
    fn from(e: Arc<ExpectationValue>) -> Self {
        Objective::identity(Argument::Expectation(e))
    }
}

macro_rules! objective_binary_ops {
    ($($trait:ident, $method:ident, $ctor:path);* $(;)?) => {
        $(
            impl<T: Into<Objective>> $trait<T> for Objective {
                type Output = Objective;

                fn $method(self, rhs: T) -> Objective {
                    self.binary(rhs.into(), $ctor)
                }
            }

            impl<T: Into<Objective>> $trait<T> for Variable {
                type Output = Objective;

                fn $method(self, rhs: T) -> Objective {
                    Objective::from(self).binary(rhs.into(), $ctor)
                }
            }

            impl $trait<Objective> for f64 {
                type Output = Objective;

                fn $method(self, rhs: Objective) -> Objective {
                    Objective::constant(self).binary(rhs, $ctor)
                }
            }

            impl $trait<Variable> for f64 {
                type Output = Objective;

                fn $method(self, rhs: Variable) -> Objective {
                    Objective::constant(self).binary(Objective::from(rhs), $ctor)
                }
            }
        )*
    };
}

objective_binary_ops! {
    Add, add, Expr::add;
    Sub, sub, Expr::sub;
    Mul, mul, Expr::mul;
    Div, div, Expr::div;
}

impl Neg for Objective {
    type Output = Objective;

    fn neg(self) -> Objective {
        let expr = Expr::neg(self.expr());
        Objective::new(self.args, expr)
    }
}

impl Neg for Variable {
    type Output = Objective;

    fn neg(self) -> Objective {
        -Objective::from(self)
    }
}

/// Result of differentiating one node: a literal number or a new objective
#[derive(Clone, Debug)]
pub enum Derivative {
    Constant(f64),
    Objective(Objective),
}

impl Derivative {
    /// The literal zero, produced for parameters an objective does not depend on
    pub fn zero() -> Self {
        Derivative::Constant(0.0)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Derivative::Constant(c) if *c == 0.0)
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Derivative::Constant(c) => Some(*c),
            Derivative::Objective(_) => None,
        }
    }

    pub fn as_objective(&self) -> Option<&Objective> {
        match self {
            Derivative::Constant(_) => None,
            Derivative::Objective(o) => Some(o),
        }
    }

    pub fn into_objective(self) -> Objective {
        match self {
            Derivative::Constant(c) => Objective::constant(c),
            Derivative::Objective(o) => o,
        }
    }

    /// Collapse argument-free objectives to plain numbers
    fn normalize(objective: Objective) -> Derivative {
        match objective.constant_value() {
            Some(c) => Derivative::Constant(c),
            None => Derivative::Objective(objective),
        }
    }
}

impl From<f64> for Derivative {
    fn from(c: f64) -> Self {
        Derivative::Constant(c)
    }
}

impl From<Objective> for Derivative {
    fn from(o: Objective) -> Self {
        Derivative::normalize(o)
    }
}

impl Display for Derivative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivative::Constant(c) => write!(f, "{}", c),
            Derivative::Objective(o) => write!(f, "{}", o),
        }
    }
}

impl Add for Derivative {
    type Output = Derivative;

    fn add(self, rhs: Derivative) -> Derivative {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        match (self, rhs) {
            (Derivative::Constant(a), Derivative::Constant(b)) => Derivative::Constant(a + b),
            (a, b) => Derivative::normalize(a.into_objective() + b.into_objective()),
        }
    }
}

impl Mul for Derivative {
    type Output = Derivative;

    fn mul(self, rhs: Derivative) -> Derivative {
        if self.is_zero() || rhs.is_zero() {
            return Derivative::zero();
        }
        match (self, rhs) {
            (Derivative::Constant(a), Derivative::Constant(b)) => Derivative::Constant(a * b),
            (Derivative::Constant(a), other) if a == 1.0 => other,
            (other, Derivative::Constant(b)) if b == 1.0 => other,
            (a, b) => Derivative::normalize(a.into_objective() * b.into_objective()),
        }
    }
}

impl Mul<f64> for Derivative {
    type Output = Derivative;

    fn mul(self, rhs: f64) -> Derivative {
        Derivative::Constant(rhs) * self
    }
}

impl Neg for Derivative {
    type Output = Derivative;

    fn neg(self) -> Derivative {
        match self {
            Derivative::Constant(c) => Derivative::Constant(-c),
            Derivative::Objective(o) => Derivative::Objective(-o),
        }
    }
}

/// Anything the gradient engine can be asked to differentiate
#[derive(Clone, Debug)]
pub enum Node {
    Objective(Objective),
    Expectation(Arc<ExpectationValue>),
    Variable(Variable),
}

impl Node {
    pub fn extract_variables(&self) -> BTreeSet<Variable> {
        match self {
            Node::Objective(o) => o.extract_variables(),
            Node::Expectation(e) => e.extract_variables(),
            Node::Variable(v) => BTreeSet::from([v.clone()]),
        }
    }

    /// Short name of the node kind, for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Objective(_) => "objective",
            Node::Expectation(_) => "expectation value",
            Node::Variable(_) => "variable",
        }
    }
}

impl From<Objective> for Node {
    fn from(o: Objective) -> Self {
        Node::Objective(o)
    }
}

impl From<&Objective> for Node {
    fn from(o: &Objective) -> Self {
        Node::Objective(o.clone())
    }
}

impl From<ExpectationValue> for Node {
    fn from(e: ExpectationValue) -> Self {
        Node::Expectation(Arc::new(e))
    }
}

impl From<Arc<ExpectationValue>> for Node {
    fn from(e: Arc<ExpectationValue>) -> Self {
        Node::Expectation(e)
    }
}

impl From<Variable> for Node {
    fn from(v: Variable) -> Self {
        Node::Variable(v)
    }
}
