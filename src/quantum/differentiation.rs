// src/quantum/differentiation.rs
//! Parameter-shift differentiation of objectives
//!
//! The engine differentiates an objective DAG with respect to one variable at a time.
//! Transformation nodes use the chain rule with partials from the configured
//! [`DifferentiationBackend`]. Expectation-value leaves use the analytic shift rule
//! of every gate depending on the variable. The result is again an objective and can
//! be simulated, or differentiated once more.
//!
//! A fresh [`GradientPass`] is created per `(node, variable)`; it memoizes leaf
//! derivatives by [`NodeId`], so an expectation value shared by several arguments is
//! differentiated only once.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::slice;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::config::GradientConfig;
use crate::error::{CompilerContractViolation, GradientError, Result};
use crate::objective::{Argument, Derivative, DifferentiationBackend, ExpectationValue, Node, NodeId, Objective};
use crate::quantum::compiler::Compiler;
use crate::quantum::gate::{Gate, ShiftRule};
use crate::quantum::variable::Variable;

/// Output of [`GradientEngine::grad`]
#[derive(Clone, Debug)]
pub enum Gradient {
    /// Derivative with respect to one variable
    Partial(Derivative),
    /// One derivative per free variable
    Total(BTreeMap<Variable, Derivative>),
}

impl Gradient {
    pub fn into_partial(self) -> Option<Derivative> {
        match self {
            Gradient::Partial(d) => Some(d),
            Gradient::Total(_) => None,
        }
    }

    pub fn into_total(self) -> Option<BTreeMap<Variable, Derivative>> {
        match self {
            Gradient::Partial(_) => None,
            Gradient::Total(map) => Some(map),
        }
    }
}

/// Gradient engine over objectives and expectation values
#[derive(Clone, Debug, Default)]
pub struct GradientEngine {
    config: GradientConfig,
}

impl GradientEngine {
    pub fn new(config: GradientConfig) -> Self {
        GradientEngine { config }
    }

    pub fn config(&self) -> &GradientConfig {
        &self.config
    }

    /// Differentiate `node` with respect to `variable`, or every free variable if `None`
    pub fn grad(&self, node: impl Into<Node>, variable: Option<&Variable>) -> Result<Gradient> {
        let node = node.into();
        match variable {
            Some(v) => self.partial(&node, v).map(Gradient::Partial),
            None => self.total(&node).map(Gradient::Total),
        }
    }

    /// One derivative per free variable of `node`
    pub fn total(&self, node: &Node) -> Result<BTreeMap<Variable, Derivative>> {
        let variables = node.extract_variables();
        if variables.is_empty() {
            return Err(GradientError::NoVariables);
        }
        debug!(count = variables.len(), parallel = self.config.parallel, "total gradient");

        if self.config.parallel {
            variables
                .par_iter()
                .map(|v| self.partial(node, v).map(|d| (v.clone(), d)))
                .collect()
        } else {
            variables
                .iter()
                .map(|v| self.partial(node, v).map(|d| (v.clone(), d)))
                .collect()
        }
    }

    /// Derivative of `node` with respect to `variable`
    pub fn partial(&self, node: &Node, variable: &Variable) -> Result<Derivative> {
        if !node.extract_variables().contains(variable) {
            trace!(%variable, "variable not free, derivative is zero");
            return Ok(Derivative::zero());
        }
        debug!(%variable, node = node.kind(), skip_compile = self.config.skip_compile, "computing gradient");

        let compiled = if self.config.skip_compile {
            node.clone()
        } else {
            Compiler::new(self.config.compiler).compile_node(node, Some(slice::from_ref(variable)))?
        };
        if !compiled.extract_variables().contains(variable) {
            return Err(CompilerContractViolation::VariableLost(variable.clone()).into());
        }

        let backend = self.config.backend.map(|kind| kind.backend());
        let mut pass = GradientPass::new(backend, variable);
        match &compiled {
            Node::Expectation(e) => pass.expectation(e),
            Node::Objective(o) => match o.as_expectation_value() {
                Some(e) => pass.expectation(e),
                None => pass.objective(o),
            },
            Node::Variable(_) => Err(GradientError::UnsupportedNode(compiled.kind().to_string())),
        }
    }
}

/// Derivative of `node` with respect to `variable` under the default configuration
pub fn grad(node: impl Into<Node>, variable: &Variable) -> Result<Derivative> {
    GradientEngine::default().partial(&node.into(), variable)
}

/// Every partial derivative of `node` under the default configuration
pub fn grad_all(node: impl Into<Node>) -> Result<BTreeMap<Variable, Derivative>> {
    GradientEngine::default().total(&node.into())
}

/// State of one differentiation with respect to one variable
pub struct GradientPass<'a> {
    backend: Option<&'a dyn DifferentiationBackend>,
    variable: &'a Variable,
    cache: HashMap<(NodeId, Variable), Derivative>,
}

impl<'a> GradientPass<'a> {
    pub fn new(backend: Option<&'a dyn DifferentiationBackend>, variable: &'a Variable) -> Self {
        GradientPass {
            backend,
            variable,
            cache: HashMap::new(),
        }
    }

    /// Number of memoized leaf derivatives
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Chain rule: Σ_i ∂T/∂x_i · ∂a_i/∂v over the arguments with a non-zero inner factor
    pub fn objective(&mut self, objective: &Objective) -> Result<Derivative> {
        let mut total = Derivative::zero();
        let mut live = false;

        for (index, arg) in objective.args().iter().enumerate() {
            let inner = self.inner(arg)?;
            if inner.is_zero() {
                continue;
            }

            let outer = match objective.transformation() {
                None => Derivative::Constant(1.0),
                Some(t) => {
                    let backend = self.backend.ok_or(GradientError::BackendUnavailable)?;
                    Derivative::from(objective.with_transformation(backend.partial(t, index)))
                }
            };
            live = true;
            if outer.is_zero() {
                continue;
            }
            trace!(index, outer = %outer, "chain rule term");
            total = total + outer * inner;
        }

        if !live {
            return Err(GradientError::NoLiveTerms(objective.to_string()));
        }
        Ok(total)
    }

    fn inner(&mut self, arg: &Argument) -> Result<Derivative> {
        match arg {
            Argument::Variable(v) if v == self.variable => Ok(Derivative::Constant(1.0)),
            Argument::Variable(_) => Ok(Derivative::zero()),
            Argument::Expectation(e) => self.expectation(e),
            Argument::Objective(o) => self.nested(o),
        }
    }

    fn nested(&mut self, objective: &Objective) -> Result<Derivative> {
        if !objective.extract_variables().contains(self.variable) {
            return Ok(Derivative::zero());
        }
        match objective.as_expectation_value() {
            Some(e) => self.expectation(e),
            None => self.objective(objective),
        }
    }

    /// Memoized derivative of an expectation value
    pub fn expectation(&mut self, e: &Arc<ExpectationValue>) -> Result<Derivative> {
        let key = (e.id(), self.variable.clone());
        if let Some(done) = self.cache.get(&key) {
            debug!(node = ?e.id(), "reusing memoized derivative");
            return Ok(done.clone());
        }
        let derivative = self.expectation_uncached(e)?;
        self.cache.insert(key, derivative.clone());
        Ok(derivative)
    }

    fn expectation_uncached(&mut self, e: &ExpectationValue) -> Result<Derivative> {
        let unitary = e.unitary();
        if let Err(err) = unitary.validate() {
            return Err(GradientError::InvalidUnitary(err.to_string()));
        }
        let map = unitary.parameter_map();
        let occurrences = match map.get(self.variable) {
            Some(occurrences) => occurrences,
            None => return Ok(Derivative::zero()),
        };

        let mut total = Derivative::zero();
        for (position, gate) in occurrences {
            if gate.is_controlled() {
                return Err(CompilerContractViolation::ControlledGate(gate.to_string()).into());
            }
            let rule = gate
                .shift()
                .ok_or_else(|| CompilerContractViolation::NoShiftRule(gate.to_string()))?;
            total = total + self.gate(e, *position, gate, rule)?;
        }
        Ok(total)
    }

    fn gate(&mut self, e: &ExpectationValue, position: usize, gate: &Gate, rule: ShiftRule) -> Result<Derivative> {
        let parameter = gate
            .parameter()
            .ok_or_else(|| CompilerContractViolation::NoShiftRule(gate.to_string()))?;
        let c = self.nested(parameter)?;
        if c.is_zero() {
            return Ok(Derivative::zero());
        }

        match rule {
            ShiftRule::Generalized(terms) => {
                let mut total = Derivative::zero();
                for (weight, shifted) in terms {
                    let term = self.shifted(e, position, shifted)?;
                    total = total + (c.clone() * weight) * term;
                }
                Ok(total)
            }
            ShiftRule::Simple(s) => {
                let shift = PI / (4.0 * s);
                let plus = self.shifted(e, position, gate.with_parameter(parameter.clone() + shift))?;
                let minus = self.shifted(e, position, gate.with_parameter(parameter.clone() - shift))?;
                Ok((c.clone() * s) * plus + (c * -s) * minus)
            }
        }
    }

    /// Expectation value of the circuit with the gate at `position` replaced
    fn shifted(&self, e: &ExpectationValue, position: usize, gate: Gate) -> Result<Derivative> {
        trace!(position, gate = %gate, "shifted circuit");
        let unitary = e.unitary().replace_gate(position, gate)?;
        Ok(Derivative::from(Objective::from(e.with_unitary(unitary))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::circuit::QCircuit;
    use crate::quantum::pauli::Hamiltonian;

    #[test]
    fn test_shared_leaf_is_memoized() {
        let a = Variable::new("a");
        let e = Arc::new(ExpectationValue::new(QCircuit::from(Gate::rx(&a, 0)), Hamiltonian::z(0)));
        let o = Objective::from(Arc::clone(&e)) * Objective::from(Arc::clone(&e));
        let engine = GradientEngine::default();
        let mut pass = GradientPass::new(engine.config().backend.map(|k| k.backend()), &a);
        pass.objective(&o).unwrap();
        assert_eq!(pass.cached(), 1);
    }

    #[test]
    fn test_missing_backend() {
        let a = Variable::new("a");
        let e = Objective::expectation_value(QCircuit::from(Gate::rx(&a, 0)), Hamiltonian::z(0));
        let engine = GradientEngine::new(GradientConfig::default().with_backend(None));
        assert!(matches!(
            engine.partial(&Node::from(e.clone().sin()), &a),
            Err(GradientError::BackendUnavailable)
        ));
        // a bare expectation value needs no backend
        assert!(engine.partial(&Node::from(e), &a).is_ok());
    }

    #[test]
    fn test_variable_node_is_unsupported() {
        let a = Variable::new("a");
        let err = GradientEngine::default().partial(&Node::from(a.clone()), &a).unwrap_err();
        assert!(matches!(err, GradientError::UnsupportedNode(_)));
    }

    #[test]
    fn test_no_variables() {
        let e = Objective::expectation_value(QCircuit::from(Gate::h(0)), Hamiltonian::z(0));
        assert!(matches!(grad_all(e), Err(GradientError::NoVariables)));
    }
}
