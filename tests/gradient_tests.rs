use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shiftgrad::prelude::*;
use shiftgrad::{CompilerContractViolation, GradientError};

/// Helper function for comparing f64 with tolerance
fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

fn assign(pairs: &[(&Variable, f64)]) -> HashMap<Variable, f64> {
    pairs.iter().map(|(v, x)| ((*v).clone(), *x)).collect()
}

/// Centered finite difference of a node with respect to one variable
fn finite_difference(node: &Objective, variable: &Variable, values: &HashMap<Variable, f64>) -> f64 {
    let h = 1e-5;
    let mut plus = values.clone();
    let mut minus = values.clone();
    *plus.get_mut(variable).unwrap() += h;
    *minus.get_mut(variable).unwrap() -= h;
    (simulate(node, &plus).unwrap() - simulate(node, &minus).unwrap()) / (2.0 * h)
}

fn rx_expectation(a: &Variable) -> Objective {
    Objective::expectation_value(QCircuit::from(Gate::rx(a, 0)), Hamiltonian::z(0))
}

fn observable() -> Hamiltonian {
    Hamiltonian::z(0)
        + 0.5 * Hamiltonian::x(1)
        + Hamiltonian::new([(0.7, PauliString::from_pairs([(0, Pauli::Y), (1, Pauli::Z)]))])
        + -0.3 * Hamiltonian::z(2)
}

/// Compare every analytic partial with finite differences at random points
fn check_against_finite_differences(node: &Objective, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let variables = node.extract_variables();
    let gradient = grad_all(node).unwrap();
    assert_eq!(gradient.keys().cloned().collect::<Vec<_>>(), variables.iter().cloned().collect::<Vec<_>>());

    for _ in 0..5 {
        let values: HashMap<Variable, f64> = variables
            .iter()
            .map(|v| (v.clone(), rng.gen_range(-2.0 * PI..2.0 * PI)))
            .collect();
        for (variable, derivative) in &gradient {
            let analytic = simulate_derivative(derivative, &values).unwrap();
            let numeric = finite_difference(node, variable, &values);
            assert!(
                approx_eq(analytic, numeric, 1e-4),
                "d/d{} at {:?}: analytic {} vs numeric {}",
                variable,
                values,
                analytic,
                numeric
            );
        }
    }
}

#[test]
fn test_rx_gradient_is_minus_sine() {
    let a = Variable::new("a");
    let e = rx_expectation(&a);
    let d = grad(&e, &a).unwrap();

    assert!(approx_eq(simulate_derivative(&d, &assign(&[(&a, 0.0)])).unwrap(), 0.0, 1e-10));
    assert!(approx_eq(simulate_derivative(&d, &assign(&[(&a, FRAC_PI_2)])).unwrap(), -1.0, 1e-10));
    for x in [-2.5, -0.3, 0.9, 4.0] {
        let value = simulate_derivative(&d, &assign(&[(&a, x)])).unwrap();
        assert!(approx_eq(value, -x.sin(), 1e-10));
    }
}

#[test]
fn test_zero_on_absent_variable() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let e = rx_expectation(&a);

    let d = grad(&e, &b).unwrap();
    assert_eq!(d.as_constant(), Some(0.0));
    assert!(d.is_zero());

    let o = e.clone().sin() * 3.0 + e;
    assert_eq!(grad(&o, &b).unwrap().as_constant(), Some(0.0));
}

#[test]
fn test_linearity() {
    let a = Variable::new("a");
    let e1 = rx_expectation(&a);
    let e2 = Objective::expectation_value(QCircuit::from(Gate::ry(&a, 0)), Hamiltonian::x(0));
    let combined = 2.0 * e1.clone() + e2.clone() * -1.5;

    let d = grad(&combined, &a).unwrap();
    let d1 = grad(&e1, &a).unwrap();
    let d2 = grad(&e2, &a).unwrap();
    for x in [-1.2, 0.4, 2.2] {
        let values = assign(&[(&a, x)]);
        let expected = 2.0 * simulate_derivative(&d1, &values).unwrap() - 1.5 * simulate_derivative(&d2, &values).unwrap();
        assert!(approx_eq(simulate_derivative(&d, &values).unwrap(), expected, 1e-10));
        // d/da (2cos a - 1.5 sin a)
        assert!(approx_eq(expected, -2.0 * x.sin() - 1.5 * x.cos(), 1e-10));
    }
}

#[test]
fn test_shift_rule_exactness_standard_gates() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let circuit = Gate::h(0)
        + Gate::ry(&a, 0)
        + Gate::cnot(0, 1).unwrap()
        + Gate::rx(&b, 1)
        + Gate::rz(&a, 1)
        + Gate::phase(&b, 0)
        + Gate::ry(&b, 2)
        + Gate::cnot(2, 0).unwrap();
    let e = Objective::expectation_value(circuit, observable());
    check_against_finite_differences(&e, 1);
}

#[test]
fn test_shift_rule_exactness_unit_shift_generator() {
    // exp(-iaZ) has eigenvalue gap 2 in `a`
    let a = Variable::new("a");
    let b = Variable::new("b");
    let circuit = Gate::h(0)
        + Gate::exp_pauli(2.0 * a.clone(), PauliString::single(0, Pauli::Z)).unwrap()
        + Gate::h(0)
        + Gate::exp_pauli(&b, PauliString::from_pairs([(0, Pauli::X), (1, Pauli::Y)])).unwrap();
    let e = Objective::expectation_value(circuit, observable());
    check_against_finite_differences(&e, 2);

    let single = Objective::expectation_value(
        Gate::h(0) + Gate::exp_pauli(2.0 * a.clone(), PauliString::single(0, Pauli::Z)).unwrap(),
        Hamiltonian::x(0),
    );
    let d = grad(&single, &a).unwrap();
    for x in [-3.0, 0.2, 1.7] {
        // ⟨X⟩ = cos 2a
        let value = simulate_derivative(&d, &assign(&[(&a, x)])).unwrap();
        assert!(approx_eq(value, -2.0 * (2.0 * x).sin(), 1e-10));
    }
}

#[test]
fn test_shift_rule_exactness_controlled_rotations() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let circuit = Gate::ry(0.4, 0)
        + Gate::h(1)
        + Gate::rx(&a, 1).controlled_by([0]).unwrap()
        + Gate::ry(&b, 0).controlled_by([1]).unwrap()
        + Gate::rz(&a, 1).controlled_by([0]).unwrap()
        + Gate::h(2)
        + Gate::phase(&b, 2).controlled_by([1]).unwrap()
        + Gate::rx(0.8, 2);
    let e = Objective::expectation_value(circuit, observable());
    check_against_finite_differences(&e, 3);
}

#[test]
fn test_four_term_rule_for_multi_controlled_rotations() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let circuit = Gate::h(0)
        + Gate::ry(1.1, 1)
        + Gate::ry(0.3, 2)
        + Gate::rx(&a, 2).controlled_by([0, 1]).unwrap()
        + Gate::rz(&b, 0).controlled_by([1, 2]).unwrap()
        + Gate::exp_pauli(&a, PauliString::from_pairs([(1, Pauli::X), (2, Pauli::X)]))
            .unwrap()
            .controlled_by([0])
            .unwrap()
        + Gate::phase(&b, 1).controlled_by([0, 2]).unwrap();
    let e = Objective::expectation_value(circuit, observable());
    check_against_finite_differences(&e, 4);
}

#[test]
fn test_shift_rule_exactness_generalized_rotation() {
    let a = Variable::new("a");
    let circuit = Gate::h(0)
        + Gate::h(1)
        + Gate::generalized_rotation(&a, PauliString::from_pairs([(1, Pauli::Y), (2, Pauli::X)]), [0]).unwrap();
    let e = Objective::expectation_value(circuit, observable());
    check_against_finite_differences(&e, 5);
}

#[test]
fn test_shift_rule_exactness_powers_and_trotter() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let circuit = Gate::power(PowerBase::X, &a, 0)
        + Gate::power(PowerBase::H, &b, 1)
        + Gate::power(PowerBase::Y, &a, 2).controlled_by([0]).unwrap()
        + Gate::power(PowerBase::H, &a, 0).controlled_by([1]).unwrap()
        + Gate::power(PowerBase::Z, &b, 1).controlled_by([0, 2]).unwrap()
        + Gate::trotterized(
            &b,
            Hamiltonian::new([(1.0, PauliString::from_pairs([(0, Pauli::Z), (1, Pauli::Z)]))])
                + 0.5 * Hamiltonian::x(0)
                + 0.2 * Hamiltonian::unit(),
            2,
        )
        .unwrap()
        + Gate::trotterized(&a, Hamiltonian::y(2) + 0.3 * Hamiltonian::unit(), 1)
            .unwrap()
            .controlled_by([1])
            .unwrap();
    let e = Objective::expectation_value(circuit, observable());
    check_against_finite_differences(&e, 6);
}

#[test]
fn test_memoized_shared_expectation() {
    let a = Variable::new("a");
    let e = Objective::expectation_value(QCircuit::from(Gate::ry(&a, 0)) + Gate::rx(&a, 0), Hamiltonian::z(0));

    let single = grad(&e, &a).unwrap();
    let double = grad(&(e.clone() + e.clone()), &a).unwrap();
    for x in [-0.7, 0.5, 2.9] {
        let values = assign(&[(&a, x)]);
        let expected = 2.0 * simulate_derivative(&single, &values).unwrap();
        assert!(approx_eq(simulate_derivative(&double, &values).unwrap(), expected, 1e-10));
    }

    // the shared leaf contributes its shifted circuits once: the original plus four shifts
    let shifted = single.as_objective().unwrap().count_expectation_values();
    assert_eq!(shifted, 4);
    assert_eq!(double.as_objective().unwrap().count_expectation_values(), shifted);
}

#[test]
fn test_gradient_drops_expectation_values_with_constant_coefficient() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let e1 = rx_expectation(&a);
    let e2 = Objective::expectation_value(QCircuit::from(Gate::ry(&b, 0)), Hamiltonian::x(0));

    // only the two shifted circuits of e1 remain
    let linear = grad(&(2.0 * e1.clone() + 3.0 * e2.clone()), &a).unwrap();
    assert_eq!(linear.as_objective().unwrap().count_expectation_values(), 2);
    let values = assign(&[(&a, 0.4), (&b, 1.1)]);
    assert!(approx_eq(simulate_derivative(&linear, &values).unwrap(), -2.0 * 0.4f64.sin(), 1e-10));

    // a vanishing outer factor leaves nothing to evaluate
    let scaled_out = grad(&(e1.clone() * 0.0 + e2), &a).unwrap();
    assert!(scaled_out.is_zero());

    // a scaled gate parameter folds its inner factor to a number
    let doubled = Objective::expectation_value(QCircuit::from(Gate::rx(2.0 * a.clone(), 0)), Hamiltonian::z(0));
    let d = grad(&doubled, &a).unwrap();
    assert_eq!(d.as_objective().unwrap().args().len(), 2);
}

#[test]
fn test_all_variables_completeness() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let c = Variable::new("c");
    let e = Objective::expectation_value(Gate::rx(&a, 0) + Gate::ry(&b, 1), Hamiltonian::z(0) + Hamiltonian::z(1));
    let o = e.clone() * c.clone() + e.sin();

    let gradient = grad_all(&o).unwrap();
    let keys: Vec<Variable> = gradient.keys().cloned().collect();
    assert_eq!(keys, vec![a.clone(), b.clone(), c.clone()]);

    // d/dc = E = cos a + cos b
    let values = assign(&[(&a, 0.3), (&b, -1.1), (&c, 2.0)]);
    let dc = simulate_derivative(&gradient[&c], &values).unwrap();
    assert!(approx_eq(dc, 0.3f64.cos() + (-1.1f64).cos(), 1e-10));

    check_against_finite_differences(&o, 7);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let e = Objective::expectation_value(
        Gate::rx(&a, 0) + Gate::cnot(0, 1).unwrap() + Gate::ry(&b, 1).controlled_by([0]).unwrap(),
        observable(),
    );
    let o = e.clone().powf(2.0) - e.exp();
    let parallel = GradientEngine::new(GradientConfig::default().with_parallel(true)).total(&Node::from(&o)).unwrap();
    let sequential = GradientEngine::new(GradientConfig::default().with_parallel(false)).total(&Node::from(&o)).unwrap();

    let values = assign(&[(&a, 0.6), (&b, -2.0)]);
    for (v, d) in &parallel {
        let p = simulate_derivative(d, &values).unwrap();
        let s = simulate_derivative(&sequential[v], &values).unwrap();
        assert!(approx_eq(p, s, 1e-12));
    }
}

#[test]
fn test_grad_without_variable_returns_total() {
    let a = Variable::new("a");
    let engine = GradientEngine::default();
    match engine.grad(&rx_expectation(&a), None).unwrap() {
        Gradient::Total(map) => assert_eq!(map.len(), 1),
        Gradient::Partial(_) => panic!("expected one derivative per variable"),
    }
    assert!(engine.grad(&rx_expectation(&a), Some(&a)).unwrap().into_partial().is_some());
}

#[test]
fn test_controlled_gate_without_compiler() {
    let a = Variable::new("a");
    let e = Objective::expectation_value(
        Gate::h(0) + Gate::rx(&a, 1).controlled_by([0]).unwrap(),
        Hamiltonian::z(1),
    );
    let engine = GradientEngine::new(GradientConfig::default().with_skip_compile(true));
    let err = engine.partial(&Node::from(&e), &a).unwrap_err();
    assert!(matches!(err, GradientError::Contract(CompilerContractViolation::ControlledGate(_))));

    // the compiler removes the control
    assert!(GradientEngine::default().partial(&Node::from(&e), &a).is_ok());
}

#[test]
fn test_gate_without_shift_rule() {
    let a = Variable::new("a");
    let e = Objective::expectation_value(QCircuit::from(Gate::power(PowerBase::X, &a, 0)), Hamiltonian::z(0));
    let engine = GradientEngine::new(GradientConfig::default().with_compiler(CompilerOptions::none()));
    let err = engine.partial(&Node::from(&e), &a).unwrap_err();
    assert!(matches!(err, GradientError::Contract(CompilerContractViolation::NoShiftRule(_))));
}

#[test]
fn test_no_variables() {
    let e = Objective::expectation_value(QCircuit::from(Gate::h(0)), Hamiltonian::z(0));
    assert!(matches!(grad_all(&e), Err(GradientError::NoVariables)));
}

#[test]
fn test_backends_agree() {
    let a = Variable::new("a");
    let b = Variable::new("b");
    let e1 = Objective::expectation_value(Gate::rx(&a, 0) + Gate::ry(&b, 0), Hamiltonian::z(0));
    let e2 = Objective::expectation_value(QCircuit::from(Gate::ry(&a, 0)), Hamiltonian::x(0));
    let o = e1.clone().sin() * e2.clone() + e1.clone().powf(2.0) / (e2.clone() * e2 + 1.0) - b.clone() * e1.tanh();

    let symbolic = GradientEngine::new(GradientConfig::default().with_backend(Some(BackendKind::Symbolic)));
    let dual = GradientEngine::new(GradientConfig::default().with_backend(Some(BackendKind::Dual)));
    let node = Node::from(&o);
    let ds = symbolic.total(&node).unwrap();
    let dd = dual.total(&node).unwrap();

    let values = assign(&[(&a, 0.9), (&b, -0.4)]);
    for v in [&a, &b] {
        let s = simulate_derivative(&ds[v], &values).unwrap();
        let d = simulate_derivative(&dd[v], &values).unwrap();
        assert!(approx_eq(s, d, 1e-10), "backends disagree on {}: {} vs {}", v, s, d);
        assert!(approx_eq(s, finite_difference(&o, v, &values), 1e-4));
    }
}

#[test]
fn test_second_derivatives() {
    let a = Variable::new("a");
    let e = rx_expectation(&a);
    let squared = e.clone().powf(2.0);

    for kind in [BackendKind::Symbolic, BackendKind::Dual] {
        let engine = GradientEngine::new(GradientConfig::default().with_backend(Some(kind)));

        let first = engine.partial(&Node::from(&e), &a).unwrap().into_objective();
        let second = engine.partial(&Node::from(&first), &a).unwrap();

        let first_sq = engine.partial(&Node::from(&squared), &a).unwrap().into_objective();
        let second_sq = engine.partial(&Node::from(&first_sq), &a).unwrap();

        for x in [-1.3, 0.25, 2.0] {
            let values = assign(&[(&a, x)]);
            // d²/da² cos a = -cos a
            assert!(approx_eq(simulate_derivative(&second, &values).unwrap(), -x.cos(), 1e-9));
            // d²/da² cos² a = -2 cos 2a
            assert!(approx_eq(simulate_derivative(&second_sq, &values).unwrap(), -2.0 * (2.0 * x).cos(), 1e-9));
        }
    }
}

#[test]
fn test_parameter_expressions_use_inner_chain_rule() {
    let a = Variable::new("a");
    let b = Variable::new("b");

    let doubled = Objective::expectation_value(QCircuit::from(Gate::rx(2.0 * a.clone(), 0)), Hamiltonian::z(0));
    let d = grad(&doubled, &a).unwrap();
    for x in [-0.8, 0.3, 1.9] {
        let value = simulate_derivative(&d, &assign(&[(&a, x)])).unwrap();
        assert!(approx_eq(value, -2.0 * (2.0 * x).sin(), 1e-10));
    }

    let product = Objective::expectation_value(QCircuit::from(Gate::rx(a.clone() * b.clone(), 0)), Hamiltonian::z(0));
    let gradient = grad_all(&product).unwrap();
    let values = assign(&[(&a, 0.7), (&b, 1.3)]);
    let da = simulate_derivative(&gradient[&a], &values).unwrap();
    let db = simulate_derivative(&gradient[&b], &values).unwrap();
    assert!(approx_eq(da, -1.3 * (0.7f64 * 1.3).sin(), 1e-10));
    assert!(approx_eq(db, -0.7 * (0.7f64 * 1.3).sin(), 1e-10));
}

#[test]
fn test_missing_backend_for_compound_objective() {
    let a = Variable::new("a");
    let o = rx_expectation(&a).cos();
    let engine = GradientEngine::new(GradientConfig::default().with_backend(None));
    assert!(matches!(engine.partial(&Node::from(&o), &a), Err(GradientError::BackendUnavailable)));
}

#[test]
fn test_variable_node_is_unsupported() {
    let a = Variable::new("a");
    let err = GradientEngine::default().grad(a.clone(), Some(&a)).unwrap_err();
    assert!(matches!(err, GradientError::UnsupportedNode(_)));
    // a variable that is not its own target is simply constant
    let b = Variable::new("b");
    assert!(GradientEngine::default().grad(a, Some(&b)).unwrap().into_partial().unwrap().is_zero());
}

#[test]
fn test_derivative_of_bare_expectation_value_node() {
    let a = Variable::new("a");
    let e = ExpectationValue::new(QCircuit::from(Gate::ry(&a, 0)), Hamiltonian::z(0));
    let d = GradientEngine::default().grad(e, Some(&a)).unwrap().into_partial().unwrap();
    let value = simulate_derivative(&d, &assign(&[(&a, 0.4)])).unwrap();
    assert!(approx_eq(value, -0.4f64.sin(), 1e-10));
}

#[test]
fn test_expectation_value_in_gate_parameter_is_rejected() {
    let a = Variable::new("a");
    let inner = rx_expectation(&a);
    let outer = Objective::expectation_value(QCircuit::from(Gate::ry(inner, 0)), Hamiltonian::z(0));

    match grad(&outer, &a) {
        Err(GradientError::InvalidUnitary(description)) => {
            assert!(description.contains("E(U="));
            assert!(description.contains("Rx(a)"));
        }
        other => panic!("expected an invalid unitary, got {:?}", other.map(|d| d.to_string())),
    }
}
