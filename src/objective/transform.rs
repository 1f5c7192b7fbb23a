//! Differentiable transformations of objective arguments
//!
//! A transformation is a small expression graph over the positional inputs
//! `x0, x1, ...` of an objective. It is evaluated through the [`Real`] trait, so the
//! same graph runs on plain `f64` and on forward-mode [`Dual`] numbers.

use std::fmt::{self, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::error::SimulationError;

/// Shared, immutable transformation of an objective
pub type Transformation = Arc<Expr>;

/// Elementary functions that can be applied to an objective
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryFn {
    Sin,
    Cos,
    Exp,
    Ln,
    Sqrt,
    Tanh,
}

impl UnaryFn {
    fn name(&self) -> &'static str {
        match self {
            UnaryFn::Sin => "sin",
            UnaryFn::Cos => "cos",
            UnaryFn::Exp => "exp",
            UnaryFn::Ln => "ln",
            UnaryFn::Sqrt => "sqrt",
            UnaryFn::Tanh => "tanh",
        }
    }

    /// Symbolic derivative f'(a)
    fn derivative(&self, a: &Expr) -> Expr {
        match self {
            UnaryFn::Sin => Expr::apply(UnaryFn::Cos, a.clone()),
            UnaryFn::Cos => Expr::neg(Expr::apply(UnaryFn::Sin, a.clone())),
            UnaryFn::Exp => Expr::apply(UnaryFn::Exp, a.clone()),
            UnaryFn::Ln => Expr::div(Expr::Const(1.0), a.clone()),
            UnaryFn::Sqrt => Expr::div(Expr::Const(0.5), Expr::apply(UnaryFn::Sqrt, a.clone())),
            UnaryFn::Tanh => {
                let t = Expr::apply(UnaryFn::Tanh, a.clone());
                Expr::sub(Expr::Const(1.0), Expr::mul(t.clone(), t))
            }
        }
    }
}

/// Expression graph over positional inputs
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// The i-th argument of the objective
    Input(usize),
    Const(f64),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Apply(UnaryFn, Box<Expr>),
    /// Partial derivative of `body` with respect to input `index`, evaluated lazily
    /// with dual numbers
    Partial { body: Arc<Expr>, index: usize },
}

impl Expr {
    pub fn add(a: Expr, b: Expr) -> Expr {
        match (&a, &b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x + y),
            (Expr::Const(x), _) if *x == 0.0 => b,
            (_, Expr::Const(y)) if *y == 0.0 => a,
            _ => Expr::Add(Box::new(a), Box::new(b)),
        }
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        match (&a, &b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x - y),
            (Expr::Const(x), _) if *x == 0.0 => Expr::neg(b),
            (_, Expr::Const(y)) if *y == 0.0 => a,
            _ => Expr::Sub(Box::new(a), Box::new(b)),
        }
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        match (&a, &b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x * y),
            (Expr::Const(x), _) if *x == 0.0 => Expr::Const(0.0),
            (_, Expr::Const(y)) if *y == 0.0 => Expr::Const(0.0),
            (Expr::Const(x), _) if *x == 1.0 => b,
            (_, Expr::Const(y)) if *y == 1.0 => a,
            _ => Expr::Mul(Box::new(a), Box::new(b)),
        }
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        match (&a, &b) {
            (Expr::Const(x), Expr::Const(y)) if *y != 0.0 => Expr::Const(x / y),
            (Expr::Const(x), _) if *x == 0.0 => Expr::Const(0.0),
            (_, Expr::Const(y)) if *y == 1.0 => a,
            _ => Expr::Div(Box::new(a), Box::new(b)),
        }
    }

    pub fn pow(a: Expr, b: Expr) -> Expr {
        match (&a, &b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x.powf(*y)),
            (_, Expr::Const(y)) if *y == 1.0 => a,
            (_, Expr::Const(y)) if *y == 0.0 => Expr::Const(1.0),
            _ => Expr::Pow(Box::new(a), Box::new(b)),
        }
    }

    pub fn neg(a: Expr) -> Expr {
        match a {
            Expr::Const(x) => Expr::Const(-x),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn apply(f: UnaryFn, a: Expr) -> Expr {
        Expr::Apply(f, Box::new(a))
    }

    /// True if the value of this expression depends on input `index`
    pub fn depends_on(&self, index: usize) -> bool {
        match self {
            Expr::Input(i) => *i == index,
            Expr::Const(_) => false,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.depends_on(index) || b.depends_on(index)
            }
            Expr::Neg(a) | Expr::Apply(_, a) => a.depends_on(index),
            Expr::Partial { body, .. } => body.depends_on(index),
        }
    }

    /// True if this expression reads no inputs at all
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Input(_) => false,
            Expr::Const(_) => true,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.is_constant() && b.is_constant()
            }
            Expr::Neg(a) | Expr::Apply(_, a) => a.is_constant(),
            Expr::Partial { body, .. } => body.is_constant(),
        }
    }

    /// Highest input index read by this expression
    pub fn max_input(&self) -> Option<usize> {
        match self {
            Expr::Input(i) => Some(*i),
            Expr::Const(_) => None,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.max_input().max(b.max_input())
            }
            Expr::Neg(a) | Expr::Apply(_, a) => a.max_input(),
            Expr::Partial { body, .. } => body.max_input(),
        }
    }

    /// Renumber every input `i` as `i + offset`
    pub fn shift_inputs(&self, offset: usize) -> Expr {
        if offset == 0 {
            return self.clone();
        }
        match self {
            Expr::Input(i) => Expr::Input(i + offset),
            Expr::Const(c) => Expr::Const(*c),
            Expr::Add(a, b) => Expr::Add(Box::new(a.shift_inputs(offset)), Box::new(b.shift_inputs(offset))),
            Expr::Sub(a, b) => Expr::Sub(Box::new(a.shift_inputs(offset)), Box::new(b.shift_inputs(offset))),
            Expr::Mul(a, b) => Expr::Mul(Box::new(a.shift_inputs(offset)), Box::new(b.shift_inputs(offset))),
            Expr::Div(a, b) => Expr::Div(Box::new(a.shift_inputs(offset)), Box::new(b.shift_inputs(offset))),
            Expr::Pow(a, b) => Expr::Pow(Box::new(a.shift_inputs(offset)), Box::new(b.shift_inputs(offset))),
            Expr::Neg(a) => Expr::Neg(Box::new(a.shift_inputs(offset))),
            Expr::Apply(f, a) => Expr::Apply(*f, Box::new(a.shift_inputs(offset))),
            Expr::Partial { body, index } => Expr::Partial {
                body: Arc::new(body.shift_inputs(offset)),
                index: index + offset,
            },
        }
    }

    /// Symbolic partial derivative with respect to input `index`
    ///
    /// The result never contains `Partial` nodes.
    pub fn derivative(&self, index: usize) -> Expr {
        if !self.depends_on(index) {
            return Expr::Const(0.0);
        }
        match self {
            Expr::Input(i) => Expr::Const(if *i == index { 1.0 } else { 0.0 }),
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Add(a, b) => Expr::add(a.derivative(index), b.derivative(index)),
            Expr::Sub(a, b) => Expr::sub(a.derivative(index), b.derivative(index)),
            Expr::Mul(a, b) => Expr::add(
                Expr::mul(a.derivative(index), (**b).clone()),
                Expr::mul((**a).clone(), b.derivative(index)),
            ),
            Expr::Div(a, b) => Expr::div(
                Expr::sub(
                    Expr::mul(a.derivative(index), (**b).clone()),
                    Expr::mul((**a).clone(), b.derivative(index)),
                ),
                Expr::mul((**b).clone(), (**b).clone()),
            ),
            Expr::Pow(a, b) => {
                if !b.depends_on(index) {
                    // power rule, valid for negative bases
                    Expr::mul(
                        Expr::mul(
                            (**b).clone(),
                            Expr::pow((**a).clone(), Expr::sub((**b).clone(), Expr::Const(1.0))),
                        ),
                        a.derivative(index),
                    )
                } else {
                    Expr::mul(
                        self.clone(),
                        Expr::add(
                            Expr::mul(b.derivative(index), Expr::apply(UnaryFn::Ln, (**a).clone())),
                            Expr::div(Expr::mul((**b).clone(), a.derivative(index)), (**a).clone()),
                        ),
                    )
                }
            }
            Expr::Neg(a) => Expr::neg(a.derivative(index)),
            Expr::Apply(f, a) => Expr::mul(f.derivative(a), a.derivative(index)),
            Expr::Partial { body, index: inner } => body.derivative(*inner).derivative(index),
        }
    }

    /// Evaluate on any [`Real`] scalar type
    pub fn eval<T: Real>(&self, args: &[T]) -> Result<T, SimulationError> {
        Ok(match self {
            Expr::Input(i) => *args.get(*i).ok_or(SimulationError::MissingArgument {
                index: *i,
                len: args.len(),
            })?,
            Expr::Const(c) => T::constant(*c),
            Expr::Add(a, b) => a.eval(args)? + b.eval(args)?,
            Expr::Sub(a, b) => a.eval(args)? - b.eval(args)?,
            Expr::Mul(a, b) => a.eval(args)? * b.eval(args)?,
            Expr::Div(a, b) => a.eval(args)? / b.eval(args)?,
            Expr::Pow(a, b) => a.eval(args)?.powr(b.eval(args)?),
            Expr::Neg(a) => -a.eval(args)?,
            Expr::Apply(f, a) => a.eval(args)?.apply(*f),
            Expr::Partial { body, index } => T::partial(body, *index, args)?,
        })
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Input(i) => write!(f, "x{}", i),
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "({} * {})", a, b),
            Expr::Div(a, b) => write!(f, "({} / {})", a, b),
            Expr::Pow(a, b) => write!(f, "({} ^ {})", a, b),
            Expr::Neg(a) => write!(f, "-{}", a),
            Expr::Apply(func, a) => write!(f, "{}({})", func.name(), a),
            Expr::Partial { body, index } => write!(f, "d/dx{}[{}]", index, body),
        }
    }
}

/// Scalar types an [`Expr`] can be evaluated on
pub trait Real:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self> + Neg<Output = Self>
{
    fn constant(c: f64) -> Self;

    fn powr(self, exponent: Self) -> Self;

    fn apply(self, f: UnaryFn) -> Self;

    /// Value of `d body / d x_index` at `args`
    fn partial(body: &Expr, index: usize, args: &[Self]) -> Result<Self, SimulationError>;
}

impl Real for f64 {
    fn constant(c: f64) -> Self {
        c
    }

    fn powr(self, exponent: Self) -> Self {
        self.powf(exponent)
    }

    fn apply(self, f: UnaryFn) -> Self {
        match f {
            UnaryFn::Sin => self.sin(),
            UnaryFn::Cos => self.cos(),
            UnaryFn::Exp => self.exp(),
            UnaryFn::Ln => self.ln(),
            UnaryFn::Sqrt => self.sqrt(),
            UnaryFn::Tanh => self.tanh(),
        }
    }

    fn partial(body: &Expr, index: usize, args: &[Self]) -> Result<Self, SimulationError> {
        // seed the tangent of the differentiated input
        let seeded: Vec<Dual> = args
            .iter()
            .enumerate()
            .map(|(i, &x)| Dual::new(x, if i == index { 1.0 } else { 0.0 }))
            .collect();
        Ok(body.eval(&seeded)?.eps)
    }
}

/// Forward-mode dual number `re + eps·ε` with `ε² = 0`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dual {
    pub re: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(re: f64, eps: f64) -> Self {
        Dual { re, eps }
    }
}

impl Add for Dual {
    type Output = Dual;
    fn add(self, o: Dual) -> Dual {
        Dual::new(self.re + o.re, self.eps + o.eps)
    }
}

impl Sub for Dual {
    type Output = Dual;
    fn sub(self, o: Dual) -> Dual {
        Dual::new(self.re - o.re, self.eps - o.eps)
    }
}

impl Mul for Dual {
    type Output = Dual;
    fn mul(self, o: Dual) -> Dual {
        Dual::new(self.re * o.re, self.eps * o.re + self.re * o.eps)
    }
}

impl Div for Dual {
    type Output = Dual;
    fn div(self, o: Dual) -> Dual {
        Dual::new(self.re / o.re, (self.eps * o.re - self.re * o.eps) / (o.re * o.re))
    }
}

impl Neg for Dual {
    type Output = Dual;
    fn neg(self) -> Dual {
        Dual::new(-self.re, -self.eps)
    }
}

impl Real for Dual {
    fn constant(c: f64) -> Self {
        Dual::new(c, 0.0)
    }

    fn powr(self, e: Self) -> Self {
        let re = self.re.powf(e.re);
        let eps = if e.eps == 0.0 {
            if self.eps == 0.0 {
                0.0
            } else {
                e.re * self.re.powf(e.re - 1.0) * self.eps
            }
        } else {
            re * (e.eps * self.re.ln() + e.re * self.eps / self.re)
        };
        Dual::new(re, eps)
    }

    fn apply(self, f: UnaryFn) -> Self {
        let x = self.re;
        let (value, slope) = match f {
            UnaryFn::Sin => (x.sin(), x.cos()),
            UnaryFn::Cos => (x.cos(), -x.sin()),
            UnaryFn::Exp => (x.exp(), x.exp()),
            UnaryFn::Ln => (x.ln(), 1.0 / x),
            UnaryFn::Sqrt => (x.sqrt(), 0.5 / x.sqrt()),
            UnaryFn::Tanh => (x.tanh(), 1.0 - x.tanh() * x.tanh()),
        };
        Dual::new(value, slope * self.eps)
    }

    fn partial(body: &Expr, index: usize, args: &[Self]) -> Result<Self, SimulationError> {
        // a first-order dual cannot carry a mixed second derivative, so the inner
        // partial is expanded symbolically
        body.derivative(index).eval(args)
    }
}
