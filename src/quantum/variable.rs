// src/quantum/variable.rs
//! Symbolic circuit parameters
//!
//! A [`Variable`] names one free scalar of an objective. Variables are compared,
//! hashed and ordered by their canonical form, so they can key every map that stores
//! per-parameter data (values, gradients, memoized derivatives).

use std::fmt::{self, Display};
use std::sync::Arc;

/// A symbolic parameter: an atomic name, optionally with a tuple index
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    name: Arc<str>,
    index: Vec<usize>,
}

impl Variable {
    /// Create an atomic variable
    pub fn new(name: impl AsRef<str>) -> Self {
        Variable {
            name: Arc::from(name.as_ref()),
            index: Vec::new(),
        }
    }

    /// Create a variable that is one component of a vector-valued parameter
    pub fn indexed(name: impl AsRef<str>, index: impl IntoIterator<Item = usize>) -> Self {
        Variable {
            name: Arc::from(name.as_ref()),
            index: index.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.index.is_empty() {
            let parts: Vec<String> = self.index.iter().map(|i| i.to_string()).collect();
            write!(f, "({})", parts.join(","))?;
        }
        Ok(())
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Variable::new(name)
    }
}

impl From<String> for Variable {
    fn from(name: String) -> Self {
        Variable::new(name)
    }
}

impl From<&Variable> for Variable {
    fn from(variable: &Variable) -> Self {
        variable.clone()
    }
}
