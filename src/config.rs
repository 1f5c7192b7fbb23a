//! Configuration of the gradient engine
//!
//! Plain serde structs, so any serde format can carry them. Missing fields take their
//! defaults.

use serde::{Deserialize, Serialize};

use crate::objective::BackendKind;
pub use crate::quantum::compiler::CompilerOptions;

/// Options for [`GradientEngine`](crate::quantum::differentiation::GradientEngine)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    /// Backend differentiating transformations; `None` makes compound objectives fail
    pub backend: Option<BackendKind>,
    /// Skip the decomposition pre-pass (the caller guarantees eligible gates)
    pub skip_compile: bool,
    /// Differentiate with respect to several variables on the rayon pool
    pub parallel: bool,
    /// Decompositions applied by the pre-pass
    pub compiler: CompilerOptions,
}

impl Default for GradientConfig {
    fn default() -> Self {
        GradientConfig {
            backend: Some(BackendKind::Symbolic),
            skip_compile: false,
            parallel: true,
            compiler: CompilerOptions::default(),
        }
    }
}

impl GradientConfig {
    pub fn with_backend(mut self, backend: Option<BackendKind>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_skip_compile(mut self, skip_compile: bool) -> Self {
        self.skip_compile = skip_compile;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerOptions) -> Self {
        self.compiler = compiler;
        self
    }
}
