//! A single bundle of the per-run collaborators every later component
//! needs (§9 "Global singletons ... passed explicitly as a Context
//! parameter"), so no module reaches for thread-local or static state.

use crate::config::Options;
use crate::diagnostics::Diagnostics;
use crate::variable::{MemoryLocationFactory, VariableFactory};

/// Owns the variable/memory-location factories, the run's [`Options`],
/// and the [`Diagnostics`] sink, for the duration of one analysis run.
#[derive(Debug)]
pub struct Context {
    /// Interns program variables and their derived offset variables.
    pub variables: VariableFactory,
    /// Interns memory locations, including the `errno`/absolute-zero
    /// sentinels.
    pub locations: MemoryLocationFactory,
    /// The run's configuration.
    pub options: Options,
    /// Collected unsoundness warnings.
    pub diagnostics: Diagnostics,
}

impl Context {
    /// A fresh context for a data layout with the given pointer width.
    pub fn new(pointer_width: u32, options: Options) -> Self {
        Self {
            variables: VariableFactory::new(pointer_width),
            locations: MemoryLocationFactory::new(),
            options,
            diagnostics: Diagnostics::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_no_diagnostics() {
        let ctx = Context::new(64, Options::default());
        assert!(ctx.diagnostics.is_empty());
    }
}
