//! Dependency resolution across discovered specs.
//!
//! Dependencies are never collected into a graph up front. Instead every
//! spec is hashed as soon as it is seen; a spec whose dependency has no
//! hash yet is deferred to the next pass. Passes repeat while they make
//! progress, and whatever is still deferred once a pass resolves nothing is
//! missing a dependency or sits on a cycle.

mod engine;
#[cfg(test)]
mod integration_tests;

pub use engine::{Resolution, ResolutionEngine, ResolutionStats};
