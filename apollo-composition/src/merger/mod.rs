//! Composition of directive applications across subgraphs.

pub mod directive_composition;
pub mod directive_composition_manager;

pub use directive_composition::DirectiveCompositionEntry;
pub use directive_composition::DirectiveCompositionEntryConfig;
pub use directive_composition::DirectiveCompositionStrategy;
pub use directive_composition::FieldPropagationStrategy;
pub use directive_composition::PropagationStrategy;
pub use directive_composition_manager::FederationDirectiveCompositionManager;
pub use directive_composition_manager::Source;
