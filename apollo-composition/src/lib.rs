//! ## Usage
//!
//! A mutable GraphQL schema graph, the derivation of API schemas from it, and the composition
//! of directive applications across subgraphs.
//!
//! Parse a schema with [`Schema::parse`], edit it with the `add_*`, `set_*` and `remove_*`
//! methods, then check it with [`Schema::validate`]. The client-facing API schema is
//! available through [`Schema::to_api_schema`].
//!
//! ## Crate versioning
//!
//! The `apollo-composition` crate does **not** adhere to [Semantic Versioning](https://semver.org/).
//! Any version may have breaking API changes.

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

mod api_schema;
pub mod error;
pub mod link;
pub mod merger;
pub mod schema;
pub mod utils;

pub use crate::api_schema::ApiSchemaOptions;
pub use crate::error::FederationError;
pub use crate::merger::FederationDirectiveCompositionManager;
pub use crate::schema::Schema;
