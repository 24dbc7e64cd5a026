//! Concrete backends built on the shared core
//!
//! Each module provides a backend type, its factory, and a typed adapter for
//! one remote service.
//!
//! | Module | Service | Description |
//! |--------|---------|-------------|
//! | `recommendations` | embeddings/recommendations | Topic and content embeddings, recommendations |

pub mod recommendations;

pub use recommendations::{
    RecommendationsAdapter, RecommendationsBackend, RecommendationsBackendFactory,
};
