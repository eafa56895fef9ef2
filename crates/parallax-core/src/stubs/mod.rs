//! Deterministic providers for tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`: production code
//! cannot reach these unless the `test-utils` feature is enabled, which only
//! the member crates' dev-dependency sections do.
//!
//! - [`StubEmbeddingProvider`]: hash-seeded deterministic vectors, any text
//! - [`FixedEmbeddingProvider`]: explicit text → vector table for pinned
//!   geometry in end-to-end scenarios
//!
//! ```ignore
//! // Downstream test crates:
//! // [dev-dependencies]
//! // parallax-core = { workspace = true, features = ["test-utils"] }
//! use parallax_core::stubs::StubEmbeddingProvider;
//! ```

#[cfg(any(test, feature = "test-utils"))]
mod embedding_stub;
#[cfg(any(test, feature = "test-utils"))]
mod fixed;

#[cfg(any(test, feature = "test-utils"))]
pub use embedding_stub::StubEmbeddingProvider;
#[cfg(any(test, feature = "test-utils"))]
pub use fixed::FixedEmbeddingProvider;
