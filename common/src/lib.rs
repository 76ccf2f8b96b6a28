pub mod config;

/// Common utilities shared across the storefront trust project
///
/// This crate provides shared functionality that can be used across different
/// modules of the storefront backend, including:
///
/// - YAML configuration loading for the executables
/// - Shared test utilities (unique phone/order-number generation)

// Test helpers module - available for both development and test builds
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{generate_unique_id, unique_phone};
