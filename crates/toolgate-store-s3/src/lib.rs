// crates/toolgate-store-s3/src/lib.rs
// ============================================================================
// Module: Toolgate S3 Store Library
// Description: Remote durable key-value backend over S3-compatible storage.
// Purpose: Expose the object-store backend implementing the core key-value
//          contract with a documented eventual-consistency guarantee gap.
// Dependencies: toolgate-core, toolgate-config, aws-sdk-s3, tokio
// ============================================================================

//! ## Overview
//! This crate implements the Toolgate storage contract over an
//! S3-compatible object store. The substrate is durable but eventually
//! consistent and offers no single-key serializability, so `put_if_match`
//! here is **best-effort** exactly as the contract documents: two concurrent
//! callers can both observe the same version and both write. This is a known
//! guarantee gap, not a bug to be papered over.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::RemoteStore;
