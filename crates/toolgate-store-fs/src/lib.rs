// crates/toolgate-store-fs/src/lib.rs
// ============================================================================
// Module: Toolgate File Store Library
// Description: Local-disk key-value backend for Toolgate.
// Purpose: Expose the file-tree storage backend implementing the core
//          key-value contract.
// Dependencies: toolgate-core, serde_json
// ============================================================================

//! ## Overview
//! This crate implements the Toolgate storage contract over a local-disk
//! JSON-file tree. Logical keys translate into nested paths under a
//! configured root; keys that would escape the root are rejected before any
//! filesystem access occurs.

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

pub use store::FileStore;
