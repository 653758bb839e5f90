// crates/toolgate-core/src/security.rs
// ============================================================================
// Module: Toolgate Security Helpers
// Description: Constant-time comparison utilities for secret material.
// Purpose: Provide reusable, side-channel resistant comparisons for admin
//          secrets and fallback credential scans.
// Dependencies: subtle
// ============================================================================

//! ## Overview
//! Exposes constant-time equality helpers for secret values such as admin
//! secrets and fallback credential lists. Length differences short-circuit;
//! equal-length comparisons take constant time.

use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Constant-Time Comparisons
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
