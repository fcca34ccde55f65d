/*
 * SPDX-FileCopyrightText: 2026 Andrew Gunnerson
 * SPDX-License-Identifier: GPL-3.0-only
 */

//! Create and verify detached PKCS#7 (RFC 2315) `SignedData` envelopes signed
//! with RSA PKCS#1 v1.5 and SHA-256.
//!
//! The CLI source files use concrete types wherever possible for simplicity,
//! while the "library"-style source files aim to be generic.

pub mod cli;
pub mod crypto;
pub mod format;
pub mod oid;
pub mod sign;
pub mod stream;
pub mod verify;
