// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Object identifiers used when building and checking PKCS#7 envelopes.

use const_oid::{ObjectIdentifier, db};

/// `id-data` (RFC 2315 section 14).
pub const PKCS7_DATA: ObjectIdentifier = db::rfc5911::ID_DATA;

/// `id-signedData` (RFC 2315 section 14).
pub const PKCS7_SIGNED_DATA: ObjectIdentifier = db::rfc5911::ID_SIGNED_DATA;

/// PKCS#9 `contentType` attribute.
pub const PKCS9_CONTENT_TYPE: ObjectIdentifier = db::rfc5911::ID_CONTENT_TYPE;

/// PKCS#9 `messageDigest` attribute.
pub const PKCS9_MESSAGE_DIGEST: ObjectIdentifier = db::rfc5911::ID_MESSAGE_DIGEST;

/// PKCS#9 `signingTime` attribute.
pub const PKCS9_SIGNING_TIME: ObjectIdentifier = db::rfc5911::ID_SIGNING_TIME;

pub const SHA256: ObjectIdentifier = db::rfc5912::ID_SHA_256;

/// PKCS#1 `rsaEncryption`. RFC 2315 uses this as the digest encryption
/// algorithm rather than `sha256WithRSAEncryption`.
pub const PKCS1_RSA_ENCRYPTION: ObjectIdentifier = db::rfc5912::RSA_ENCRYPTION;

/// PKCS#1 `sha256WithRSAEncryption`. Some producers use this as the digest
/// encryption algorithm instead of `rsaEncryption`.
pub const PKCS1_SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_values() {
        let cases = [
            (PKCS7_DATA, "1.2.840.113549.1.7.1"),
            (PKCS7_SIGNED_DATA, "1.2.840.113549.1.7.2"),
            (PKCS9_CONTENT_TYPE, "1.2.840.113549.1.9.3"),
            (PKCS9_MESSAGE_DIGEST, "1.2.840.113549.1.9.4"),
            (PKCS9_SIGNING_TIME, "1.2.840.113549.1.9.5"),
            (SHA256, "2.16.840.1.101.3.4.2.1"),
            (PKCS1_RSA_ENCRYPTION, "1.2.840.113549.1.1.1"),
            (PKCS1_SHA256_WITH_RSA_ENCRYPTION, "1.2.840.113549.1.1.11"),
        ];

        for (oid, dotted) in cases {
            assert_eq!(oid.to_string(), dotted);
        }
    }
}
