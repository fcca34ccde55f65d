// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Verification of detached PKCS#7 `SignedData` envelopes with a single RSA
//! signer. Only the signature is checked. The signer's certificate chain is
//! not validated.

use std::{
    io::{self, Read},
    sync::atomic::AtomicBool,
};

use cms::signed_data::SignerIdentifier;
use const_oid::ObjectIdentifier;
use thiserror::Error;
use tracing::debug;
use x509_cert::{Certificate, time::Time};

use crate::{
    crypto,
    format::pkcs7::{self, AuthenticatedAttributes, SignedData},
    oid, sign,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read content")]
    ReadContent(#[source] io::Error),
    #[error("Failed to parse envelope")]
    Parse(#[from] pkcs7::Error),
    #[error("Failed to encode {0}")]
    Encode(&'static str, #[source] der::Error),
    #[error("Expected exactly one SignerInfo, but found {0}")]
    NotOneSignerInfo(usize),
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(ObjectIdentifier),
    #[error("Digest algorithm is not listed in SignedData: {0}")]
    UndeclaredDigestAlgorithm(ObjectIdentifier),
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(ObjectIdentifier),
    #[error("SignerInfo has no authenticated attributes")]
    MissingAttributes,
    #[error("Missing authenticated attribute: {0}")]
    MissingAttribute(ObjectIdentifier),
    #[error("Content type attribute ({attribute}) does not match content ({content})")]
    ContentTypeMismatch {
        attribute: ObjectIdentifier,
        content: ObjectIdentifier,
    },
    #[error("Expected message digest {expected}, but have {actual}")]
    MessageDigestMismatch { expected: String, actual: String },
    #[error("Signer is not identified by issuer and serial number")]
    UnsupportedSignerIdentifier,
    #[error("Signer certificate not found in envelope")]
    SignerCertNotFound,
    #[error("Failed to verify signature")]
    Signature(#[source] crypto::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Information about a successfully verified envelope.
#[derive(Clone, Debug)]
pub struct VerifiedSignature {
    /// Certificate whose key produced the signature.
    pub signer: Certificate,
    pub signing_time: Option<Time>,
    pub message_digest: Vec<u8>,
}

/// Verify a DER-encoded envelope against the detached content in `reader`.
pub fn verify(reader: impl Read, envelope: &[u8]) -> Result<VerifiedSignature> {
    verify_cancellable(reader, envelope, &AtomicBool::new(false))
}

/// Like [`verify`], but reading the content is aborted once `cancel_signal` is
/// set.
pub fn verify_cancellable(
    reader: impl Read,
    envelope: &[u8],
    cancel_signal: &AtomicBool,
) -> Result<VerifiedSignature> {
    let sd = pkcs7::parse_envelope(envelope)?;

    verify_signed_data(reader, &sd, cancel_signal)
}

/// Verify an already parsed [`SignedData`] against the detached content in
/// `reader`.
pub fn verify_signed_data(
    reader: impl Read,
    sd: &SignedData,
    cancel_signal: &AtomicBool,
) -> Result<VerifiedSignature> {
    let signer_info = match sd.signer_infos.0.as_slice() {
        [s] => s,
        s => return Err(Error::NotOneSignerInfo(s.len())),
    };

    let digest_oid = signer_info.digest_alg.oid;
    if digest_oid != oid::SHA256 {
        return Err(Error::UnsupportedDigestAlgorithm(digest_oid));
    } else if !sd.digest_algorithms.iter().any(|a| a.oid == digest_oid) {
        return Err(Error::UndeclaredDigestAlgorithm(digest_oid));
    }

    let signature_oid = signer_info.signature_algorithm.oid;
    if signature_oid != oid::PKCS1_RSA_ENCRYPTION
        && signature_oid != oid::PKCS1_SHA256_WITH_RSA_ENCRYPTION
    {
        return Err(Error::UnsupportedSignatureAlgorithm(signature_oid));
    }

    let attributes = signer_info
        .signed_attrs
        .clone()
        .map(AuthenticatedAttributes::from_attributes)
        .ok_or(Error::MissingAttributes)?;

    let content_type = attributes
        .content_type()?
        .ok_or(Error::MissingAttribute(oid::PKCS9_CONTENT_TYPE))?;
    if content_type != sd.content_info.econtent_type {
        return Err(Error::ContentTypeMismatch {
            attribute: content_type,
            content: sd.content_info.econtent_type,
        });
    }

    let message_digest = attributes
        .message_digest()?
        .ok_or(Error::MissingAttribute(oid::PKCS9_MESSAGE_DIGEST))?;
    let signing_time = attributes.signing_time()?;

    let content_digest = sign::digest_content(reader, cancel_signal).map_err(Error::ReadContent)?;
    if message_digest != content_digest.digest {
        return Err(Error::MessageDigestMismatch {
            expected: hex::encode(&message_digest),
            actual: hex::encode(content_digest.digest),
        });
    }

    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer_info.sid else {
        return Err(Error::UnsupportedSignerIdentifier);
    };

    let certs = match &sd.certificates {
        Some(bundle) => bundle
            .certificates()
            .map_err(|e| Error::Parse(pkcs7::Error::Decode(e)))?,
        None => vec![],
    };

    let signer = certs
        .into_iter()
        .find(|c| {
            c.tbs_certificate.issuer == sid.issuer
                && c.tbs_certificate.serial_number == sid.serial_number
        })
        .ok_or(Error::SignerCertNotFound)?;
    debug!("Found signer: {}", signer.tbs_certificate.subject);

    let public_key = crypto::get_public_key(&signer).map_err(Error::Signature)?;
    let attributes_digest = attributes
        .digest()
        .map_err(|e| Error::Encode("authenticated attributes", e))?;

    crypto::verify_digest(
        &public_key,
        &attributes_digest,
        signer_info.signature.as_bytes(),
    )
    .map_err(Error::Signature)?;

    Ok(VerifiedSignature {
        signer,
        signing_time,
        message_digest,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        time::{Duration, SystemTime},
    };

    use assert_matches::assert_matches;
    use cms::signed_data::{DigestAlgorithmIdentifiers, SignerInfo, SignerInfos};
    use pkcs8::DecodePrivateKey;
    use rsa::RsaPrivateKey;
    use x509_cert::{
        Certificate, attr::Attributes, der::DecodePem, serial_number::SerialNumber,
        spki::AlgorithmIdentifierOwned,
    };

    use crate::sign::Pkcs7Signer;

    use super::*;

    const CONTENT: &[u8] = b"foobar";
    const SHA1: ObjectIdentifier = const_oid::db::rfc5912::ID_SHA_1;

    fn sign_at(secs: u64) -> SignedData {
        let key = RsaPrivateKey::from_pkcs8_pem(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/data/TEST_KEY_DO_NOT_USE_signer.key",
        )))
        .unwrap();
        let cert = Certificate::from_pem(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/data/signer.crt",
        )))
        .unwrap();

        let envelope = Pkcs7Signer::new(&cert, &key)
            .signing_time(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .sign(Cursor::new(CONTENT))
            .unwrap();

        pkcs7::parse_envelope(&envelope).unwrap()
    }

    fn check(sd: &SignedData) -> Result<VerifiedSignature> {
        verify_signed_data(Cursor::new(CONTENT), sd, &AtomicBool::new(false))
    }

    fn signer_info(sd: &SignedData) -> SignerInfo {
        sd.signer_infos.0.as_slice()[0].clone()
    }

    fn replace_signer_info(sd: &mut SignedData, signer_info: SignerInfo) {
        sd.signer_infos = SignerInfos::try_from(vec![signer_info]).unwrap();
    }

    #[test]
    fn valid_signature() {
        let sd = sign_at(1_700_000_000);
        let verified = check(&sd).unwrap();

        assert_eq!(
            verified.signing_time.map(|t| t.to_unix_duration()),
            Some(Duration::from_secs(1_700_000_000)),
        );
    }

    #[test]
    fn reject_multiple_signer_infos() {
        let mut sd = sign_at(1_700_000_000);
        let other = signer_info(&sign_at(1_700_000_001));

        sd.signer_infos = SignerInfos::try_from(vec![signer_info(&sd), other]).unwrap();

        assert_matches!(
            check(&sd),
            Err(Error::NotOneSignerInfo(2))
        );
    }

    #[test]
    fn reject_unlisted_digest_algorithm() {
        let mut sd = sign_at(1_700_000_000);
        let sha1 = AlgorithmIdentifierOwned {
            oid: SHA1,
            parameters: None,
        };
        sd.digest_algorithms = DigestAlgorithmIdentifiers::try_from(vec![sha1]).unwrap();

        assert_matches!(
            check(&sd),
            Err(Error::UndeclaredDigestAlgorithm(o)) if o == oid::SHA256
        );
    }

    #[test]
    fn reject_unsupported_algorithms() {
        let mut sd = sign_at(1_700_000_000);
        let mut si = signer_info(&sd);
        si.digest_alg.oid = SHA1;
        replace_signer_info(&mut sd, si);

        assert_matches!(
            check(&sd),
            Err(Error::UnsupportedDigestAlgorithm(o)) if o == SHA1
        );

        let mut sd = sign_at(1_700_000_000);
        let mut si = signer_info(&sd);
        si.signature_algorithm.oid = SHA1;
        replace_signer_info(&mut sd, si);

        assert_matches!(
            check(&sd),
            Err(Error::UnsupportedSignatureAlgorithm(o)) if o == SHA1
        );
    }

    #[test]
    fn reject_missing_attributes() {
        let mut sd = sign_at(1_700_000_000);
        let mut si = signer_info(&sd);
        si.signed_attrs = None;
        replace_signer_info(&mut sd, si);

        assert_matches!(
            check(&sd),
            Err(Error::MissingAttributes)
        );

        let mut sd = sign_at(1_700_000_000);
        let mut si = signer_info(&sd);
        let attrs = si
            .signed_attrs
            .take()
            .unwrap()
            .iter()
            .filter(|a| a.oid != oid::PKCS9_MESSAGE_DIGEST)
            .cloned()
            .collect::<Vec<_>>();
        si.signed_attrs = Some(Attributes::try_from(attrs).unwrap());
        replace_signer_info(&mut sd, si);

        assert_matches!(
            check(&sd),
            Err(Error::MissingAttribute(o)) if o == oid::PKCS9_MESSAGE_DIGEST
        );
    }

    #[test]
    fn reject_content_type_mismatch() {
        let mut sd = sign_at(1_700_000_000);
        sd.content_info.econtent_type = oid::PKCS7_SIGNED_DATA;

        assert_matches!(
            check(&sd),
            Err(Error::ContentTypeMismatch { attribute, content })
                if attribute == oid::PKCS7_DATA && content == oid::PKCS7_SIGNED_DATA
        );
    }

    #[test]
    fn reject_other_signer() {
        let mut sd = sign_at(1_700_000_000);
        let mut si = signer_info(&sd);
        let SignerIdentifier::IssuerAndSerialNumber(sid) = &mut si.sid else {
            panic!("Expected issuer and serial number");
        };
        sid.serial_number = SerialNumber::from(1u64);
        replace_signer_info(&mut sd, si);

        assert_matches!(
            check(&sd),
            Err(Error::SignerCertNotFound)
        );
    }
}
