// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! Creation of detached PKCS#7 `SignedData` envelopes.
//!
//! The pipeline is strictly linear: the content is digested, the
//! authenticated attributes are built around that digest, the SET OF encoding
//! of the attributes is signed, and the resulting `SignerInfo` is wrapped in
//! `SignedData` and the outer `ContentInfo`. Any failure aborts the whole
//! operation and nothing is returned.

use std::{
    io::{self, Read},
    sync::atomic::AtomicBool,
    time::SystemTime,
};

use cms::{
    cert::IssuerAndSerialNumber,
    content_info::{CmsVersion, ContentInfo},
    signed_data::{
        DigestAlgorithmIdentifiers, EncapsulatedContentInfo, SignatureValue, SignerIdentifier,
        SignerInfo, SignerInfos,
    },
};
use der::{
    Any, DateTime, Encode,
    asn1::{AnyRef, GeneralizedTime, UtcTime},
};
use rand::{CryptoRng, RngCore};
use ring::digest::Context;
use rsa::RsaPrivateKey;
use thiserror::Error;
use tracing::{debug, trace};
use x509_cert::{Certificate, spki::AlgorithmIdentifierOwned, time::Time};

use crate::{
    crypto,
    format::pkcs7::{AuthenticatedAttributes, CertificateBundle, SignedData},
    oid,
    stream::{self, HashingReader},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read content")]
    ReadContent(#[source] io::Error),
    #[error("Failed to encode {0}")]
    Encode(&'static str, #[source] der::Error),
    #[error("Failed to sign authenticated attributes")]
    Sign(#[from] crypto::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// SHA-256 digest of the content being signed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContentDigest {
    pub digest: [u8; 32],
    /// Number of bytes that were read from the content stream.
    pub size: u64,
}

/// Compute the SHA-256 digest of everything in `reader`. The reader is
/// consumed exactly once. Interrupted reads are retried. Other read errors are
/// returned as-is.
pub fn digest_content(
    reader: impl Read,
    cancel_signal: &AtomicBool,
) -> io::Result<ContentDigest> {
    let mut hashing_reader = HashingReader::new(reader, Context::new(&ring::digest::SHA256));
    let size = stream::read_to_eof(&mut hashing_reader, cancel_signal)?;

    let (_, context) = hashing_reader.finish();

    let mut digest = [0u8; 32];
    digest.copy_from_slice(context.finish().as_ref());

    Ok(ContentDigest { digest, size })
}

/// Convert a timestamp to the form required for the `signingTime` attribute:
/// UTCTime for dates before 2050 and GeneralizedTime afterwards.
pub fn signing_time(time: SystemTime) -> der::Result<Time> {
    let date_time = DateTime::from_system_time(time)?;

    if date_time.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: oid::SHA256,
        parameters: Some(Any::from(AnyRef::NULL)),
    }
}

fn rsa_encryption_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: oid::PKCS1_RSA_ENCRYPTION,
        parameters: Some(Any::from(AnyRef::NULL)),
    }
}

/// A `SignerInfo` that has everything except the encrypted digest.
#[derive(Clone, Debug)]
pub struct UnsignedSignerInfo {
    sid: SignerIdentifier,
    digest_alg: AlgorithmIdentifierOwned,
    attributes: AuthenticatedAttributes,
    signature_algorithm: AlgorithmIdentifierOwned,
}

impl UnsignedSignerInfo {
    /// The signer is identified by the certificate's issuer and serial number,
    /// copied as-is.
    pub fn new(cert: &Certificate, attributes: AuthenticatedAttributes) -> Self {
        Self {
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: cert.tbs_certificate.issuer.clone(),
                serial_number: cert.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: sha256_algorithm(),
            attributes,
            signature_algorithm: rsa_encryption_algorithm(),
        }
    }

    /// Sign the authenticated attributes and produce the final `SignerInfo`.
    pub fn sign(
        self,
        key: &RsaPrivateKey,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<SignerInfo> {
        let digest = self
            .attributes
            .digest()
            .map_err(|e| Error::Encode("authenticated attributes", e))?;
        trace!("Authenticated attributes digest: {}", hex::encode(digest));

        let signature = crypto::sign_digest(key, rng, &digest)?;

        Ok(SignerInfo {
            version: CmsVersion::V1,
            sid: self.sid,
            digest_alg: self.digest_alg,
            signed_attrs: Some(self.attributes.into_inner()),
            signature_algorithm: self.signature_algorithm,
            signature: SignatureValue::new(signature)
                .map_err(|e| Error::Encode("encrypted digest", e))?,
            unsigned_attrs: None,
        })
    }
}

/// Builder for signing content with a certificate and its private key.
#[derive(Clone, Copy, Debug)]
pub struct Pkcs7Signer<'a> {
    cert: &'a Certificate,
    key: &'a RsaPrivateKey,
    intermediate: Option<&'a Certificate>,
    signing_time: Option<SystemTime>,
    cancel_signal: Option<&'a AtomicBool>,
}

impl<'a> Pkcs7Signer<'a> {
    pub fn new(cert: &'a Certificate, key: &'a RsaPrivateKey) -> Self {
        Self {
            cert,
            key,
            intermediate: None,
            signing_time: None,
            cancel_signal: None,
        }
    }

    /// Include an intermediate certificate after the signer's certificate.
    pub fn intermediate(mut self, cert: Option<&'a Certificate>) -> Self {
        self.intermediate = cert;
        self
    }

    /// Use a fixed signing time instead of the current time.
    pub fn signing_time(mut self, time: SystemTime) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Abort reading the content once `cancel_signal` is set. The read fails
    /// with [`io::ErrorKind::Interrupted`].
    pub fn cancel_signal(mut self, cancel_signal: &'a AtomicBool) -> Self {
        self.cancel_signal = Some(cancel_signal);
        self
    }

    /// Digest the content and build the outer [`ContentInfo`].
    pub fn build(
        &self,
        reader: impl Read,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<ContentInfo> {
        let not_cancelled = AtomicBool::new(false);
        let cancel_signal = self.cancel_signal.unwrap_or(&not_cancelled);

        let content_digest = digest_content(reader, cancel_signal).map_err(Error::ReadContent)?;
        debug!(
            "Digested {} bytes of content: {}",
            content_digest.size,
            hex::encode(content_digest.digest),
        );

        let time = signing_time(self.signing_time.unwrap_or_else(SystemTime::now))
            .map_err(|e| Error::Encode("signing time", e))?;

        let attributes =
            AuthenticatedAttributes::new(oid::PKCS7_DATA, time, &content_digest.digest)
                .map_err(|e| Error::Encode("authenticated attributes", e))?;

        let certificates = CertificateBundle::new(self.cert, self.intermediate)
            .map_err(|e| Error::Encode("certificates", e))?;

        debug!("Signing as: {}", self.cert.tbs_certificate.subject);
        let signer_info = UnsignedSignerInfo::new(self.cert, attributes).sign(self.key, rng)?;

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: DigestAlgorithmIdentifiers::try_from(vec![sha256_algorithm()])
                .map_err(|e| Error::Encode("digest algorithms", e))?,
            content_info: EncapsulatedContentInfo {
                econtent_type: oid::PKCS7_DATA,
                econtent: None,
            },
            certificates: Some(certificates),
            crls: None,
            signer_infos: SignerInfos::try_from(vec![signer_info])
                .map_err(|e| Error::Encode("signer infos", e))?,
        };

        signed_data
            .to_content_info()
            .map_err(|e| Error::Encode("signed data", e))
    }

    /// Sign the content and return the DER-encoded envelope.
    pub fn sign_with_rng(
        &self,
        reader: impl Read,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<Vec<u8>> {
        self.build(reader, rng)?
            .to_der()
            .map_err(|e| Error::Encode("content info", e))
    }

    /// Sign the content using the thread-local RNG for RSA blinding.
    pub fn sign(&self, reader: impl Read) -> Result<Vec<u8>> {
        self.sign_with_rng(reader, &mut rand::thread_rng())
    }
}

/// Sign the content in `reader` with `cert` and `key`.
pub fn sign(reader: impl Read, cert: &Certificate, key: &RsaPrivateKey) -> Result<Vec<u8>> {
    sign_with_intermediate(reader, cert, key, None)
}

/// Sign the content in `reader` with `cert` and `key`, also embedding
/// `intermediate` in the envelope if specified.
pub fn sign_with_intermediate(
    reader: impl Read,
    cert: &Certificate,
    key: &RsaPrivateKey,
    intermediate: Option<&Certificate>,
) -> Result<Vec<u8>> {
    Pkcs7Signer::new(cert, key)
        .intermediate(intermediate)
        .sign(reader)
}
