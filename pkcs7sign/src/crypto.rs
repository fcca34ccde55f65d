// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    env::{self, VarError},
    ffi::{OsStr, OsString},
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use pkcs8::DecodePrivateKey;
use rand::{CryptoRng, RngCore};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey, traits::PublicKeyParts};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_cert::{
    Certificate,
    der::{Decode, DecodePem, referenced::OwnedToRef},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("RSA key size ({}) not supported", .0 * 8)]
    UnsupportedKeySize(usize),
    #[error("Invalid digest length ({0} bytes) for SHA-256")]
    InvalidDigestLength(usize),
    #[error("Private key is encrypted, but no passphrase source was given")]
    PassphraseRequired,
    #[error("Failed to read environment variable: {0:?}")]
    InvalidEnvVar(OsString, #[source] VarError),
    #[error("Failed to load encrypted RSA private key")]
    LoadKeyEncrypted(#[source] pkcs8::Error),
    #[error("Failed to load unencrypted RSA private key")]
    LoadKeyUnencrypted(#[source] pkcs8::Error),
    #[error("Failed to load RSA public key")]
    LoadPubKey(#[source] pkcs8::spki::Error),
    #[error("Failed to load X509 certificate")]
    LoadCert(#[source] x509_cert::der::Error),
    #[error("Failed to RSA sign digest")]
    RsaSign(#[source] Box<rsa::Error>),
    #[error("Failed to RSA verify signature")]
    RsaVerify(#[source] Box<rsa::Error>),
    #[error("Failed to read file: {0:?}")]
    ReadFile(PathBuf, #[source] io::Error),
}

type Result<T> = std::result::Result<T, Error>;

/// Where to get the passphrase for an encrypted private key from. There is no
/// interactive prompt.
#[derive(Clone, Debug, Default)]
pub enum PassphraseSource {
    #[default]
    None,
    EnvVar(OsString),
    File(PathBuf),
}

impl PassphraseSource {
    pub fn new(pass_file: Option<&Path>, env_var: Option<&OsStr>) -> Self {
        if let Some(v) = env_var {
            Self::EnvVar(v.to_owned())
        } else if let Some(p) = pass_file {
            Self::File(p.to_owned())
        } else {
            Self::None
        }
    }

    /// Get the passphrase. An empty string is returned if there is no source.
    pub fn acquire(&self) -> Result<String> {
        let passphrase = match self {
            Self::None => String::new(),
            Self::EnvVar(v) => env::var(v).map_err(|e| Error::InvalidEnvVar(v.clone(), e))?,
            Self::File(p) => fs::read_to_string(p)
                .map_err(|e| Error::ReadFile(p.clone(), e))?
                .trim_end_matches(['\r', '\n'])
                .to_owned(),
        };

        Ok(passphrase)
    }
}

fn check_key_size(size: usize) -> Result<()> {
    // RustCrypto does not support 8192-bit keys.
    if size > 4096 / 8 {
        return Err(Error::UnsupportedKeySize(size));
    }

    Ok(())
}

/// Sign a SHA-256 digest with RSA PKCS#1 v1.5. The digest is wrapped in a
/// DigestInfo by the RSA primitive. `rng` is only used for blinding.
pub fn sign_digest(
    key: &RsaPrivateKey,
    rng: &mut (impl CryptoRng + RngCore),
    digest: &[u8],
) -> Result<Vec<u8>> {
    if digest.len() != Sha256::output_size() {
        return Err(Error::InvalidDigestLength(digest.len()));
    }

    check_key_size(key.size())?;

    key.sign_with_rng(rng, Pkcs1v15Sign::new::<Sha256>(), digest)
        .map_err(|e| Error::RsaSign(Box::new(e)))
}

/// Verify an RSA PKCS#1 v1.5 signature over a SHA-256 digest.
pub fn verify_digest(key: &RsaPublicKey, digest: &[u8], signature: &[u8]) -> Result<()> {
    // Check this explicitly so we can provide a better error message.
    if digest.len() != Sha256::output_size() {
        return Err(Error::InvalidDigestLength(digest.len()));
    }

    check_key_size(key.size())?;

    key.verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
        .map_err(|e| Error::RsaVerify(Box::new(e)))
}

/// Read a certificate from a reader. PEM is detected by its header line and
/// anything else is parsed as DER.
pub fn read_cert(path: &Path, mut reader: impl Read) -> Result<Certificate> {
    let mut data = vec![];
    reader
        .read_to_end(&mut data)
        .map_err(|e| Error::ReadFile(path.to_owned(), e))?;

    let certificate = if data.starts_with(b"-----BEGIN") {
        Certificate::from_pem(data)
    } else {
        Certificate::from_der(&data)
    }
    .map_err(Error::LoadCert)?;

    Ok(certificate)
}

/// Read a PEM or DER certificate from a file.
pub fn read_cert_file(path: &Path) -> Result<Certificate> {
    let reader = File::open(path).map_err(|e| Error::ReadFile(path.to_owned(), e))?;

    read_cert(path, reader)
}

/// Read PEM-encoded PKCS8 private key from a reader.
pub fn read_pem_key(
    path: &Path,
    mut reader: impl Read,
    source: &PassphraseSource,
) -> Result<RsaPrivateKey> {
    let mut data = String::new();
    reader
        .read_to_string(&mut data)
        .map_err(|e| Error::ReadFile(path.to_owned(), e))?;

    if data.contains("ENCRYPTED") {
        if let PassphraseSource::None = source {
            return Err(Error::PassphraseRequired);
        }

        let passphrase = source.acquire()?;

        RsaPrivateKey::from_pkcs8_encrypted_pem(&data, passphrase).map_err(Error::LoadKeyEncrypted)
    } else {
        RsaPrivateKey::from_pkcs8_pem(&data).map_err(Error::LoadKeyUnencrypted)
    }
}

/// Read PEM-encoded PKCS8 private key from a file.
pub fn read_pem_key_file(path: &Path, source: &PassphraseSource) -> Result<RsaPrivateKey> {
    let reader = File::open(path).map_err(|e| Error::ReadFile(path.to_owned(), e))?;

    read_pem_key(path, reader, source)
}

/// Get the RSA public key from a certificate.
pub fn get_public_key(cert: &Certificate) -> Result<RsaPublicKey> {
    let public_key =
        RsaPublicKey::try_from(cert.tbs_certificate.subject_public_key_info.owned_to_ref())
            .map_err(Error::LoadPubKey)?;

    Ok(public_key)
}

/// Check if a certificate matches a private key.
pub fn cert_matches_key(cert: &Certificate, key: &RsaPrivateKey) -> Result<bool> {
    let public_key = get_public_key(cert)?;

    Ok(key.to_public_key() == public_key)
}
