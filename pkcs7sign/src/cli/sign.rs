/*
 * SPDX-FileCopyrightText: 2026 Andrew Gunnerson
 * SPDX-License-Identifier: GPL-3.0-only
 */

use std::{ffi::OsString, fs, fs::File, path::PathBuf, sync::atomic::AtomicBool};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser};
use tracing::info;

use crate::{
    crypto::{self, PassphraseSource},
    sign::Pkcs7Signer,
};

pub fn sign_main(cli: &SignCli, cancel_signal: &AtomicBool) -> Result<()> {
    let source = cli.passphrase.to_source();

    let key = crypto::read_pem_key_file(&cli.key, &source)
        .with_context(|| format!("Failed to load key: {:?}", cli.key))?;
    let cert = crypto::read_cert_file(&cli.cert)
        .with_context(|| format!("Failed to load certificate: {:?}", cli.cert))?;
    let intermediate = cli
        .intermediate
        .as_ref()
        .map(|p| {
            crypto::read_cert_file(p)
                .with_context(|| format!("Failed to load intermediate certificate: {p:?}"))
        })
        .transpose()?;

    if !crypto::cert_matches_key(&cert, &key)? {
        bail!(
            "Private key {:?} does not match certificate {:?}",
            cli.key,
            cli.cert,
        );
    }

    let file = File::open(&cli.input)
        .with_context(|| format!("Failed to open for reading: {:?}", cli.input))?;

    let envelope = Pkcs7Signer::new(&cert, &key)
        .intermediate(intermediate.as_ref())
        .cancel_signal(cancel_signal)
        .sign(file)
        .with_context(|| format!("Failed to sign: {:?}", cli.input))?;

    fs::write(&cli.output, &envelope)
        .with_context(|| format!("Failed to write signature: {:?}", cli.output))?;

    info!("Wrote {} byte signature: {:?}", envelope.len(), cli.output);

    Ok(())
}

#[derive(Debug, Args)]
pub struct PassphraseGroup {
    /// Environment variable containing the private key passphrase.
    #[arg(long, value_name = "ENV_VAR", value_parser, group = "pass")]
    pub pass_env_var: Option<OsString>,

    /// File containing the private key passphrase.
    #[arg(long, value_name = "FILE", value_parser, group = "pass")]
    pub pass_file: Option<PathBuf>,
}

impl PassphraseGroup {
    fn to_source(&self) -> PassphraseSource {
        PassphraseSource::new(self.pass_file.as_deref(), self.pass_env_var.as_deref())
    }
}

/// Create a detached PKCS#7 signature for a file.
///
/// The output is a DER-encoded ContentInfo containing SignedData with a single
/// RSA PKCS#1 v1.5 + SHA-256 signer.
#[derive(Debug, Parser)]
pub struct SignCli {
    /// Path to file to sign.
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub input: PathBuf,

    /// Path to output DER-encoded signature.
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub output: PathBuf,

    /// Path to signing private key.
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub key: PathBuf,

    #[command(flatten)]
    pub passphrase: PassphraseGroup,

    /// Path to signing certificate (PEM or DER).
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub cert: PathBuf,

    /// Path to intermediate certificate to include (PEM or DER).
    #[arg(long, value_name = "FILE", value_parser)]
    pub intermediate: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use assert_matches::assert_matches;
    use clap::error::ErrorKind;

    use super::*;

    const BASE_ARGS: [&str; 9] = [
        "sign", "-i", "input", "-o", "output.p7s", "-k", "key.pem", "-c", "cert.pem",
    ];

    #[test]
    fn passphrase_from_file() {
        let args = BASE_ARGS.into_iter().chain(["--pass-file", "pass.txt"]);
        let cli = SignCli::try_parse_from(args).unwrap();

        assert_matches!(
            cli.passphrase.to_source(),
            PassphraseSource::File(p) if p == Path::new("pass.txt")
        );
        assert_eq!(cli.intermediate, None);
    }

    #[test]
    fn passphrase_sources_conflict() {
        let args = BASE_ARGS
            .into_iter()
            .chain(["--pass-file", "pass.txt", "--pass-env-var", "PASS"]);
        let err = SignCli::try_parse_from(args).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn no_passphrase_source() {
        let cli = SignCli::try_parse_from(BASE_ARGS).unwrap();

        assert_matches!(cli.passphrase.to_source(), PassphraseSource::None);
    }
}
