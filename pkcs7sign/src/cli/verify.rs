/*
 * SPDX-FileCopyrightText: 2026 Andrew Gunnerson
 * SPDX-License-Identifier: GPL-3.0-only
 */

use std::{fs, fs::File, path::PathBuf, sync::atomic::AtomicBool};

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::{
    cli::{status, warning},
    crypto, verify,
};

pub fn verify_main(cli: &VerifyCli, cancel_signal: &AtomicBool) -> Result<()> {
    let envelope = fs::read(&cli.signature)
        .with_context(|| format!("Failed to read signature: {:?}", cli.signature))?;

    let file = File::open(&cli.input)
        .with_context(|| format!("Failed to open for reading: {:?}", cli.input))?;

    let verified = verify::verify_cancellable(file, &envelope, cancel_signal)
        .with_context(|| format!("Failed to verify: {:?}", cli.input))?;

    status!("Signed by: {}", verified.signer.tbs_certificate.subject);

    if let Some(time) = &verified.signing_time {
        status!("Signing time: {}", time.to_date_time());
    }

    status!("Message digest: {}", hex::encode(&verified.message_digest));

    if let Some(p) = &cli.cert {
        let cert = crypto::read_cert_file(p)
            .with_context(|| format!("Failed to load certificate: {p:?}"))?;

        if cert != verified.signer {
            bail!("Signer does not match certificate {p:?}");
        }

        status!("Signer matches certificate: {p:?}");
    } else {
        warning!("Signer certificate was not checked against a trusted certificate");
    }

    Ok(())
}

/// Verify a detached PKCS#7 signature.
///
/// Only the signature itself is checked. The signer's certificate chain is not
/// validated. Use --cert to require a specific signer.
#[derive(Debug, Parser)]
pub struct VerifyCli {
    /// Path to signed file.
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub input: PathBuf,

    /// Path to DER-encoded signature.
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub signature: PathBuf,

    /// Path to the expected signer certificate (PEM or DER).
    #[arg(short, long, value_name = "FILE", value_parser)]
    pub cert: Option<PathBuf>,
}
