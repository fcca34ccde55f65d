// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! RFC 2315 `SignedData` structures that aren't provided as-is by the `cms`
//! crate. CMS (RFC 5652) is a superset of PKCS#7 v1.5, so the version 1
//! building blocks are reused directly. The only structure that differs is
//! [`SignedData`] itself, because the certificates are stored as a raw
//! concatenation instead of a DER-sorted set.

use cms::{
    content_info::{CmsVersion, ContentInfo},
    revocation::RevocationInfoChoices,
    signed_data::{DigestAlgorithmIdentifiers, EncapsulatedContentInfo, SignerInfos},
};
use const_oid::ObjectIdentifier;
use der::{
    Any, Decode, DecodeOwned, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader,
    Sequence, SliceReader, SliceWriter, Tag, TagNumber, Tagged, Writer,
    asn1::{OctetString, SetOfVec},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_cert::{
    Certificate,
    attr::{Attribute, Attributes},
    time::Time,
};

use crate::oid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to decode PKCS#7 structure")]
    Decode(#[source] der::Error),
    #[error("Content type is not signedData: {0}")]
    NotSignedData(ObjectIdentifier),
    #[error("Attribute appears more than once: {0}")]
    DuplicateAttribute(ObjectIdentifier),
    #[error("Attribute has {1} values instead of 1: {0}")]
    AttributeValueCount(ObjectIdentifier, usize),
}

type Result<T> = std::result::Result<T, Error>;

/// The `SignedData` type as defined in RFC 2315 section 9.1.
///
/// ```text
/// SignedData ::= SEQUENCE {
///     version Version,
///     digestAlgorithms DigestAlgorithmIdentifiers,
///     contentInfo ContentInfo,
///     certificates [0] IMPLICIT ExtendedCertificatesAndCertificates OPTIONAL,
///     crls [1] IMPLICIT CertificateRevocationLists OPTIONAL,
///     signerInfos SignerInfos }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignedData {
    pub version: CmsVersion,
    pub digest_algorithms: DigestAlgorithmIdentifiers,
    pub content_info: EncapsulatedContentInfo,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub certificates: Option<CertificateBundle>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub crls: Option<RevocationInfoChoices>,
    pub signer_infos: SignerInfos,
}

impl SignedData {
    /// Wrap this structure in the outer [`ContentInfo`] with the `signedData`
    /// content type.
    pub fn to_content_info(&self) -> der::Result<ContentInfo> {
        Ok(ContentInfo {
            content_type: oid::PKCS7_SIGNED_DATA,
            content: Any::encode_from(self)?,
        })
    }
}

/// Parse the [`SignedData`] structure from a DER-encoded outer
/// [`ContentInfo`].
pub fn parse_envelope(data: &[u8]) -> Result<SignedData> {
    let ci = ContentInfo::from_der(data).map_err(Error::Decode)?;
    if ci.content_type != oid::PKCS7_SIGNED_DATA {
        return Err(Error::NotSignedData(ci.content_type));
    }

    ci.content
        .decode_as::<SignedData>()
        .map_err(Error::Decode)
}

/// The contents of the `certificates` field: the complete DER encodings of one
/// or more certificates, back to back. A SET OF encoding is exactly this, so no
/// re-encoding is needed. The order given by the caller is kept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateBundle(Vec<u8>);

impl CertificateBundle {
    /// Bundle the signer certificate and an optional intermediate certificate,
    /// in that order.
    pub fn new(signer: &Certificate, intermediate: Option<&Certificate>) -> der::Result<Self> {
        let mut data = signer.to_der()?;

        if let Some(cert) = intermediate {
            cert.encode_to_vec(&mut data)?;
        }

        Ok(Self(data))
    }

    /// Create a bundle from already concatenated DER certificates. The data
    /// must be non-empty and must not end with a partial certificate.
    pub fn from_der_concatenation(data: Vec<u8>) -> der::Result<Self> {
        Self::split(&data)?;

        Ok(Self(data))
    }

    fn split(data: &[u8]) -> der::Result<Vec<Certificate>> {
        if data.is_empty() {
            return Err(Tag::Set.value_error());
        }

        let mut reader = SliceReader::new(data)?;
        let mut certs = vec![];

        while !reader.is_finished() {
            certs.push(Certificate::decode(&mut reader)?);
        }

        Ok(certs)
    }

    /// Parse the individual certificates.
    pub fn certificates(&self) -> der::Result<Vec<Certificate>> {
        Self::split(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FixedTag for CertificateBundle {
    const TAG: Tag = Tag::Set;
}

impl EncodeValue for CertificateBundle {
    fn value_len(&self) -> der::Result<Length> {
        Length::try_from(self.0.len())
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(&self.0)
    }
}

impl<'a> DecodeValue<'a> for CertificateBundle {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let data = reader.read_vec(header.length)?;

        Self::from_der_concatenation(data)
    }
}

/// The outer tag to use when encoding [`AuthenticatedAttributes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributesTag {
    /// Universal SET OF (`0x31`). This is the encoding that the signature
    /// covers.
    Set,
    /// `[0] IMPLICIT` (`0xa0`). This is how the attributes are embedded in
    /// `SignerInfo`.
    Implicit,
}

impl AttributesTag {
    fn tag(self) -> Tag {
        match self {
            Self::Set => Tag::Set,
            Self::Implicit => Tag::ContextSpecific {
                constructed: true,
                number: TagNumber::N0,
            },
        }
    }
}

/// The authenticated attributes of a `SignerInfo`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthenticatedAttributes(Attributes);

impl AuthenticatedAttributes {
    /// Build the content-type, signing-time, and message-digest attributes.
    /// These are already in DER SET OF order when their values have the
    /// lengths used for PKCS#7 data with a SHA-256 digest.
    pub fn new(
        content_type: ObjectIdentifier,
        signing_time: Time,
        message_digest: &[u8],
    ) -> der::Result<Self> {
        let attrs = vec![
            single_value_attr(oid::PKCS9_CONTENT_TYPE, &content_type)?,
            single_value_attr(oid::PKCS9_SIGNING_TIME, &signing_time)?,
            single_value_attr(
                oid::PKCS9_MESSAGE_DIGEST,
                &OctetString::new(message_digest)?,
            )?,
        ];

        Ok(Self(SetOfVec::try_from(attrs)?))
    }

    /// Wrap attributes decoded from an existing `SignerInfo`.
    pub fn from_attributes(attrs: Attributes) -> Self {
        Self(attrs)
    }

    pub fn into_inner(self) -> Attributes {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    /// Encode the attributes with the specified outer tag. The content octets
    /// are the same for every tag.
    pub fn to_der_tagged(&self, tag: AttributesTag) -> der::Result<Vec<u8>> {
        let header = Header::new(tag.tag(), self.0.value_len()?)?;
        let len = (header.encoded_len()? + header.length)?;

        let mut buf = vec![0u8; usize::try_from(len)?];
        let mut writer = SliceWriter::new(&mut buf);
        header.encode(&mut writer)?;
        self.0.encode_value(&mut writer)?;
        writer.finish()?;

        Ok(buf)
    }

    /// Compute the SHA-256 digest of the [`AttributesTag::Set`] encoding. This
    /// is the value that gets signed.
    pub fn digest(&self) -> der::Result<[u8; 32]> {
        let encoded = self.to_der_tagged(AttributesTag::Set)?;

        Ok(Sha256::digest(&encoded).into())
    }

    /// Get the value of an attribute that may appear at most once and must
    /// have exactly one value.
    fn single_value(&self, oid: ObjectIdentifier) -> Result<Option<&Any>> {
        let mut found = None;

        for attr in self.0.iter().filter(|a| a.oid == oid) {
            if found.is_some() {
                return Err(Error::DuplicateAttribute(oid));
            } else if attr.values.len() != 1 {
                return Err(Error::AttributeValueCount(oid, attr.values.len()));
            }

            found = attr.values.iter().next();
        }

        Ok(found)
    }

    fn decode_single<T: DecodeOwned>(&self, oid: ObjectIdentifier) -> Result<Option<T>> {
        self.single_value(oid)?
            .map(decode_any::<T>)
            .transpose()
            .map_err(Error::Decode)
    }

    pub fn content_type(&self) -> Result<Option<ObjectIdentifier>> {
        self.decode_single(oid::PKCS9_CONTENT_TYPE)
    }

    pub fn signing_time(&self) -> Result<Option<Time>> {
        self.decode_single(oid::PKCS9_SIGNING_TIME)
    }

    pub fn message_digest(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .decode_single::<OctetString>(oid::PKCS9_MESSAGE_DIGEST)?
            .map(OctetString::into_bytes))
    }
}

fn single_value_attr(
    oid: ObjectIdentifier,
    value: &(impl Tagged + EncodeValue),
) -> der::Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![Any::encode_from(value)?])?,
    })
}

fn decode_any<T: DecodeOwned>(value: &Any) -> der::Result<T> {
    T::from_der(&value.to_der()?)
}
