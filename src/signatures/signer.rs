//! Detached CMS signature creation.
//!
//! Builds an RFC 5652 `SignedData` with detached `id-data` content, one
//! `SignerInfo` identified by issuer and serial number, and the signed
//! attributes content-type, signing-time and message-digest. The signature
//! is RSA PKCS#1 v1.5 over the DER `SET OF` signed attributes.

use super::byterange::ByteRangeCalculator;
use super::types::{DigestAlgorithm, SigningIdentity, OID_RSA_ENCRYPTION};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
    SignerInfos,
};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::{GeneralizedTime, Null, OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, Encode};
use rsa::pkcs1v15::SigningKey;
use rsa::RsaPrivateKey;
use sha2::{Sha256, Sha384, Sha512};
use signature::{SignatureEncoding, Signer};
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;
use x509_cert::attr::Attribute;

/// `id-data`
pub const OID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// `id-signedData`
pub const OID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
/// `id-contentType` signed attribute
pub const OID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
/// `id-messageDigest` signed attribute
pub const OID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
/// `id-signingTime` signed attribute
pub const OID_SIGNING_TIME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// Produces detached CMS signatures for a signing identity.
pub struct DetachedSigner<'a> {
    identity: &'a SigningIdentity,
    digest_algorithm: DigestAlgorithm,
    reserved_size: usize,
}

impl<'a> DetachedSigner<'a> {
    /// Signer with SHA-256 and the default reserved slot size.
    pub fn new(identity: &'a SigningIdentity) -> Self {
        Self {
            identity,
            digest_algorithm: DigestAlgorithm::default(),
            reserved_size: crate::config::DEFAULT_RESERVED_SIGNATURE_SIZE,
        }
    }

    /// Use `algorithm` for the message digest and the RSA signature.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Reject signatures larger than `size` DER bytes.
    pub fn with_reserved_size(mut self, size: usize) -> Self {
        self.reserved_size = size;
        self
    }

    /// Digest algorithm in use.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Sign `document` with the bytes outside `byte_range` excluded.
    pub fn sign(
        &self,
        document: &[u8],
        byte_range: &[i64; 4],
        signing_time: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        let digest =
            ByteRangeCalculator::digest_byte_range(document, byte_range, self.digest_algorithm)?;
        self.sign_digest(&digest, signing_time)
    }

    /// Build the DER `ContentInfo` for an already computed document digest.
    ///
    /// Fails with [`Error::PlaceholderTooSmall`] if the encoding exceeds the
    /// reserved size.
    pub fn sign_digest(&self, digest: &[u8], signing_time: DateTime<Utc>) -> Result<Vec<u8>> {
        if digest.len() != self.digest_algorithm.output_len() {
            return Err(Error::Signing(format!(
                "{} digest must be {} bytes, got {}",
                self.digest_algorithm.name(),
                self.digest_algorithm.output_len(),
                digest.len()
            )));
        }

        let signed_attrs = signed_attributes(digest, signing_time).map_err(der_error)?;
        let to_sign = signed_attrs.to_der().map_err(der_error)?;
        let signature = rsa_sign(&self.identity.private_key, self.digest_algorithm, &to_sign)?;

        let certificate = &self.identity.certificate;
        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: certificate.tbs_certificate.issuer.clone(),
                serial_number: certificate.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: digest_algorithm_identifier(self.digest_algorithm),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: OID_RSA_ENCRYPTION,
                parameters: Some(to_any(&Null).map_err(der_error)?),
            },
            signature: OctetString::new(signature).map_err(der_error)?,
            unsigned_attrs: None,
        };

        let certificates = std::iter::once(certificate)
            .chain(self.identity.chain.iter())
            .map(|cert| CertificateChoices::Certificate(cert.clone()))
            .collect::<Vec<_>>();

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![digest_algorithm_identifier(
                self.digest_algorithm,
            )])
            .map_err(der_error)?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: OID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(
                SetOfVec::try_from(certificates).map_err(der_error)?,
            )),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info]).map_err(der_error)?),
        };

        let content_info = ContentInfo {
            content_type: OID_SIGNED_DATA,
            content: to_any(&signed_data).map_err(der_error)?,
        };
        let der = content_info.to_der().map_err(der_error)?;

        if der.len() > self.reserved_size {
            return Err(Error::PlaceholderTooSmall {
                required: der.len(),
                available: self.reserved_size,
            });
        }
        log::debug!(
            "CMS signature: {} bytes, {} with RSA, {} certificates",
            der.len(),
            self.digest_algorithm.name(),
            1 + self.identity.chain.len()
        );
        Ok(der)
    }
}

fn signed_attributes(digest: &[u8], signing_time: DateTime<Utc>) -> der::Result<SetOfVec<Attribute>> {
    let attrs = vec![
        attribute(OID_CONTENT_TYPE, to_any(&OID_DATA)?)?,
        attribute(OID_SIGNING_TIME, signing_time_value(signing_time)?)?,
        attribute(OID_MESSAGE_DIGEST, to_any(&OctetString::new(digest.to_vec())?)?)?,
    ];
    SetOfVec::try_from(attrs)
}

fn attribute(oid: ObjectIdentifier, value: Any) -> der::Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// UTCTime through 2049, GeneralizedTime afterwards.
fn signing_time_value(time: DateTime<Utc>) -> der::Result<Any> {
    let secs = u64::try_from(time.timestamp()).map_err(|_| der::Tag::UtcTime.value_error())?;
    let duration = Duration::from_secs(secs);
    match UtcTime::from_unix_duration(duration) {
        Ok(utc) => to_any(&utc),
        Err(_) => to_any(&GeneralizedTime::from_unix_duration(duration)?),
    }
}

fn digest_algorithm_identifier(algorithm: DigestAlgorithm) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: algorithm.oid(),
        parameters: None,
    }
}

pub(crate) fn to_any<T: Encode>(value: &T) -> der::Result<Any> {
    Any::from_der(&value.to_der()?)
}

fn der_error(e: der::Error) -> Error {
    Error::Signing(format!("DER encoding failed: {}", e))
}

fn rsa_sign(key: &RsaPrivateKey, algorithm: DigestAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
    fn run<D>(key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>>
    where
        D: sha2::Digest + AssociatedOid,
    {
        let signing_key = SigningKey::<D>::new(key.clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| Error::Signing(format!("RSA signing failed: {}", e)))?;
        Ok(signature.to_vec())
    }
    match algorithm {
        DigestAlgorithm::Sha256 => run::<Sha256>(key, message),
        DigestAlgorithm::Sha384 => run::<Sha384>(key, message),
        DigestAlgorithm::Sha512 => run::<Sha512>(key, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::pkcs12::load_identity;
    use crate::signatures::verifier::verify_cms;
    use chrono::TimeZone;

    fn identity() -> SigningIdentity {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_signer.p12");
        load_identity(path, "test").unwrap()
    }

    fn time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_signature_is_content_info() {
        let identity = identity();
        let digest = DigestAlgorithm::Sha256.digest(b"document bytes");
        let der = DetachedSigner::new(&identity).sign_digest(&digest, time()).unwrap();

        let content_info = ContentInfo::from_der(&der).unwrap();
        assert_eq!(content_info.content_type, OID_SIGNED_DATA);
        let signed_data = SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap();
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.signer_infos.0.len(), 1);
        assert_eq!(signed_data.certificates.unwrap().0.len(), 2);
    }

    #[test]
    fn test_signature_verifies() {
        let identity = identity();
        let digest = DigestAlgorithm::Sha256.digest(b"document bytes");
        let der = DetachedSigner::new(&identity).sign_digest(&digest, time()).unwrap();

        let check = verify_cms(&der).unwrap();
        assert_eq!(check.claimed_digest, digest);
        assert!(check.signature_valid);
        assert_eq!(check.digest_algorithm, DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_sha512_signature_verifies() {
        let identity = identity();
        let digest = DigestAlgorithm::Sha512.digest(b"document bytes");
        let der = DetachedSigner::new(&identity)
            .with_digest_algorithm(DigestAlgorithm::Sha512)
            .sign_digest(&digest, time())
            .unwrap();
        let check = verify_cms(&der).unwrap();
        assert_eq!(check.digest_algorithm, DigestAlgorithm::Sha512);
        assert!(check.signature_valid);
    }

    #[test]
    fn test_sign_over_byte_range() {
        let identity = identity();
        let document = b"AAAA<0000>CCCC";
        let byte_range = [0, 4, 10, 4];
        let der = DetachedSigner::new(&identity)
            .sign(document, &byte_range, time())
            .unwrap();
        let check = verify_cms(&der).unwrap();
        assert_eq!(check.claimed_digest, DigestAlgorithm::Sha256.digest(b"AAAACCCC"));
    }

    #[test]
    fn test_oversized_signature_rejected() {
        let identity = identity();
        let digest = DigestAlgorithm::Sha256.digest(b"x");
        let err = DetachedSigner::new(&identity)
            .with_reserved_size(64)
            .sign_digest(&digest, time())
            .unwrap_err();
        match err {
            Error::PlaceholderTooSmall {
                required,
                available,
            } => {
                assert_eq!(available, 64);
                assert!(required > 64);
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_digest_length() {
        let identity = identity();
        let err = DetachedSigner::new(&identity)
            .sign_digest(&[0u8; 20], time())
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }
}
