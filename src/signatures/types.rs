//! Digital signature types and data structures.

use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::Certificate;

/// `id-sha256`, 2.16.840.1.101.3.4.2.1
pub const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
/// `id-sha384`, 2.16.840.1.101.3.4.2.2
pub const OID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
/// `id-sha512`, 2.16.840.1.101.3.4.2.3
pub const OID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");
/// `rsaEncryption`, 1.2.840.113549.1.1.1
pub const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// `sha256WithRSAEncryption`
pub const OID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
/// `sha384WithRSAEncryption`
pub const OID_SHA384_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
/// `sha512WithRSAEncryption`
pub const OID_SHA512_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-256 (recommended)
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Object identifier of the digest.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => OID_SHA256,
            DigestAlgorithm::Sha384 => OID_SHA384,
            DigestAlgorithm::Sha512 => OID_SHA512,
        }
    }

    /// Object identifier of RSA PKCS#1 v1.5 with this digest.
    pub fn rsa_signature_oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => OID_SHA256_WITH_RSA,
            DigestAlgorithm::Sha384 => OID_SHA384_WITH_RSA,
            DigestAlgorithm::Sha512 => OID_SHA512_WITH_RSA,
        }
    }

    /// Look up a digest by object identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [DigestAlgorithm::Sha256, DigestAlgorithm::Sha384, DigestAlgorithm::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Digest of the concatenation of `parts`.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }
        match self {
            DigestAlgorithm::Sha256 => run::<Sha256>(parts),
            DigestAlgorithm::Sha384 => run::<Sha384>(parts),
            DigestAlgorithm::Sha512 => run::<Sha512>(parts),
        }
    }

    /// Digest of `data`.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Private key and certificates loaded from a certificate bundle.
#[derive(Clone)]
pub struct SigningIdentity {
    /// RSA private key matching `certificate`
    pub private_key: rsa::RsaPrivateKey,
    /// Signer certificate
    pub certificate: Certificate,
    /// Remaining certificates of the bundle (intermediates, root)
    pub chain: Vec<Certificate>,
}

impl SigningIdentity {
    /// Subject common name of the signer certificate, if any.
    pub fn common_name(&self) -> Option<String> {
        use der::Encode;
        let der = self.certificate.to_der().ok()?;
        super::verifier::certificate_common_name(&der)
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.certificate.tbs_certificate.subject.to_string())
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// Descriptive entries of the signature dictionary.
#[derive(Debug, Clone)]
pub struct SignatureMetadata {
    /// /Name (signer display name)
    pub name: Option<String>,
    /// /Reason
    pub reason: Option<String>,
    /// /Location
    pub location: Option<String>,
    /// /ContactInfo
    pub contact_info: Option<String>,
    /// /M and the CMS signing-time attribute
    pub signing_time: DateTime<Utc>,
}

impl Default for SignatureMetadata {
    fn default() -> Self {
        Self {
            name: None,
            reason: None,
            location: None,
            contact_info: None,
            signing_time: Utc::now(),
        }
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// /Name of the signature dictionary
    pub signer_name: Option<String>,
    /// /M of the signature dictionary
    pub signing_time: Option<String>,
    /// /Reason
    pub reason: Option<String>,
    /// /Location
    pub location: Option<String>,
    /// /ContactInfo
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Whether the signature covers the whole document; set by verification
    pub covers_whole_document: bool,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Certificate subject common name
    pub certificate_cn: Option<String>,
    /// Certificate issuer
    pub certificate_issuer: Option<String>,
    /// Digest algorithm claimed by the signer
    pub digest_algorithm: Option<DigestAlgorithm>,
    /// message-digest attribute of the CMS structure
    pub claimed_digest: Vec<u8>,
}

/// Result of signature verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Overall verification status
    pub status: VerificationStatus,
    /// Signature information
    pub signature_info: SignatureInfo,
    /// Verification messages (errors, warnings)
    pub messages: Vec<String>,
    /// Digest recomputed over the byte range
    pub computed_digest: Vec<u8>,
    /// Whether the recomputed digest equals the claimed one
    pub digest_matches: bool,
    /// Whether the RSA signature over the signed attributes verifies
    pub signature_valid: bool,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            status: VerificationStatus::Unknown,
            signature_info: SignatureInfo::default(),
            messages: Vec::new(),
            computed_digest: Vec::new(),
            digest_matches: false,
            signature_valid: false,
        }
    }
}

/// Verification status of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Signature is valid
    Valid,
    /// Signature is invalid (cryptographically)
    Invalid,
    /// Signature could not be evaluated
    Unknown,
}

impl VerificationStatus {
    /// Check if the status indicates a valid signature.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationStatus::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_names() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_digest_oids_round_trip() {
        for alg in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha384, DigestAlgorithm::Sha512] {
            assert_eq!(DigestAlgorithm::from_oid(&alg.oid()), Some(alg));
            assert_eq!(alg.digest(b"abc").len(), alg.output_len());
        }
        assert_eq!(DigestAlgorithm::from_oid(&OID_RSA_ENCRYPTION), None);
    }

    #[test]
    fn test_digest_parts_equals_concatenation() {
        let alg = DigestAlgorithm::Sha256;
        assert_eq!(alg.digest_parts(&[b"AAA", b"CCC"]), alg.digest(b"AAACCC"));
    }

    #[test]
    fn test_sha256_known_vector() {
        let digest = DigestAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            digest[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") starts with ba7816bf"
        );
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("adbe.pkcs7.detached"),
            Some(SignatureSubFilter::Pkcs7Detached)
        );
        assert_eq!(SignatureSubFilter::from_pdf_name("adbe.x509.rsa_sha1"), None);
    }

    #[test]
    fn test_verification_status() {
        assert!(VerificationStatus::Valid.is_valid());
        assert!(!VerificationStatus::Invalid.is_valid());
        assert!(!VerificationStatus::Unknown.is_valid());
    }
}
