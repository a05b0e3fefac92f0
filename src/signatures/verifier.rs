//! PDF signature verification.
//!
//! This module checks signatures produced by the signing pipeline: the
//! ByteRange must cover the whole file except the `/Contents` slot, the
//! recomputed digest must equal the CMS message-digest attribute, and the
//! RSA signature over the signed attributes must verify with the embedded
//! signer certificate. Certificate trust is not evaluated.

use super::byterange::ByteRangeCalculator;
use super::pkcs12::certificate_public_key;
use super::signer::{OID_MESSAGE_DIGEST, OID_SIGNED_DATA};
use super::types::{
    DigestAlgorithm, SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus,
};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use der::{Decode, Encode, SliceReader, Tagged};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::RsaPublicKey;
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier;
use x509_cert::Certificate;

/// Outcome of checking a CMS structure on its own.
#[derive(Debug, Clone)]
pub struct CmsCheck {
    /// Digest algorithm of the signer info
    pub digest_algorithm: DigestAlgorithm,
    /// message-digest signed attribute
    pub claimed_digest: Vec<u8>,
    /// Whether the RSA signature over the signed attributes verifies
    pub signature_valid: bool,
    /// DER of the signer certificate
    pub signer_certificate: Vec<u8>,
}

/// Decode a DER `ContentInfo` (trailing slot padding allowed) and verify
/// its single signer.
pub fn verify_cms(contents: &[u8]) -> Result<CmsCheck> {
    let mut reader = SliceReader::new(contents).map_err(cms_error)?;
    let content_info = ContentInfo::decode(&mut reader).map_err(cms_error)?;
    if content_info.content_type != OID_SIGNED_DATA {
        return Err(Error::InvalidPdf(format!(
            "CMS content type {} is not signed-data",
            content_info.content_type
        )));
    }
    let signed_data =
        SignedData::from_der(&content_info.content.to_der().map_err(cms_error)?).map_err(cms_error)?;

    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::InvalidPdf("CMS structure has no signer".to_string()))?;
    let digest_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid).ok_or_else(|| {
        Error::InvalidPdf(format!("unsupported digest algorithm {}", signer_info.digest_alg.oid))
    })?;
    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| Error::InvalidPdf("CMS signer has no signed attributes".to_string()))?;

    let claimed_digest = signed_attrs
        .iter()
        .find(|attr| attr.oid == OID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .filter(|value| value.tag() == der::Tag::OctetString)
        .map(|value| value.value().to_vec())
        .ok_or_else(|| Error::InvalidPdf("CMS signer has no message digest".to_string()))?;

    let certificate = find_signer_certificate(&signed_data, &signer_info.sid)
        .ok_or_else(|| Error::InvalidPdf("signer certificate is not embedded".to_string()))?;
    let public_key = certificate_public_key(certificate)
        .ok_or_else(|| Error::InvalidPdf("signer certificate has no RSA key".to_string()))?;

    let message = signed_attrs.to_der().map_err(cms_error)?;
    let signature_valid = rsa_verify(
        public_key,
        digest_algorithm,
        &message,
        signer_info.signature.as_bytes(),
    );

    Ok(CmsCheck {
        digest_algorithm,
        claimed_digest,
        signature_valid,
        signer_certificate: certificate.to_der().map_err(cms_error)?,
    })
}

fn find_signer_certificate<'d>(
    signed_data: &'d SignedData,
    sid: &SignerIdentifier,
) -> Option<&'d Certificate> {
    let SignerIdentifier::IssuerAndSerialNumber(id) = sid else {
        return None;
    };
    signed_data
        .certificates
        .as_ref()?
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Some(cert),
            _ => None,
        })
        .find(|cert| {
            cert.tbs_certificate.issuer == id.issuer
                && cert.tbs_certificate.serial_number == id.serial_number
        })
}

fn rsa_verify(
    key: RsaPublicKey,
    algorithm: DigestAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    match algorithm {
        DigestAlgorithm::Sha256 => VerifyingKey::<Sha256>::new(key).verify(message, &signature),
        DigestAlgorithm::Sha384 => VerifyingKey::<Sha384>::new(key).verify(message, &signature),
        DigestAlgorithm::Sha512 => VerifyingKey::<Sha512>::new(key).verify(message, &signature),
    }
    .is_ok()
}

fn cms_error(e: der::Error) -> Error {
    Error::InvalidPdf(format!("malformed CMS signature: {}", e))
}

/// Subject common name of a DER certificate.
pub(crate) fn certificate_common_name(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let cn = cert.subject().iter_common_name().next()?;
    cn.as_str().ok().map(str::to_string)
}

fn certificate_issuer(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    Some(cert.issuer().to_string())
}

/// Verifier for PDF digital signatures.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new signature verifier.
    pub fn new() -> Self {
        Self
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = sig_dict
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Signature must be a dictionary".to_string()))?;

        let text = |key: &str| dict.get(key).and_then(Object::as_text);
        let mut info = SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            ..SignatureInfo::default()
        };

        if let Some(byte_range) = dict.get("ByteRange").and_then(Object::as_array) {
            info.byte_range = byte_range.iter().filter_map(Object::as_integer).collect();
        }

        Ok(info)
    }

    /// Verify one signature dictionary against the file it was read from.
    pub fn verify(&self, pdf_data: &[u8], sig_dict: &Object) -> Result<VerificationResult> {
        let mut result = VerificationResult {
            signature_info: self.extract_signature_info(sig_dict)?,
            ..VerificationResult::default()
        };

        let byte_range: [i64; 4] = match result.signature_info.byte_range.as_slice().try_into() {
            Ok(br) => br,
            Err(_) => {
                result.status = VerificationStatus::Invalid;
                result
                    .messages
                    .push("Invalid ByteRange: expected 4 elements".to_string());
                return Ok(result);
            },
        };

        if let Err(e) = ByteRangeCalculator::validate_byte_range(&byte_range, pdf_data.len()) {
            result.status = VerificationStatus::Invalid;
            result
                .messages
                .push(format!("ByteRange validation failed: {}", e));
            return Ok(result);
        }

        let contents = match sig_dict.as_dict().and_then(|d| d.get("Contents")) {
            Some(Object::String(bytes)) => bytes.as_slice(),
            _ => {
                result.status = VerificationStatus::Invalid;
                result.messages.push("Signature has no /Contents".to_string());
                return Ok(result);
            },
        };

        if let Err(e) = ByteRangeCalculator::validate_contents_gap(pdf_data, &byte_range, contents.len()) {
            result.status = VerificationStatus::Invalid;
            result.messages.push(format!("ByteRange validation failed: {}", e));
            return Ok(result);
        }
        result.signature_info.covers_whole_document = true;

        let check = match verify_cms(contents) {
            Ok(check) => check,
            Err(e) => {
                result.status = VerificationStatus::Invalid;
                result.messages.push(e.to_string());
                return Ok(result);
            },
        };

        result.computed_digest =
            ByteRangeCalculator::digest_byte_range(pdf_data, &byte_range, check.digest_algorithm)?;
        result.digest_matches = result.computed_digest == check.claimed_digest;
        result.signature_valid = check.signature_valid;

        let info = &mut result.signature_info;
        info.digest_algorithm = Some(check.digest_algorithm);
        info.claimed_digest = check.claimed_digest;
        info.certificate_cn = certificate_common_name(&check.signer_certificate);
        info.certificate_issuer = certificate_issuer(&check.signer_certificate);

        if !result.digest_matches {
            result
                .messages
                .push("Document digest does not match the signed message digest".to_string());
        }
        if !result.signature_valid {
            result
                .messages
                .push("RSA signature over the signed attributes is invalid".to_string());
        }
        result.status = if result.digest_matches && result.signature_valid {
            VerificationStatus::Valid
        } else {
            VerificationStatus::Invalid
        };
        Ok(result)
    }

    /// Verify every signature field of an AcroForm.
    pub fn verify_document(&self, doc: &PdfDocument) -> Result<Vec<VerificationResult>> {
        signature_dictionaries(doc)?
            .iter()
            .map(|sig| self.verify(doc.bytes(), sig))
            .collect()
    }

    /// Quick check if a signature appears valid (without full cryptographic verification).
    pub fn quick_check(&self, sig_dict: &Object) -> Result<bool> {
        let info = self.extract_signature_info(sig_dict)?;
        Ok(info.byte_range.len() == 4 && info.sub_filter.is_some())
    }
}

/// Signature dictionaries (`/V` of `/FT /Sig` fields) reachable from the catalog.
pub fn signature_dictionaries(doc: &PdfDocument) -> Result<Vec<Object>> {
    let catalog = doc.catalog()?;
    let Some(acro_form) = doc.get_resolved(&catalog, "AcroForm")? else {
        return Ok(Vec::new());
    };
    let Some(acro_form) = acro_form.as_dict() else {
        return Ok(Vec::new());
    };
    let fields = match doc.get_resolved(acro_form, "Fields")? {
        Some(Object::Array(fields)) => fields,
        _ => return Ok(Vec::new()),
    };

    let mut signatures = Vec::new();
    for field in &fields {
        let field = doc.resolve_object(field)?;
        let Some(field) = field.as_dict() else {
            continue;
        };
        if !is_signature_field(field) {
            continue;
        }
        if let Some(value) = doc.get_resolved(field, "V")? {
            signatures.push(value);
        }
    }
    Ok(signatures)
}

fn is_signature_field(field: &Dictionary) -> bool {
    field.get("FT").and_then(Object::as_name) == Some("Sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sig_dict() -> Object {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
        dict.insert("SubFilter".to_string(), Object::name("adbe.pkcs7.detached"));
        dict.insert("Name".to_string(), Object::String(b"Test Signer".to_vec()));
        dict.insert("Reason".to_string(), Object::String(b"Testing".to_vec()));
        dict.insert("Location".to_string(), Object::String(b"Test City".to_vec()));
        dict.insert("M".to_string(), Object::String(b"D:20240101120000+00'00'".to_vec()));
        dict.insert(
            "ByteRange".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(200),
                Object::Integer(50),
            ]),
        );
        Object::Dictionary(dict)
    }

    #[test]
    fn test_extract_signature_info() {
        let verifier = SignatureVerifier::new();
        let info = verifier.extract_signature_info(&make_sig_dict()).unwrap();

        assert_eq!(info.signer_name, Some("Test Signer".to_string()));
        assert_eq!(info.reason, Some("Testing".to_string()));
        assert_eq!(info.location, Some("Test City".to_string()));
        assert_eq!(info.sub_filter, Some(SignatureSubFilter::Pkcs7Detached));
        assert_eq!(info.byte_range, vec![0, 100, 200, 50]);
        // Only set once verify() has checked the file
        assert!(!info.covers_whole_document);
    }

    #[test]
    fn test_quick_check() {
        let verifier = SignatureVerifier::new();
        assert!(verifier.quick_check(&make_sig_dict()).unwrap());

        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("SubFilter".to_string(), Object::name("adbe.pkcs7.detached"));
        assert!(!verifier.quick_check(&Object::Dictionary(dict)).unwrap());
    }

    #[test]
    fn test_byte_range_not_covering_file() {
        let verifier = SignatureVerifier::new();
        let result = verifier.verify(&[b' '; 300], &make_sig_dict()).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(result.messages[0].contains("ByteRange"));
    }

    #[test]
    fn test_garbage_contents_are_invalid() {
        let verifier = SignatureVerifier::new();
        let mut sig = make_sig_dict();
        if let Object::Dictionary(dict) = &mut sig {
            dict.insert("Contents".to_string(), Object::String(vec![0x30, 0x03, 0x02, 0x01]));
        }
        let result = verifier.verify(&[b' '; 250], &sig).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(!result.signature_valid);
    }

    fn sig_dict_with(byte_range: [i64; 4], contents: Vec<u8>) -> Object {
        let mut sig = make_sig_dict();
        if let Object::Dictionary(dict) = &mut sig {
            dict.insert(
                "ByteRange".to_string(),
                Object::Array(byte_range.iter().map(|v| Object::Integer(*v)).collect()),
            );
            dict.insert("Contents".to_string(), Object::String(contents));
        }
        sig
    }

    /// `head`, the hex slot, `extra` unsigned bytes, `tail`.
    fn signed_layout(extra: &[u8]) -> (Vec<u8>, [i64; 4], Vec<u8>) {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_signer.p12");
        let identity = crate::signatures::pkcs12::load_identity(path, "test").unwrap();
        let signer = crate::signatures::signer::DetachedSigner::new(&identity);
        let (head, tail) = (b"aaaaaaaaaa", b"bbbbbbbbbb");
        let digest = signer.digest_algorithm().digest_parts(&[&head[..], &tail[..]]);
        let cms = signer.sign_digest(&digest, chrono::Utc::now()).unwrap();

        let mut data = head.to_vec();
        data.push(b'<');
        data.extend_from_slice(crate::writer::hex_upper(&cms).as_bytes());
        data.push(b'>');
        data.extend_from_slice(extra);
        let offset2 = data.len() as i64;
        data.extend_from_slice(tail);
        (data, [0, head.len() as i64, offset2, tail.len() as i64], cms)
    }

    #[test]
    fn test_gap_holding_only_contents_is_valid() {
        let (data, byte_range, cms) = signed_layout(b"");
        let result = SignatureVerifier::new()
            .verify(&data, &sig_dict_with(byte_range, cms))
            .unwrap();
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        assert!(result.signature_info.covers_whole_document);
    }

    #[test]
    fn test_unsigned_bytes_in_gap_are_invalid() {
        let (data, byte_range, cms) = signed_layout(b"/Injected (unsigned) ");
        let result = SignatureVerifier::new()
            .verify(&data, &sig_dict_with(byte_range, cms))
            .unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(!result.signature_info.covers_whole_document);
        assert!(result.messages[0].contains("ByteRange"));
    }

    #[test]
    fn test_overflowing_byte_range_does_not_panic() {
        let sig = sig_dict_with([0, 10, i64::MAX, 1], vec![0x30, 0x00]);
        let result = SignatureVerifier::new().verify(&[b' '; 100], &sig).unwrap();
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(!result.signature_info.covers_whole_document);
    }

    #[test]
    fn test_common_name_of_garbage() {
        assert_eq!(certificate_common_name(b"not a certificate"), None);
    }
}
