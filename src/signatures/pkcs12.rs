//! Signing identity loading from PKCS#12 (.p12/.pfx) bundles.

use crate::error::{Error, Result};
use crate::signatures::SigningIdentity;
use der::{Decode, Encode};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;
use x509_cert::Certificate;

/// Read a bundle from disk and unlock it with `passphrase`.
///
/// A missing file is reported as [`Error::CertificateNotFound`]; other
/// read failures keep their path.
pub fn load_identity(path: impl AsRef<Path>, passphrase: &str) -> Result<SigningIdentity> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::CertificateNotFound(path.to_path_buf()),
        _ => Error::io(path, e),
    })?;
    let identity = parse_identity(&bytes, passphrase)?;
    log::info!(
        "Loaded signing identity from {} ({} chain certificates)",
        path.display(),
        identity.chain.len()
    );
    Ok(identity)
}

/// Unlock an in-memory bundle.
///
/// The signer certificate is the one whose public key matches the private
/// key; every other certificate in the bundle becomes the chain.
pub fn parse_identity(bytes: &[u8], passphrase: &str) -> Result<SigningIdentity> {
    let pfx = p12::PFX::parse(bytes)
        .map_err(|e| Error::InvalidCertificateBundle(format!("not a PKCS#12 structure: {:?}", e)))?;

    if !pfx.verify_mac(passphrase) {
        return Err(Error::InvalidCredentials);
    }

    let keys = pfx
        .key_bags(passphrase)
        .map_err(|e| Error::InvalidCertificateBundle(format!("cannot read key bags: {:?}", e)))?;
    let key_der = keys
        .first()
        .ok_or_else(|| Error::InvalidCertificateBundle("bundle contains no private key".to_string()))?;
    let private_key = RsaPrivateKey::from_pkcs8_der(key_der).map_err(|e| {
        Error::InvalidCertificateBundle(format!("unsupported or malformed private key: {}", e))
    })?;

    let cert_ders = pfx
        .cert_x509_bags(passphrase)
        .map_err(|e| Error::InvalidCertificateBundle(format!("cannot read certificate bags: {:?}", e)))?;
    if cert_ders.is_empty() {
        return Err(Error::InvalidCertificateBundle("bundle contains no certificate".to_string()));
    }
    let certificates = cert_ders
        .iter()
        .map(|der| Certificate::from_der(der))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidCertificateBundle(format!("malformed certificate: {}", e)))?;

    let public_key = private_key.to_public_key();
    let signer_index = certificates
        .iter()
        .position(|cert| certificate_public_key(cert).as_ref() == Some(&public_key))
        .ok_or_else(|| {
            Error::InvalidCertificateBundle("no certificate matches the private key".to_string())
        })?;

    let mut chain = certificates;
    let certificate = chain.remove(signer_index);
    Ok(SigningIdentity {
        private_key,
        certificate,
        chain,
    })
}

/// RSA public key of a certificate, `None` for other key types.
pub(crate) fn certificate_public_key(cert: &Certificate) -> Option<RsaPublicKey> {
    let spki = cert.tbs_certificate.subject_public_key_info.to_der().ok()?;
    RsaPublicKey::from_public_key_der(&spki).ok()
}
