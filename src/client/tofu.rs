use log::{info, warn};
use rustls::DigitallySignedStruct;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};
use thiserror::Error;

/// An error reading or writing the known hosts file.
#[derive(Error, Debug)]
pub enum TofuError {
    /// The file could not be opened or written.
    #[error("known hosts file I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a valid known hosts document.
    #[error("known hosts file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// A thread panicked while holding the store.
    #[error("known hosts store is poisoned")]
    Poisoned,
}

/// The result of a TOFU verification.
#[derive(Debug, PartialEq)]
pub enum TofuResult {
    /// The host is known and the certificate matches.
    Match,
    /// The host is known but the certificate does not match.
    Mismatch,
    /// The host was just learned.
    New,
}

/// Hostnames and the certificate fingerprints first seen for them.
///
/// Learning a host only changes memory. A file-backed store is written by [`TofuStore::save`]
/// or [`persist`], never from inside a TLS handshake.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TofuStore {
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip)]
    unsaved: bool,
    known_hosts: HashMap<String, String>, // hostname -> fingerprint
}

impl TofuStore {
    /// A store that lives only as long as the client.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON file, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TofuError> {
        let path = path.as_ref().to_path_buf();

        let mut store = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader::<_, TofuStore>(reader)?
        } else {
            Self::default()
        };

        store.path = Some(path);
        Ok(store)
    }

    fn write_to_disk(&self) -> Result<(), TofuError> {
        if let Some(path) = &self.path {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &self)?;
        }

        Ok(())
    }

    /// Write the store to its file, if it has one.
    pub fn save(&mut self) -> Result<(), TofuError> {
        self.write_to_disk()?;
        self.unsaved = false;

        Ok(())
    }

    /// Whether hosts were learned since the store was opened or last saved.
    pub fn is_unsaved(&self) -> bool {
        self.unsaved
    }

    /// Check a fingerprint against the one on record, learning the host if it is unknown.
    pub fn verify_or_learn_host(&mut self, hostname: &str, fingerprint: &str) -> TofuResult {
        match self.known_hosts.get(hostname) {
            Some(known) if known == fingerprint => TofuResult::Match,
            Some(_) => TofuResult::Mismatch,
            None => {
                self.known_hosts.insert(hostname.to_string(), fingerprint.to_string());
                self.unsaved = true;

                TofuResult::New
            }
        }
    }

    /// The fingerprint on record for a host.
    pub fn fingerprint(&self, hostname: &str) -> Option<&str> {
        self.known_hosts.get(hostname).map(String::as_str)
    }
}

/// Write newly learned hosts of a shared store to its file.
///
/// The lock is only held to take a snapshot; the file is written after it is released.
/// This blocks, so async callers run it on `spawn_blocking`.
pub fn persist(store: &RwLock<TofuStore>) -> Result<(), TofuError> {
    let snapshot = {
        let mut store = store.write().map_err(|_| TofuError::Poisoned)?;
        if !store.unsaved || store.path.is_none() {
            return Ok(());
        }
        store.unsaved = false;
        store.clone()
    };

    snapshot.write_to_disk().inspect_err(|_| {
        if let Ok(mut store) = store.write() {
            store.unsaved = true;
        }
    })
}

/// The SHA-256 fingerprint of a certificate, hex encoded.
pub fn fingerprint(certificate: &CertificateDer<'_>) -> String {
    hex::encode(Sha256::digest(certificate.as_ref()))
}

/// A `ServerCertVerifier` that pins the first certificate seen for each host.
#[derive(Debug)]
pub struct TofuVerifier {
    store: Arc<RwLock<TofuStore>>,
    provider: Arc<CryptoProvider>,
}

impl TofuVerifier {
    pub fn new(store: Arc<RwLock<TofuStore>>, provider: Arc<CryptoProvider>) -> Self {
        Self { store, provider }
    }
}

impl ServerCertVerifier for TofuVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let hostname = server_name.to_str();
        let fingerprint = fingerprint(end_entity);

        let mut store = self.store.write()
            .map_err(|_| rustls::Error::General(TofuError::Poisoned.to_string()))?;

        match store.verify_or_learn_host(&hostname, &fingerprint) {
            TofuResult::Match => Ok(ServerCertVerified::assertion()),
            TofuResult::New => {
                info!("Trusting new certificate for {hostname}: {fingerprint}");
                Ok(ServerCertVerified::assertion())
            }
            TofuResult::Mismatch => {
                warn!("Certificate for {hostname} does not match the one on record");
                Err(rustls::Error::InvalidCertificate(rustls::CertificateError::ApplicationVerificationFailure))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gemtx-{name}-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn verifier(store: Arc<RwLock<TofuStore>>) -> TofuVerifier {
        TofuVerifier::new(store, Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
    }

    fn verify(verifier: &TofuVerifier, certificate: &[u8]) -> Result<ServerCertVerified, rustls::Error> {
        let server_name = ServerName::try_from("example.com").unwrap();
        let certificate = CertificateDer::from(certificate.to_vec());
        verifier.verify_server_cert(&certificate, &[], &server_name, &[], UnixTime::now())
    }

    #[test]
    fn learns_then_matches() {
        let mut store = TofuStore::in_memory();
        assert_eq!(store.verify_or_learn_host("example.com", "aa"), TofuResult::New);
        assert_eq!(store.verify_or_learn_host("example.com", "aa"), TofuResult::Match);
        assert_eq!(store.fingerprint("example.com"), Some("aa"));
    }

    #[test]
    fn changed_certificate_is_a_mismatch() {
        let mut store = TofuStore::in_memory();
        store.verify_or_learn_host("example.com", "aa");
        assert_eq!(store.verify_or_learn_host("example.com", "bb"), TofuResult::Mismatch);
        assert_eq!(store.fingerprint("example.com"), Some("aa"));
    }

    #[test]
    fn learning_does_not_touch_disk() {
        let path = temp_path("known-hosts-lazy");

        let mut store = TofuStore::open(&path).unwrap();
        store.verify_or_learn_host("example.com", "aa");
        assert!(store.is_unsaved());
        assert!(!path.exists());

        store.save().unwrap();
        assert!(!store.is_unsaved());
        assert_eq!(TofuStore::open(&path).unwrap().fingerprint("example.com"), Some("aa"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn persist_writes_learned_hosts() {
        let path = temp_path("known-hosts-persist");
        let store = RwLock::new(TofuStore::open(&path).unwrap());

        persist(&store).unwrap();
        assert!(!path.exists());

        store.write().unwrap().verify_or_learn_host("example.com", "aa");
        persist(&store).unwrap();
        assert!(!store.read().unwrap().is_unsaved());

        let reopened = TofuStore::open(&path).unwrap();
        assert_eq!(reopened.fingerprint("example.com"), Some("aa"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let certificate = CertificateDer::from(b"not really a certificate".to_vec());
        let fingerprint = fingerprint(&certificate);
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn verifier_pins_the_first_certificate() {
        let store = Arc::new(RwLock::new(TofuStore::in_memory()));
        let verifier = verifier(store.clone());

        assert!(verify(&verifier, b"first certificate").is_ok());
        assert!(verify(&verifier, b"first certificate").is_ok());

        let pinned = fingerprint(&CertificateDer::from(b"first certificate".to_vec()));
        assert_eq!(store.read().unwrap().fingerprint("example.com"), Some(pinned.as_str()));
    }

    #[test]
    fn verifier_rejects_a_changed_certificate() {
        let store = Arc::new(RwLock::new(TofuStore::in_memory()));
        let verifier = verifier(store.clone());

        verify(&verifier, b"first certificate").unwrap();
        let result = verify(&verifier, b"second certificate");

        assert!(matches!(
            result,
            Err(rustls::Error::InvalidCertificate(rustls::CertificateError::ApplicationVerificationFailure))
        ));
        let pinned = fingerprint(&CertificateDer::from(b"first certificate".to_vec()));
        assert_eq!(store.read().unwrap().fingerprint("example.com"), Some(pinned.as_str()));
    }

    #[test]
    fn verifier_fails_on_a_poisoned_store() {
        let store = Arc::new(RwLock::new(TofuStore::in_memory()));
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write().unwrap();
            panic!("poison the store");
        })
        .join();

        let result = verify(&verifier(store.clone()), b"first certificate");
        assert!(matches!(result, Err(rustls::Error::General(_))));
        assert!(matches!(persist(&store), Err(TofuError::Poisoned)));
    }
}
