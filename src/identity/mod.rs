//! Identity issuer credentials
//!
//! The control plane's identity service needs a trust anchor bundle and an
//! issuer certificate/key pair. They are either supplied by the user,
//! managed externally in `Secret/linkerd-identity-issuer`, or generated here
//! as a self-signed ECDSA root that serves as both anchor and issuer.

use chrono::{Datelike, Duration, NaiveTime, SecondsFormat, Utc};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, KeyPair, KeyUsagePurpose};
use tracing::{debug, info};

use crate::cluster::{ClusterApi, secret_data};
use crate::error::Result;
use crate::error::cluster::transport;
use crate::error::render::credentials_failed;
use crate::values::{ISSUER_SCHEME_EXTERNAL, Values};

/// Secret holding externally managed issuer credentials
pub const ISSUER_SECRET_NAME: &str = "linkerd-identity-issuer";

const ISSUER_VALIDITY_DAYS: i64 = 365;

/// Credentials generated for a fresh install
#[derive(Debug, Clone)]
pub struct IssuerCredentials {
    pub crt_pem: String,
    pub key_pem: String,
    /// RFC 3339 expiry of the certificate
    pub expiry: String,
}

impl IssuerCredentials {
    /// Generate a self-signed root for `trust_domain`
    pub fn generate(trust_domain: &str) -> Result<Self> {
        let common_name = format!("identity.linkerd.{}", trust_domain);

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String(common_name));
        params.distinguished_name = dn;

        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let today = Utc::now().date_naive();
        let expires = today + Duration::days(ISSUER_VALIDITY_DAYS);
        params.not_before = rcgen::date_time_ymd(today.year(), today.month() as u8, today.day() as u8);
        params.not_after = rcgen::date_time_ymd(expires.year(), expires.month() as u8, expires.day() as u8);

        let key_pair = KeyPair::generate()
            .map_err(|e| credentials_failed(format!("failed to generate issuer key: {}", e)))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| credentials_failed(format!("failed to create issuer certificate: {}", e)))?;

        let expiry = expires
            .and_time(NaiveTime::MIN)
            .and_utc()
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        Ok(Self {
            crt_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            expiry,
        })
    }
}

/// Make sure the value tree carries usable issuer credentials
///
/// A no-op when all credentials are already present, so it is safe to run
/// again after an earlier failed attempt. `cluster` is `None` when cluster
/// interaction is disabled.
pub fn initialize_issuer_credentials<A: ClusterApi>(values: &mut Values, cluster: Option<&A>) -> Result<()> {
    if values.identity.issuer.scheme == ISSUER_SCHEME_EXTERNAL {
        let Some(api) = cluster else {
            return Err(credentials_failed(
                "--ignore-cluster is not supported when --identity-external-issuer=true",
            ));
        };
        return load_external_issuer(values, api);
    }

    let anchors = !values.global.identity_trust_anchors_pem.trim().is_empty();
    let crt = !values.identity.issuer.tls.crt_pem.trim().is_empty();
    let key = !values.identity.issuer.tls.key_pem.trim().is_empty();

    match (anchors, crt, key) {
        (true, true, true) => {
            debug!("using supplied issuer credentials");
            Ok(())
        }
        (false, false, false) => {
            let trust_domain = values.global.identity_trust_domain.clone();
            let generated = IssuerCredentials::generate(&trust_domain)?;
            info!(trust_domain = %trust_domain, expiry = %generated.expiry, "generated issuer credentials");

            values.global.identity_trust_anchors_pem = generated.crt_pem.clone();
            values.identity.issuer.tls.crt_pem = generated.crt_pem;
            values.identity.issuer.tls.key_pem = generated.key_pem;
            values.identity.issuer.crt_expiry = generated.expiry;
            Ok(())
        }
        _ => Err(credentials_failed(
            "a trust anchors file, an issuer certificate file, and an issuer key file must all be specified",
        )),
    }
}

fn load_external_issuer<A: ClusterApi>(values: &mut Values, api: &A) -> Result<()> {
    let namespace = values.global.namespace.clone();
    let secret = api.get_secret(&namespace, ISSUER_SECRET_NAME).map_err(|e| {
        if e.is_not_found() {
            credentials_failed(format!(
                "failed to read the {} secret: {}",
                ISSUER_SECRET_NAME, e
            ))
        } else {
            transport(e.to_string())
        }
    })?;

    let mut missing = Vec::new();
    let mut read = |key: &'static str| {
        let data = secret_data(&secret, key).filter(|d| !d.is_empty());
        if data.is_none() {
            missing.push(key);
        }
        data
    };
    let ca = read("ca.crt");
    read("tls.crt");
    read("tls.key");

    if !missing.is_empty() {
        return Err(credentials_failed(format!(
            "{} secret is missing the {} key(s)",
            ISSUER_SECRET_NAME,
            missing.join(", ")
        )));
    }

    if values.global.identity_trust_anchors_pem.trim().is_empty() {
        if let Some(ca) = ca {
            values.global.identity_trust_anchors_pem = String::from_utf8(ca)
                .map_err(|_| credentials_failed(format!("{} ca.crt is not valid PEM", ISSUER_SECRET_NAME)))?;
        }
    }
    debug!(secret = ISSUER_SECRET_NAME, "using externally managed issuer credentials");
    Ok(())
}

/// Check that user-supplied credentials are present and parse
pub fn verify_issuer_credentials(
    trust_anchors: &str,
    crt_pem: &str,
    key_pem: &str,
) -> std::result::Result<(), String> {
    if trust_anchors.trim().is_empty() || crt_pem.trim().is_empty() || key_pem.trim().is_empty() {
        return Err(
            "a trust anchors file, an issuer certificate file, and an issuer key file must all be specified"
                .to_string(),
        );
    }

    let anchors = ::pem::parse_many(trust_anchors.as_bytes())
        .map_err(|e| format!("invalid trust anchors: {}", e))?;
    if anchors.is_empty() || anchors.iter().any(|p| p.tag() != "CERTIFICATE") {
        return Err("trust anchors must be a bundle of PEM certificates".to_string());
    }

    let crt = ::pem::parse(crt_pem.as_bytes()).map_err(|e| format!("invalid issuer certificate: {}", e))?;
    if crt.tag() != "CERTIFICATE" {
        return Err(format!("issuer certificate has unexpected PEM type {}", crt.tag()));
    }

    KeyPair::from_pem(key_pem).map_err(|e| format!("invalid issuer key: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::FakeCluster;

    #[test]
    fn test_generate_credentials_verify() {
        let generated = IssuerCredentials::generate("cluster.local").unwrap();
        assert!(generated.crt_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(verify_issuer_credentials(&generated.crt_pem, &generated.crt_pem, &generated.key_pem).is_ok());
        assert!(generated.expiry.ends_with("T00:00:00Z"));
    }

    #[test]
    fn test_initialize_generates_when_empty() {
        let mut values = Values::new_defaults();
        initialize_issuer_credentials::<FakeCluster>(&mut values, None).unwrap();

        assert!(!values.identity.issuer.tls.crt_pem.is_empty());
        assert!(!values.identity.issuer.tls.key_pem.is_empty());
        assert_eq!(
            values.global.identity_trust_anchors_pem,
            values.identity.issuer.tls.crt_pem
        );
        assert!(!values.identity.issuer.crt_expiry.is_empty());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut values = Values::new_defaults();
        initialize_issuer_credentials::<FakeCluster>(&mut values, None).unwrap();
        let first = values.clone();

        initialize_issuer_credentials::<FakeCluster>(&mut values, None).unwrap();
        assert_eq!(first, values);
    }

    #[test]
    fn test_partial_credentials_rejected() {
        let mut values = Values::new_defaults();
        values.identity.issuer.tls.crt_pem = "-----BEGIN CERTIFICATE-----".to_string();
        let err = initialize_issuer_credentials::<FakeCluster>(&mut values, None).unwrap_err();
        assert!(err.to_string().contains("must all be specified"));
    }

    #[test]
    fn test_external_issuer_requires_cluster() {
        let mut values = Values::new_defaults();
        values.identity.issuer.scheme = ISSUER_SCHEME_EXTERNAL.to_string();
        let err = initialize_issuer_credentials::<FakeCluster>(&mut values, None).unwrap_err();
        assert!(err.to_string().contains("--ignore-cluster"));
    }

    #[test]
    fn test_external_issuer_reads_secret() {
        let generated = IssuerCredentials::generate("cluster.local").unwrap();
        let cluster = FakeCluster::new().with_secret(
            "linkerd",
            ISSUER_SECRET_NAME,
            &[
                ("ca.crt", generated.crt_pem.as_str()),
                ("tls.crt", generated.crt_pem.as_str()),
                ("tls.key", generated.key_pem.as_str()),
            ],
        );

        let mut values = Values::new_defaults();
        values.identity.issuer.scheme = ISSUER_SCHEME_EXTERNAL.to_string();
        initialize_issuer_credentials(&mut values, Some(&cluster)).unwrap();

        assert_eq!(values.global.identity_trust_anchors_pem, generated.crt_pem);
        assert!(values.identity.issuer.tls.crt_pem.is_empty());
    }

    #[test]
    fn test_external_issuer_missing_keys() {
        let cluster = FakeCluster::new().with_secret(
            "linkerd",
            ISSUER_SECRET_NAME,
            &[("ca.crt", "anchors")],
        );

        let mut values = Values::new_defaults();
        values.identity.issuer.scheme = ISSUER_SCHEME_EXTERNAL.to_string();
        let err = initialize_issuer_credentials(&mut values, Some(&cluster)).unwrap_err();
        assert!(err.to_string().contains("tls.crt, tls.key"));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(verify_issuer_credentials("", "", "").is_err());
        assert!(verify_issuer_credentials("not pem", "not pem", "not pem").is_err());

        let generated = IssuerCredentials::generate("cluster.local").unwrap();
        let err = verify_issuer_credentials(&generated.crt_pem, &generated.key_pem, &generated.key_pem)
            .unwrap_err();
        assert!(err.contains("unexpected PEM type"));
    }
}
