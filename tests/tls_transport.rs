//! Certificate trust and mutual TLS against a local HTTPS stand-in whose
//! certificate is issued by a private test CA (`tests/fixtures/tls`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

use spelunk_dispatch::{
    Auth, ClientConfig, FailureKind, SearchError, SearchOptions, SearchOrchestrator, SplunkClient,
    TransportError, TrustMode,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/tls")
        .join(name)
}

fn pem_certs(name: &str) -> Vec<CertificateDer<'static>> {
    CertificateDer::pem_file_iter(fixture(name))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn server_config(require_client_cert: bool) -> Arc<rustls::ServerConfig> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let certs = pem_certs("server.pem");
    let key = PrivateKeyDer::from_pem_file(fixture("server.key")).unwrap();
    let builder = rustls::ServerConfig::builder();

    let mut config = if require_client_cert {
        let mut roots = RootCertStore::empty();
        for ca in pem_certs("ca.pem") {
            roots.add(ca).unwrap();
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots)).build().unwrap();
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)
            .unwrap()
    } else {
        builder.with_no_client_auth().with_single_cert(certs, key).unwrap()
    };
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

async fn serve_tls(require_client_cert: bool) -> String {
    let app = Router::new()
        .route(
            "/services/search/jobs",
            post(|| async { "<response><sid>tls.1</sid></response>" }),
        )
        .route(
            "/services/search/jobs/{sid}",
            get(|| async {
                r#"<entry xmlns:s="http://dev.splunk.com/ns/rest"><s:key name="dispatchState">DONE</s:key></entry>"#
            }),
        )
        .route(
            "/services/search/v2/jobs/{sid}/results",
            get(|| async { r#"{"results": [{"host": "idx-01"}]}"# }),
        );

    let tls = RustlsConfig::from_config(server_config(require_client_cert));
    let handle = Handle::new();
    let server_handle = handle.clone();
    tokio::spawn(async move {
        axum_server::bind_rustls("127.0.0.1:0".parse().unwrap(), tls)
            .handle(server_handle)
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    let addr = handle.listening().await.unwrap();
    format!("https://{}", addr)
}

fn options() -> SearchOptions {
    SearchOptions::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(10))
}

fn token() -> Auth {
    Auth::Token("tls-test".to_string())
}

#[tokio::test]
async fn strict_trust_rejects_unknown_issuer() {
    let base_url = serve_tls(false).await;
    let client = SplunkClient::new(&ClientConfig::new(base_url, token())).unwrap();

    let err = SearchOrchestrator::new(client)
        .search("index=main", &options())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transport);
    assert!(matches!(err, SearchError::Transport(TransportError::Request { .. })));
}

#[tokio::test]
async fn accept_self_signed_connects() {
    let base_url = serve_tls(false).await;
    let config = ClientConfig::new(base_url, token()).with_trust_mode(TrustMode::AcceptSelfSigned);
    let client = SplunkClient::new(&config).unwrap();

    let rows = SearchOrchestrator::new(client)
        .search("index=main", &options())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["host"], "idx-01");
}

#[tokio::test]
async fn ca_bundle_makes_strict_trust_succeed() {
    let base_url = serve_tls(false).await;
    let config = ClientConfig {
        ca_bundle: Some(fixture("ca.pem")),
        ..ClientConfig::new(base_url, token())
    };
    let client = SplunkClient::new(&config).unwrap();

    let rows = SearchOrchestrator::new(client)
        .search("index=main", &options())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn mutual_tls_needs_a_client_identity() {
    let base_url = serve_tls(true).await;

    let anonymous = ClientConfig {
        ca_bundle: Some(fixture("ca.pem")),
        ..ClientConfig::new(base_url.clone(), token())
    };
    let err = SearchOrchestrator::new(SplunkClient::new(&anonymous).unwrap())
        .search("index=main", &options())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Transport);

    let identified = ClientConfig {
        ca_bundle: Some(fixture("ca.pem")),
        client_identity: Some(fixture("client.pem")),
        ..ClientConfig::new(base_url, token())
    };
    let rows = SearchOrchestrator::new(SplunkClient::new(&identified).unwrap())
        .search("index=main", &options())
        .await
        .unwrap();
    assert_eq!(rows[0]["host"], "idx-01");
}

#[test]
fn identity_without_private_key_is_rejected() {
    let config = ClientConfig {
        client_identity: Some(fixture("ca.pem")),
        ..ClientConfig::new("https://127.0.0.1:8089", token())
    };
    assert!(matches!(
        SplunkClient::new(&config),
        Err(TransportError::Build(_))
    ));
}
