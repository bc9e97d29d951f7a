//! End to end tests for the FITS gRPC service over TLS.
//!
//! Each test starts the server on an ephemeral port with a self signed
//! certificate and connects a generated client trusting that certificate.
//! Tests that never reach the database use a lazy pool pointed at a closed
//! port. Tests marked `#[ignore]` need a live `PostgreSQL` with `PostGIS`
//! reachable through the `DB_*` variables:
//!
//! ```bash
//! DB_USER=postgres DB_PASSWD=... cargo test -p fits-grpc -- --ignored
//! ```

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::arithmetic_side_effects,
    clippy::cast_precision_loss
)]

use std::time::Duration;

use fits_db::{PostgresConfig, PostgresPool};
use fits_grpc::proto::fits_client::FitsClient;
use fits_grpc::proto::{Observation, ObservationRequest, Site, SiteId};
use fits_grpc::{FitsService, PemIdentity, WriteToken, serve};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard, oneshot};
use tonic::transport::{Certificate, Channel, ClientTlsConfig};
use tonic::{Code, Request};

const TOKEN: &str = "testwrite";

/// Live tests share one schema, so they run one at a time.
static SCHEMA_LOCK: Mutex<()> = Mutex::const_new(());

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    client: FitsClient<Channel>,
    _stop: oneshot::Sender<()>,
}

async fn start(pool: PostgresPool) -> Harness {
    let identity = PemIdentity::self_signed().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let service = FitsService::new(pool, WriteToken::new(TOKEN));
    let server_identity = identity.clone();
    tokio::spawn(async move {
        serve(listener, service, &server_identity, async {
            let _ = stopped.await;
        })
        .await
        .unwrap();
    });

    let tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(&identity.cert))
        .domain_name("localhost");
    let channel = Channel::from_shared(format!("https://{addr}"))
        .unwrap()
        .tls_config(tls)
        .unwrap()
        .connect()
        .await
        .unwrap();

    Harness {
        client: FitsClient::new(channel),
        _stop: stop,
    }
}

fn offline_pool() -> PostgresPool {
    let config = PostgresConfig {
        host: "127.0.0.1".to_owned(),
        port: 1,
        ..PostgresConfig::default()
    }
    .with_connect_timeout(Duration::from_secs(1));
    PostgresPool::connect_lazy(&config).unwrap()
}

fn authed<T>(msg: T) -> Request<T> {
    let mut req = Request::new(msg);
    req.metadata_mut().insert("token", TOKEN.parse().unwrap());
    req
}

fn site(id: &str) -> Site {
    Site {
        site_id: id.to_owned(),
        name: format!("{id} site"),
        longitude: 176.0,
        latitude: -38.0,
        height: 12.5,
        ground_relationship: -1.0,
    }
}

fn obs(site_id: &str, i: i64) -> Observation {
    Observation {
        site_id: site_id.to_owned(),
        type_id: "t1".to_owned(),
        method_id: "m1".to_owned(),
        sample_id: String::new(),
        seconds: 1_262_304_000 + i * 60,
        nano_seconds: 0,
        value: i as f64,
        error: 0.5,
    }
}

// =============================================================================
// Without a database
// =============================================================================

#[tokio::test]
async fn writes_without_token_are_unauthenticated() {
    let mut h = start(offline_pool()).await;

    let err = h.client.save_site(site("TEST1")).await.unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);

    let err = h
        .client
        .delete_site(SiteId { site_id: "TEST1".into() })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);

    let err = h
        .client
        .save_observations(tokio_stream::iter(vec![obs("TEST1", 0)]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn wrong_token_is_unauthenticated() {
    let mut h = start(offline_pool()).await;
    let mut req = Request::new(site("TEST1"));
    req.metadata_mut().insert("token", "nope".parse().unwrap());
    let err = h.client.save_site(req).await.unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn observation_without_site_is_invalid() {
    let mut h = start(offline_pool()).await;
    let mut o = obs("TEST1", 0);
    o.site_id.clear();
    let err = h
        .client
        .save_observations(authed(tokio_stream::iter(vec![o])))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn get_observations_needs_site_and_type() {
    let mut h = start(offline_pool()).await;
    let err = h
        .client
        .get_observations(ObservationRequest {
            site_id: "TEST1".into(),
            type_id: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn database_failure_is_internal() {
    let mut h = start(offline_pool()).await;
    let err = h
        .client
        .get_site(SiteId { site_id: "TEST1".into() })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
}

// =============================================================================
// Live database
// =============================================================================

async fn live() -> (MutexGuard<'static, ()>, Harness) {
    let guard = SCHEMA_LOCK.lock().await;
    let config = PostgresConfig::from_env().expect("bad DB_* environment");
    let pool = PostgresPool::connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL -- is it running?");
    sqlx::raw_sql(include_str!("../../fits-db/tests/fixtures/fits.sql"))
        .execute(pool.pool())
        .await
        .expect("Failed to load fixture schema");
    (guard, start(pool).await)
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn site_upsert_is_idempotent() {
    let (_guard, mut h) = live().await;

    let first = h.client.save_site(authed(site("TEST1"))).await.unwrap();
    assert_eq!(first.into_inner().affected, 1);

    let mut moved = site("TEST1");
    moved.name = "renamed".into();
    let second = h.client.save_site(authed(moved)).await.unwrap();
    assert_eq!(second.into_inner().affected, 1);

    let got = h
        .client
        .get_site(SiteId { site_id: "TEST1".into() })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(got.name, "renamed");
    assert_eq!(got.longitude, 176.0);
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn unknown_site_is_not_found() {
    let (_guard, mut h) = live().await;
    let err = h
        .client
        .get_site(SiteId { site_id: "NOPE".into() })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn delete_reports_rows() {
    let (_guard, mut h) = live().await;
    h.client.save_site(authed(site("TEST1"))).await.unwrap();
    let del = |id: &str| SiteId { site_id: id.into() };

    let r = h.client.delete_site(authed(del("TEST1"))).await.unwrap();
    assert_eq!(r.into_inner().affected, 1);
    let r = h.client.delete_site(authed(del("TEST1"))).await.unwrap();
    assert_eq!(r.into_inner().affected, 0);
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn thousand_observations_round_trip() {
    let (_guard, mut h) = live().await;
    h.client.save_site(authed(site("TEST1"))).await.unwrap();

    let sent: Vec<Observation> = (0..1000).map(|i| obs("TEST1", i)).collect();
    let saved = h
        .client
        .save_observations(authed(tokio_stream::iter(sent)))
        .await
        .unwrap();
    assert_eq!(saved.into_inner().affected, 1000);

    let mut stream = h
        .client
        .get_observations(ObservationRequest {
            site_id: "TEST1".into(),
            type_id: "t1".into(),
        })
        .await
        .unwrap()
        .into_inner();

    let mut got = Vec::new();
    while let Some(r) = stream.next().await {
        got.push(r.unwrap());
    }
    assert_eq!(got.len(), 1000);
    assert!(got.windows(2).all(|w| w[0].seconds < w[1].seconds));
    assert_eq!(got[0].seconds, 1_262_304_000);
    assert_eq!(got[999].value, 999.0);
    assert_eq!(got[999].error, 0.5);
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn method_not_valid_for_type_is_not_found() {
    let (_guard, mut h) = live().await;
    h.client.save_site(authed(site("TEST1"))).await.unwrap();

    let mut o = obs("TEST1", 0);
    o.type_id = "t2".into();
    o.method_id = "m2".into();
    let err = h
        .client
        .save_observations(authed(tokio_stream::iter(vec![o])))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance with PostGIS"]
async fn observation_for_unknown_site_is_not_found() {
    let (_guard, mut h) = live().await;
    let err = h
        .client
        .save_observations(authed(tokio_stream::iter(vec![obs("NOPE", 0)])))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
    assert!(err.message().contains("NOPE"));
}
