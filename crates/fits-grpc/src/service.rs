//! The `fits.Fits` gRPC service.
//!
//! Writes (`SaveSite`, `DeleteSite`, `SaveObservations`) need the write
//! token. Reads are open. Every failed call is logged at `warn` with its
//! method and code before the status is returned.

use chrono::{DateTime, Utc};
use fits_db::{ObservationStore, PostgresPool, Resolver, SeriesSelection, SiteStore, TimeWindow};
use fits_types::{DEFAULT_SAMPLE_ID, Observation, Point, Site};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Status, Streaming};
use tracing::{debug, warn};

use crate::auth::WriteToken;
use crate::error::{GrpcError, require};
use crate::proto::{self, fits_server::Fits};

/// Observations buffered between the database and a slow client.
const STREAM_BUFFER: usize = 256;

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<proto::Site> for Site {
    fn from(s: proto::Site) -> Self {
        Self {
            site_id: s.site_id,
            name: s.name,
            longitude: s.longitude,
            latitude: s.latitude,
            height: s.height,
            ground_relationship: s.ground_relationship,
        }
    }
}

impl From<Site> for proto::Site {
    fn from(s: Site) -> Self {
        Self {
            site_id: s.site_id,
            name: s.name,
            longitude: s.longitude,
            latitude: s.latitude,
            height: s.height,
            ground_relationship: s.ground_relationship,
        }
    }
}

impl From<Point> for proto::ObservationResult {
    fn from(p: Point) -> Self {
        Self {
            seconds: p.time.timestamp(),
            nano_seconds: i64::from(p.time.timestamp_subsec_nanos()),
            value: p.value,
            error: p.error,
        }
    }
}

/// Validate an incoming observation. Site, type and method are required;
/// an empty sample becomes the default sample.
fn observation(o: proto::Observation) -> Result<Observation, GrpcError> {
    require(&o.site_id, "siteID")?;
    require(&o.type_id, "typeID")?;
    require(&o.method_id, "methodID")?;

    let time = u32::try_from(o.nano_seconds)
        .ok()
        .and_then(|n| DateTime::<Utc>::from_timestamp(o.seconds, n))
        .ok_or_else(|| {
            GrpcError::InvalidArgument(format!(
                "invalid time: seconds {} nanoSeconds {}",
                o.seconds, o.nano_seconds
            ))
        })?;

    let sample_id = if o.sample_id.is_empty() {
        DEFAULT_SAMPLE_ID.to_owned()
    } else {
        o.sample_id
    };

    Ok(Observation {
        site_id: o.site_id,
        type_id: o.type_id,
        method_id: o.method_id,
        sample_id,
        time,
        value: o.value,
        error: o.error,
    })
}

fn affected(n: u64) -> proto::Response {
    proto::Response {
        affected: i64::try_from(n).unwrap_or(i64::MAX),
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Implements `fits.Fits` over a connection pool.
#[derive(Clone)]
pub struct FitsService {
    db: PostgresPool,
    token: WriteToken,
}

impl FitsService {
    /// Create a service writing through `db` and guarded by `token`.
    pub const fn new(db: PostgresPool, token: WriteToken) -> Self {
        Self { db, token }
    }

    /// Upsert every observation of `stream` in order. Stops at the first
    /// failure; observations before it stay saved.
    ///
    /// # Errors
    ///
    /// Returns the first validation, lookup, database or stream error.
    pub async fn save_all<S>(&self, mut stream: S) -> Result<u64, GrpcError>
    where
        S: Stream<Item = Result<proto::Observation, Status>> + Unpin,
    {
        let store = ObservationStore::new(self.db.pool());
        let mut total: u64 = 0;
        while let Some(msg) = stream.next().await {
            let obs = observation(msg?)?;
            total = total.saturating_add(store.save(&obs).await?);
        }
        debug!(affected = total, "saved observations");
        Ok(total)
    }

    async fn write_site(&self, request: Request<proto::Site>) -> Result<proto::Response, GrpcError> {
        self.token.check(request.metadata())?;
        let site = Site::from(request.into_inner());
        require(&site.site_id, "siteID")?;
        let n = SiteStore::new(self.db.pool()).save(&site).await?;
        Ok(affected(n))
    }

    async fn remove_site(&self, request: Request<proto::SiteId>) -> Result<proto::Response, GrpcError> {
        self.token.check(request.metadata())?;
        let site_id = request.into_inner().site_id;
        require(&site_id, "siteID")?;
        let n = SiteStore::new(self.db.pool()).delete(&site_id).await?;
        Ok(affected(n))
    }

    async fn read_site(&self, request: Request<proto::SiteId>) -> Result<proto::Site, GrpcError> {
        let site_id = request.into_inner().site_id;
        require(&site_id, "siteID")?;
        Ok(SiteStore::new(self.db.pool()).get(&site_id).await?.into())
    }

    async fn open_series(
        &self,
        request: Request<proto::ObservationRequest>,
    ) -> Result<ReceiverStream<Result<proto::ObservationResult, Status>>, GrpcError> {
        let req = request.into_inner();
        require(&req.site_id, "siteID")?;
        require(&req.type_id, "typeID")?;

        let resolver = Resolver::new(self.db.pool());
        resolver.valid_site(&req.site_id).await?;
        resolver.valid_type(&req.type_id).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let db = self.db.clone();
        tokio::spawn(async move {
            let store = ObservationStore::new(db.pool());
            let sel = SeriesSelection {
                site_id: &req.site_id,
                type_id: &req.type_id,
                method_id: None,
                window: TimeWindow::unbounded(),
            };
            let mut rows = std::pin::pin!(store.series_stream(&sel));
            while let Some(row) = rows.next().await {
                let stop = row.is_err();
                let msg = row
                    .map(proto::ObservationResult::from)
                    .map_err(|e| Status::from(GrpcError::from(e)));
                if tx.send(msg).await.is_err() || stop {
                    break;
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// Log a failed call and turn it into a status.
fn failed(method: &'static str, err: GrpcError) -> Status {
    let status = Status::from(err);
    warn!(method, code = ?status.code(), message = status.message(), "call failed");
    status
}

#[tonic::async_trait]
impl Fits for FitsService {
    async fn save_site(
        &self,
        request: Request<proto::Site>,
    ) -> Result<tonic::Response<proto::Response>, Status> {
        self.write_site(request)
            .await
            .map(tonic::Response::new)
            .map_err(|e| failed("SaveSite", e))
    }

    async fn delete_site(
        &self,
        request: Request<proto::SiteId>,
    ) -> Result<tonic::Response<proto::Response>, Status> {
        self.remove_site(request)
            .await
            .map(tonic::Response::new)
            .map_err(|e| failed("DeleteSite", e))
    }

    async fn get_site(
        &self,
        request: Request<proto::SiteId>,
    ) -> Result<tonic::Response<proto::Site>, Status> {
        self.read_site(request)
            .await
            .map(tonic::Response::new)
            .map_err(|e| failed("GetSite", e))
    }

    async fn save_observations(
        &self,
        request: Request<Streaming<proto::Observation>>,
    ) -> Result<tonic::Response<proto::Response>, Status> {
        let result = match self.token.check(request.metadata()) {
            Ok(()) => self.save_all(request.into_inner()).await,
            Err(e) => Err(e),
        };
        result
            .map(|n| tonic::Response::new(affected(n)))
            .map_err(|e| failed("SaveObservations", e))
    }

    type GetObservationsStream = ReceiverStream<Result<proto::ObservationResult, Status>>;

    async fn get_observations(
        &self,
        request: Request<proto::ObservationRequest>,
    ) -> Result<tonic::Response<Self::GetObservationsStream>, Status> {
        self.open_series(request)
            .await
            .map(tonic::Response::new)
            .map_err(|e| failed("GetObservations", e))
    }
}
