//!
//! src/pipeline.rs
//!
//! Runs the selected records through resolve -> cover -> build -> upload.
//! Each record is its own unit of work: a failure ends that record only
//! and is reported as its outcome. A semaphore bounds how many records
//! are in flight, which bounds connections and open files. Cancelling
//! stops new records from starting; in-flight ones run to completion.
//!

use std::{path::PathBuf, sync::Arc};

use tokio::{sync::{mpsc, Semaphore}, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::builder::build_request;
use crate::config::AppConfig;
use crate::errors::IngestError;
use crate::fetch::{plain_client, CatalogClient};
use crate::sink::ImageSink;
use crate::types::{ItemOutcome, ItemStatus, Record, Session};
use crate::upload::MediaClient;

#[derive(Clone)]
pub struct Clients {
    pub catalog: Arc<CatalogClient>,
    pub images: Arc<ImageSink>,
    pub media: Arc<MediaClient>
}

impl Clients {
    pub fn new(catalog: CatalogClient, images: ImageSink, media: MediaClient) -> Self {
        Self {
            catalog: Arc::new(catalog),
            images: Arc::new(images),
            media: Arc::new(media)
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, IngestError> {
        let catalog = CatalogClient::new(&cfg.http, &cfg.identity, &cfg.catalog)?;
        let images  = ImageSink::new(plain_client(&cfg.http, &cfg.identity)?, &cfg.storage);
        let media   = MediaClient::new(
            &cfg.http, &cfg.identity, &cfg.media, cfg.storage.fs_timeout)?;
        Ok( Self::new(catalog, images, media) )
    }
}

pub struct Ingestor {
    clients: Clients,
    max_inflight: usize,

    // pool permits
    inflight: Arc<Semaphore>,

    // stops new items from starting
    shutdown: CancellationToken
}

impl Ingestor {
    pub fn new(clients: Clients, max_inflight: usize) -> Self {
        let max_inflight = max_inflight.max(1);
        Self {
            clients,
            max_inflight,
            inflight: Arc::new(Semaphore::new(max_inflight)),
            shutdown: CancellationToken::new()
        }
    }

    /// Cancelling is permanent for this ingestor: runs started afterwards
    /// report every record as skipped
    pub fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Search is not part of a per-item unit, it feeds the operator's pick
    pub async fn search(&self, artist: &str, token: &str) -> Result<Vec<Record>, IngestError> {
        self.clients.catalog.search(artist, token).await
    }

    /// Ingests every record and returns the outcomes in selection order
    pub async fn ingest(&self, records: Vec<Record>, session: &Session) -> Vec<ItemOutcome> {
        let mut rx = self.ingest_stream(records, session.clone());
        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }

    /// Outcomes are sent as items finish. The channel closes once every
    /// record has an outcome, skipped ones included
    pub fn ingest_stream(&self, records: Vec<Record>, session: Session) ->
        mpsc::Receiver<ItemOutcome> {
        let (tx, rx) = mpsc::channel(records.len().max(1));
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest.run", run_id = %run_id);

        let this = self.clone_for_task();
        let session = Arc::new(session);
        tokio::spawn(async move {
            this.run(records, session, tx).await
        }.instrument(span));

        rx
    }

    fn clone_for_task(&self) -> Self {
        Self {
            clients: self.clients.clone(),
            max_inflight: self.max_inflight,
            inflight: self.inflight.clone(),
            shutdown: self.shutdown.clone()
        }
    }

    async fn run(self, records: Vec<Record>, session: Arc<Session>, tx: mpsc::Sender<ItemOutcome>) {
        info!(items = records.len(), pool = self.max_inflight, "ingest.start");

        let mut tasks = JoinSet::new();
        let mut pending = records.into_iter().enumerate();

        while let Some((index, record)) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                p = self.inflight.clone().acquire_owned() => p.ok()
            };
            let Some(permit) = permit else {
                warn!(index, "ingest.cancelled");
                let _ = tx.send(ItemOutcome::new(index, &record.title, ItemStatus::Skipped)).await;
                for (index, record) in pending.by_ref() {
                    let _ = tx.send(ItemOutcome::new(index, &record.title, ItemStatus::Skipped)).await;
                }
                break;
            };

            let clients = self.clients.clone();
            let session = session.clone();
            let tx = tx.clone();
            let span = tracing::info_span!("ingest.item", index, url = %record.url);
            tasks.spawn(async move {
                let status = process_record(&clients, &record, &session).await;
                drop(permit);
                let _ = tx.send(ItemOutcome::new(index, &record.title, status)).await;
            }.instrument(span));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = ?e, "ingest.item.panicked");
            }
        }
        info!("ingest.exit");
    }
}

/// One record end to end. Only the cover art may fail without failing
/// the item
pub async fn process_record(clients: &Clients, record: &Record, session: &Session) -> ItemStatus {
    debug!(title = %record.title, "ingest.item.start");

    let detail = match clients.catalog.resolve(record, session.catalog_token.as_deref()).await {
        Ok(detail) => detail,
        Err(e) => {
            error!(error = %e, kind = e.kind().as_str(), "ingest.item.resolve");
            return ItemStatus::Failed(e);
        }
    };

    // held until the upload has read the stored file back
    let _claim = if record.image.trim().is_empty() {
        None
    } else {
        Some(clients.images.claim(&record.title).await)
    };

    let (image, image_error) = fetch_cover(&clients.images, record).await;
    let image_str = image.as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = build_request(&detail, &image_str, session.author_id);

    match clients.media.upload(&request, &session.media_token).await {
        Ok(()) => {
            info!(title = %request.title, "ingest.item.done");
            ItemStatus::Uploaded { request, image, image_error }
        }
        Err(e) => {
            error!(error = %e, kind = e.kind().as_str(), "ingest.item.upload");
            ItemStatus::Failed(e)
        }
    }
}

async fn fetch_cover(images: &ImageSink, record: &Record) -> (Option<PathBuf>, Option<IngestError>) {
    if record.image.trim().is_empty() {
        debug!(title = %record.title, "ingest.item.no_cover");
        return (None, None);
    }
    match images.fetch(&record.image, &record.title).await {
        Ok(path) => (Some(path), None),
        Err(e) => {
            warn!(error = %e, kind = e.kind().as_str(), "ingest.item.cover");
            (None, Some(e))
        }
    }
}
