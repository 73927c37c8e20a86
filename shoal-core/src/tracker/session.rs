//! Announce session for one torrent
//!
//! A `TrackerSession` is owned by a single task running [`TrackerSession::run`].
//! Other tasks talk to it through a cloneable [`TrackerHandle`]: peer list
//! reads go through a short read guard on the published snapshot, progress
//! updates and stop requests are queued as commands.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::http::HttpTrackerClient;
use super::types::{
    AnnounceEvent, AnnounceRequest, AnnounceResponse, AnnounceStatus, PeerAddress,
    TrackerClient, TransferProgress,
};
use super::udp::UdpTrackerClient;
use crate::config::{ShoalConfig, TrackerConfig};
use crate::torrent::{InfoHash, PeerId, TorrentError, TorrentMetadata};

/// Latest successful announce result.
#[derive(Debug, Clone, Default)]
struct PeerSnapshot {
    peers: Vec<PeerAddress>,
    interval: Option<Duration>,
}

#[derive(Debug)]
enum SessionCommand {
    UpdateProgress(TransferProgress),
    Stop,
}

/// Cloneable access to a running session.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    snapshot: Arc<RwLock<PeerSnapshot>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl TrackerHandle {
    /// Snapshot of the peers from the latest successful announce.
    ///
    /// Never waits on network I/O.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.snapshot.read().peers.clone()
    }

    /// Wait before the next regular announce, once a tracker has answered.
    pub fn announce_interval(&self) -> Option<Duration> {
        self.snapshot.read().interval
    }

    /// Reports new transfer counters for the following announces.
    ///
    /// # Errors
    /// - `TorrentError::SessionClosed` - The session task has exited
    pub fn update_progress(
        &self,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> Result<(), TorrentError> {
        let progress = TransferProgress {
            uploaded,
            downloaded,
            left,
        };
        self.commands
            .send(SessionCommand::UpdateProgress(progress))
            .map_err(|_| TorrentError::SessionClosed)
    }

    /// Asks the session to send a final `stopped` announce and exit.
    ///
    /// # Errors
    /// - `TorrentError::SessionClosed` - The session task has exited
    pub fn stop(&self) -> Result<(), TorrentError> {
        self.commands
            .send(SessionCommand::Stop)
            .map_err(|_| TorrentError::SessionClosed)
    }
}

/// Announce state of one torrent across all of its trackers.
pub struct TrackerSession {
    metadata: Arc<TorrentMetadata>,
    config: TrackerConfig,
    candidates: Vec<Url>,
    info_hash: InfoHash,
    peer_id: PeerId,
    progress: TransferProgress,
    status: AnnounceStatus,
    /// Status the trackers last acknowledged
    announced: AnnounceStatus,
    http: HttpTrackerClient,
    udp: UdpTrackerClient,
    snapshot: Arc<RwLock<PeerSnapshot>>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl TrackerSession {
    /// Creates a session for `metadata`.
    ///
    /// Candidates are the primary announce URL followed by every
    /// `announce-list` tier flattened in order. Fallback URLs that do not
    /// parse or use another scheme are skipped with a warning.
    ///
    /// # Errors
    /// - `TorrentError::UrlParsing` - Primary announce URL is not a valid URL
    /// - `TorrentError::UnsupportedScheme` - Primary announce URL is not http, https or udp
    /// - `TorrentError::Http` - HTTP client initialisation failed
    pub fn create(
        metadata: Arc<TorrentMetadata>,
        config: &ShoalConfig,
    ) -> Result<Self, TorrentError> {
        let primary = Url::parse(&metadata.announce)?;
        check_scheme(&primary)?;

        let mut candidates = vec![primary];
        for tier_url in metadata.announce_list.iter().flatten() {
            match Url::parse(tier_url)
                .map_err(TorrentError::from)
                .and_then(|url| check_scheme(&url).map(|()| url))
            {
                Ok(url) => candidates.push(url),
                Err(e) => tracing::warn!("Skipping tracker {}: {}", tier_url, e),
            }
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let progress = TransferProgress {
            uploaded: 0,
            downloaded: 0,
            left: metadata.info.length,
        };

        Ok(Self {
            info_hash: metadata.info_hash(),
            peer_id: PeerId::generate(&config.client.peer_id_prefix),
            metadata,
            config: config.tracker.clone(),
            candidates,
            progress,
            status: AnnounceStatus::None,
            announced: AnnounceStatus::None,
            http: HttpTrackerClient::new(&config.tracker)?,
            udp: UdpTrackerClient::new(&config.tracker),
            snapshot: Arc::new(RwLock::new(PeerSnapshot::default())),
            command_tx,
            command_rx,
        })
    }

    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            snapshot: Arc::clone(&self.snapshot),
            commands: self.command_tx.clone(),
        }
    }

    /// Moves the session onto its own task.
    pub fn spawn(
        mut self,
        cancel: CancellationToken,
    ) -> (TrackerHandle, JoinHandle<Result<(), TorrentError>>) {
        let handle = self.handle();
        let task = tokio::spawn(async move { self.run(cancel).await });
        (handle, task)
    }

    pub fn metadata(&self) -> &TorrentMetadata {
        &self.metadata
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn candidates(&self) -> &[Url] {
        &self.candidates
    }

    pub fn status(&self) -> AnnounceStatus {
        self.status
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress
    }

    /// Snapshot of the peers from the latest successful announce.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.snapshot.read().peers.clone()
    }

    /// Records new transfer counters.
    ///
    /// Reaching `left == 0` while started moves the session to `Completed`,
    /// which is announced once, after a tracker has acknowledged `started`.
    pub fn update_progress(&mut self, progress: TransferProgress) {
        if progress.left == 0 && self.progress.left > 0 && self.status == AnnounceStatus::Started
        {
            tracing::info!("Download complete for {}", self.info_hash);
            self.status = AnnounceStatus::Completed;
        }
        self.progress = progress;
    }

    /// Announces to the first candidate that answers.
    ///
    /// Candidates are tried in order; a failing URL is logged and the next
    /// one is tried. A URL appearing twice is only contacted once per call.
    /// On success the peer list and interval are replaced in one step.
    ///
    /// # Errors
    /// - `TorrentError::AllTrackersFailed` - Every candidate failed, keyed by URL
    pub async fn announce_once(&mut self) -> Result<AnnounceResponse, TorrentError> {
        if self.status == AnnounceStatus::None {
            self.status = AnnounceStatus::Started;
        }
        // Trackers must see `started` before any other event.
        let acknowledged = match self.announced {
            AnnounceStatus::None => AnnounceStatus::Started,
            _ => self.status,
        };
        let event = if acknowledged != self.announced {
            AnnounceEvent::from(acknowledged)
        } else {
            AnnounceEvent::None
        };
        let request = AnnounceRequest {
            info_hash: self.info_hash,
            peer_id: self.peer_id,
            port: self.config.listen_port,
            progress: self.progress,
            event,
            num_want: self.config.num_want,
        };

        let candidates = self.candidates.clone();
        let mut attempted = HashSet::new();
        let mut failures = BTreeMap::new();

        for url in &candidates {
            if !attempted.insert(url.as_str()) {
                tracing::debug!("Skipping {}: already tried this cycle", url);
                continue;
            }

            tracing::info!("Connecting to tracker: {}", url);
            let client: &mut dyn TrackerClient = match url.scheme() {
                "udp" => &mut self.udp,
                _ => &mut self.http,
            };

            match client.announce(url, &request).await {
                Ok(response) => {
                    tracing::info!(
                        "Tracker {} responded with {} peers, interval {}s",
                        url,
                        response.peers.len(),
                        response.interval
                    );
                    self.publish(&response);
                    self.announced = acknowledged;
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!("Tracker {} failed: {}", url, e);
                    failures.insert(url.to_string(), e);
                }
            }
        }

        Err(TorrentError::AllTrackersFailed { failures })
    }

    /// Announce loop.
    ///
    /// Waits the initial delay, then announces every tracker-supplied
    /// interval until cancelled, stopped, or every candidate fails.
    /// Cancellation abandons an in-flight announce and returns `Ok`.
    ///
    /// # Errors
    /// - `TorrentError::AllTrackersFailed` - An announce cycle exhausted every candidate
    #[tracing::instrument(name = "tracker_session", skip_all, fields(info_hash = %self.info_hash))]
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), TorrentError> {
        tracing::info!(
            "Starting announce loop with {} tracker candidates",
            self.candidates.len()
        );
        let mut wait = self.config.initial_announce_delay;

        loop {
            let deadline = Instant::now() + wait;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Announce loop cancelled");
                        return Ok(());
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                    Some(command) = self.command_rx.recv() => match command {
                        SessionCommand::UpdateProgress(progress) => self.update_progress(progress),
                        SessionCommand::Stop => return self.shutdown(&cancel).await,
                    },
                }
            }

            if cancel.is_cancelled() {
                tracing::info!("Announce loop cancelled");
                return Ok(());
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Announce loop cancelled during announce");
                    return Ok(());
                }
                result = self.announce_once() => result,
            };

            match response {
                Ok(response) => wait = self.config.announce_interval(response.interval),
                Err(e) => {
                    tracing::error!("Announce loop terminated: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn shutdown(&mut self, cancel: &CancellationToken) -> Result<(), TorrentError> {
        if self.announced == AnnounceStatus::None {
            tracing::info!("Stopping before any tracker answered");
            self.status = AnnounceStatus::Stopped;
            return Ok(());
        }

        self.status = AnnounceStatus::Stopped;
        tokio::select! {
            _ = cancel.cancelled() => tracing::info!("Stop announce abandoned"),
            result = self.announce_once() => match result {
                Ok(_) => tracing::info!("Sent stopped announce"),
                Err(e) => tracing::warn!("Stopped announce failed: {}", e),
            },
        }
        Ok(())
    }

    fn publish(&self, response: &AnnounceResponse) {
        let interval = self.config.announce_interval(response.interval);
        *self.snapshot.write() = PeerSnapshot {
            peers: response.peers.clone(),
            interval: Some(interval),
        };
    }
}

fn check_scheme(url: &Url) -> Result<(), TorrentError> {
    match url.scheme() {
        "http" | "https" | "udp" => Ok(()),
        scheme => Err(TorrentError::UnsupportedScheme {
            url: url.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}
