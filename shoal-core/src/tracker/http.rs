//! HTTP tracker client implementation with URL building and response parsing

use async_trait::async_trait;
use url::Url;

use super::peers::parse_peers;
use super::protocol::encoding::url_encode_bytes;
use super::types::{AnnounceRequest, AnnounceResponse, TrackerClient};
use crate::bencode::{self, BencodeValue};
use crate::config::TrackerConfig;
use crate::torrent::TorrentError;

/// HTTP(S) tracker client sharing one connection pool across URLs.
pub struct HttpTrackerClient {
    client: reqwest::Client,
}

impl HttpTrackerClient {
    /// Creates HTTP tracker client using the configured timeout and user agent.
    ///
    /// # Errors
    /// - `TorrentError::Http` - TLS backend or client initialisation failed
    pub fn new(config: &TrackerConfig) -> Result<Self, TorrentError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()?;
        Ok(Self { client })
    }

    /// Build announce URL with query parameters.
    ///
    /// Binary fields are percent-encoded byte by byte. An existing query (for
    /// example a passkey) is kept and extended.
    pub(crate) fn build_announce_url(url: &Url, request: &AnnounceRequest) -> String {
        let mut query = format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}",
            url_encode_bytes(request.info_hash.as_bytes()),
            url_encode_bytes(request.peer_id.as_bytes()),
            request.port,
            request.progress.uploaded,
            request.progress.downloaded,
            request.progress.left,
        );
        if let Some(event) = request.event.as_query_value() {
            query.push_str("&event=");
            query.push_str(event);
        }
        if request.num_want >= 0 {
            query.push_str(&format!("&numwant={}", request.num_want));
        }

        let mut base = url.clone();
        base.set_fragment(None);
        let base = base.as_str();
        let separator = match url.query() {
            None => "?",
            Some(_) if base.ends_with('?') || base.ends_with('&') => "",
            Some(_) => "&",
        };
        format!("{base}{separator}{query}")
    }

    /// Parse tracker response from bencode data.
    ///
    /// # Errors
    /// - `TorrentError::TrackerRejected` - Response carries `failure reason`
    /// - `TorrentError::InvalidTrackerResponse` - Body is not a dictionary or lacks `interval`
    /// - `TorrentError::MalformedPeerList` - `peers` could not be decoded
    pub(crate) fn parse_announce_response(
        url: &Url,
        body: &[u8],
    ) -> Result<AnnounceResponse, TorrentError> {
        let parsed = bencode::decode(body).map_err(|e| {
            TorrentError::invalid_response(format!("Failed to parse tracker response: {e}"))
        })?;
        let Some(dict) = parsed.as_dict() else {
            return Err(TorrentError::invalid_response(format!(
                "expected dictionary, found {}",
                parsed.type_name()
            )));
        };

        if let Some(reason) = dict.get(b"failure reason".as_slice()) {
            let reason = reason
                .as_bytes()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_else(|| format!("{reason:?}"));
            return Err(TorrentError::TrackerRejected {
                url: url.to_string(),
                reason,
            });
        }

        let interval = match dict.get(b"interval".as_slice()) {
            Some(BencodeValue::Integer(value)) => u32::try_from(*value).map_err(|_| {
                TorrentError::invalid_response(format!("interval {value} out of range"))
            })?,
            _ => {
                return Err(TorrentError::invalid_response(
                    "Missing interval in tracker response",
                ));
            }
        };

        let peers = match dict.get(b"peers".as_slice()) {
            Some(value) => parse_peers(value)?,
            None => Vec::new(),
        };

        let count = |key: &[u8]| {
            dict.get(key)
                .and_then(BencodeValue::as_integer)
                .and_then(|value| u32::try_from(value).ok())
        };

        Ok(AnnounceResponse {
            interval,
            leechers: count(b"incomplete".as_slice()),
            seeders: count(b"complete".as_slice()),
            peers,
        })
    }
}

#[async_trait]
impl TrackerClient for HttpTrackerClient {
    /// Announces over HTTP GET and decodes the bencoded body.
    ///
    /// # Errors
    /// - `TorrentError::TrackerTimeout` - Request exceeded the configured timeout
    /// - `TorrentError::TrackerConnectionFailed` - Network or HTTP error
    /// - `TorrentError::TrackerServerError` - Non-success HTTP status
    /// - `TorrentError::TrackerRejected` - Tracker returned `failure reason`
    async fn announce(
        &mut self,
        url: &Url,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TorrentError> {
        let announce_url = Self::build_announce_url(url, request);
        tracing::debug!("Announcing to tracker: {}", url);

        let response = self.client.get(&announce_url).send().await.map_err(|e| {
            tracing::warn!("HTTP request to {} failed: {}", url, e);
            if e.is_timeout() {
                TorrentError::TrackerTimeout {
                    url: url.to_string(),
                }
            } else {
                TorrentError::TrackerConnectionFailed {
                    url: url.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Tracker {} returned error status: {}", url, status);
            return Err(TorrentError::TrackerServerError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read response body from {}: {}", url, e);
            if e.is_timeout() {
                TorrentError::TrackerTimeout {
                    url: url.to_string(),
                }
            } else {
                TorrentError::TrackerConnectionFailed {
                    url: url.to_string(),
                }
            }
        })?;

        let response = Self::parse_announce_response(url, &body)?;
        tracing::debug!(
            "Tracker {} returned {} peers, interval {}s",
            url,
            response.peers.len(),
            response.interval
        );
        Ok(response)
    }
}
