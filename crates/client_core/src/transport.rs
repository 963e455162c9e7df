//! Request/response and long-poll primitives against the review
//! service. Stateless beyond the HTTP client handle; the one-poll-at-a-
//! time rule lives in the session, not here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::{
    domain::Sample,
    protocol::{
        AckEnvelope, MessageRequest, SnapshotEnvelope, SnapshotPayload, UpdateCursor,
        UpdatesEnvelope, UpdatesPayload,
    },
};

#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// `POST /message {"action":"getData"}` — full corpus snapshot.
    async fn fetch_snapshot(&self) -> Result<SnapshotPayload>;

    /// `GET /getupdates?nextId=<cursor>` — snapshot, patches, or heartbeat.
    async fn fetch_updates(&self, cursor: UpdateCursor) -> Result<UpdatesPayload>;

    /// `POST /message {"action":"update","data":<sample>}` — persist one
    /// locally mutated sample. The ack body is not interpreted.
    async fn submit_update(&self, sample: &Sample) -> Result<()>;

    /// `GET /images/<basename>` — raw bytes of a rendered image.
    async fn fetch_image(&self, basename: &str) -> Result<Vec<u8>>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    server_url: String,
}

impl HttpTransport {
    pub fn new(server_url: impl Into<String>) -> Self {
        let mut server_url = server_url.into();
        while server_url.ends_with('/') {
            server_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            server_url,
        }
    }
}

#[async_trait]
impl UpdateTransport for HttpTransport {
    async fn fetch_snapshot(&self) -> Result<SnapshotPayload> {
        let envelope: SnapshotEnvelope = self
            .http
            .post(format!("{}/message", self.server_url))
            .json(&MessageRequest::GetData)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed snapshot response")?;
        Ok(envelope.response)
    }

    async fn fetch_updates(&self, cursor: UpdateCursor) -> Result<UpdatesPayload> {
        let envelope: UpdatesEnvelope = self
            .http
            .get(format!("{}/getupdates", self.server_url))
            .query(&[("nextId", cursor.0)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed updates response")?;
        Ok(envelope.response)
    }

    async fn submit_update(&self, sample: &Sample) -> Result<()> {
        let _ack: AckEnvelope = self
            .http
            .post(format!("{}/message", self.server_url))
            .json(&MessageRequest::Update {
                data: sample.clone(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed update ack")?;
        Ok(())
    }

    async fn fetch_image(&self, basename: &str) -> Result<Vec<u8>> {
        let bytes = self
            .http
            .get(format!("{}/images/{basename}", self.server_url))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
