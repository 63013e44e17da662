use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use super::descriptor::{PeakDescriptor, descriptor_url};
use crate::error::{MediaError, Result};

/// Where peak descriptors come from. `Ok(None)` means "no descriptor exists
/// for this source", which is a normal outcome.
#[async_trait]
pub trait PeakSource: Send + Sync {
    async fn fetch(&self, audio_src: &str) -> Result<Option<PeakDescriptor>>;
}

/// Fetches descriptors over HTTP from a static host.
#[derive(Clone)]
pub struct HttpPeakSource {
    client: Client,
    base: Url,
}

impl fmt::Debug for HttpPeakSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPeakSource")
            .field("base", &self.base.as_str())
            .finish()
    }
}

impl HttpPeakSource {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl PeakSource for HttpPeakSource {
    async fn fetch(&self, audio_src: &str) -> Result<Option<PeakDescriptor>> {
        let url = descriptor_url(&self.base, audio_src)?;
        log::debug!("fetching peak descriptor {url}");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| MediaError::PeakFetch(format!("{url}: {err}")))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                log::debug!("no peak descriptor published at {url}");
                Ok(None)
            }
            status if status.is_success() => {
                let body = response.text().await?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            status => Err(MediaError::PeakFetch(format!("{url}: HTTP {status}"))),
        }
    }
}
