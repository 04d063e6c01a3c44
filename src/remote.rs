use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::{Compression, Credentials};
use crate::error::ReshakeError;

/// An open response body and the length the server announced for it.
pub struct RemoteBody {
    pub reader: Box<dyn Read + Send>,
    pub content_length: Option<u64>,
}

pub trait RemoteClient: Send + Sync {
    /// Connect-and-check: true when the server answers with success.
    /// Must not read the body.
    fn probe(&self, url: &str, credentials: Option<&Credentials>) -> bool;
    fn open(&self, url: &str, credentials: Option<&Credentials>)
    -> Result<RemoteBody, ReshakeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub reachable: bool,
    pub effective_url: String,
}

/// Find the URL that actually serves `url`, falling back once from a
/// compressed name to its uncompressed variant.
pub fn resolve<C: RemoteClient + ?Sized>(
    client: &C,
    url: &str,
    credentials: Option<&Credentials>,
) -> Resolution {
    let url = normalize_url(url);
    if client.probe(&url, credentials) {
        return Resolution {
            reachable: true,
            effective_url: url,
        };
    }

    if let Some(suffix) = Compression::from_name(&url).suffix() {
        let fallback = url[..url.len() - suffix.len()].to_string();
        debug!(%url, %fallback, "compressed variant unreachable, trying uncompressed");
        if client.probe(&fallback, credentials) {
            return Resolution {
                reachable: true,
                effective_url: fallback,
            };
        }
    }

    Resolution {
        reachable: false,
        effective_url: url,
    }
}

/// Repository FTP mirrors are also served over HTTPS.
pub fn normalize_url(url: &str) -> String {
    for host in ["ftp.pride.ebi.ac.uk/", "ftp.ebi.ac.uk/", "ftp.ncbi.nlm.nih.gov/"] {
        if let Some(rest) = url.strip_prefix(&format!("ftp://{host}")) {
            return format!("https://{host}{rest}");
        }
    }
    url.to_string()
}

#[derive(Clone)]
pub struct PrideHttpClient {
    client: Client,
}

impl PrideHttpClient {
    pub fn new() -> Result<Self, ReshakeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("reshake/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReshakeError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            // whole-request timeout off: archives run to gigabytes
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| ReshakeError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn request(&self, url: &str, credentials: Option<&Credentials>) -> RequestBuilder {
        let request = self.client.get(url);
        match credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }
}

impl RemoteClient for PrideHttpClient {
    fn probe(&self, url: &str, credentials: Option<&Credentials>) -> bool {
        match self.request(url, credentials).send() {
            // dropping the response closes the connection without reading the body
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    debug!(%url, status = response.status().as_u16(), "probe rejected");
                }
                ok
            }
            Err(err) => {
                debug!(%url, error = %err, "probe failed");
                false
            }
        }
    }

    fn open(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<RemoteBody, ReshakeError> {
        let response = self
            .request(url, credentials)
            .send()
            .map_err(|err| ReshakeError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ReshakeError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        let content_length = response.content_length();
        Ok(RemoteBody {
            reader: Box::new(response),
            content_length,
        })
    }
}
