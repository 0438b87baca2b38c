use std::io::Read;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::base_system::context::FetchSettings;
use crate::download::FetchError;

/// A response whose status was already checked.
pub struct Fetched {
    /// The declared `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

impl Fetched {
    pub fn read_text(mut self, url: &str) -> Result<String, FetchError> {
        let mut buf = Vec::new();
        self.body
            .read_to_end(&mut buf)
            .map_err(|e| FetchError::transient(url, format!("body read failed: {e}")))?;
        String::from_utf8(buf).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            reason: format!("body is not valid UTF-8: {e}"),
        })
    }
}

/// One blocking GET. Implementations map 404 to `NotFound`, every other
/// failure to `Transient`.
pub trait HttpTransport {
    fn get(&self, url: &str, headers: HeaderMap) -> Result<Fetched, FetchError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(settings: &FetchSettings) -> anyhow::Result<Self> {
        // Built without the gzip decoder; ask for identity so lengths line up with the bytes.
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, headers: HeaderMap) -> Result<Fetched, FetchError> {
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .map_err(|e| FetchError::transient(url, e))?;

        let status = resp.status();
        debug!("GET {} -> {}", url, status.as_u16());
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::transient(url, e))?;

        Ok(Fetched {
            content_length: resp.content_length(),
            body: Box::new(resp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fetched(bytes: &[u8]) -> Fetched {
        Fetched {
            content_length: Some(bytes.len() as u64),
            body: Box::new(Cursor::new(bytes.to_vec())),
        }
    }

    #[test]
    fn text_body_is_decoded() {
        let text = fetched("var galleryinfo = {}".as_bytes())
            .read_text("https://ltn.hitomi.la/galleries/1.js")
            .unwrap();
        assert_eq!(text, "var galleryinfo = {}");
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let err = fetched(b"{\"name\":\"0\xff1.jpg\"}")
            .read_text("https://ltn.hitomi.la/galleries/1.js")
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }
}
