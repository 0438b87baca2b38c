//! Fakes shared by the download tests: a scripted transport, a sleeper that
//! only records, and a canned index resolver.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};
use std::rc::Rc;
use std::time::Duration;

use reqwest::header::HeaderMap;

use super::error::FetchError;
use crate::base_system::retry::Sleeper;
use crate::network_parser::index_page::{IndexEntry, IndexResolver};
use crate::network_parser::transport::{Fetched, HttpTransport};

#[derive(Debug, Clone)]
pub enum FakeReply {
    /// 200 with this body; `declared` overrides the Content-Length.
    Body {
        bytes: Vec<u8>,
        declared: Option<u64>,
    },
    /// The body errors out after the first `sent` bytes.
    Truncated { declared: u64, sent: Vec<u8> },
    Status(u16),
    Network,
    /// The attempt fails on the local side with this I/O error kind.
    LocalIo(io::ErrorKind),
}

impl FakeReply {
    pub fn bytes(bytes: &[u8]) -> Self {
        Self::Body {
            bytes: bytes.to_vec(),
            declared: Some(bytes.len() as u64),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::bytes(text.as_bytes())
    }

    pub fn lying(bytes: &[u8], declared: u64) -> Self {
        Self::Body {
            bytes: bytes.to_vec(),
            declared: Some(declared),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub headers: HeaderMap,
}

/// Each URL has a queue of replies; the last one repeats forever.
#[derive(Default)]
pub struct FakeTransport {
    routes: RefCell<HashMap<String, VecDeque<FakeReply>>>,
    calls: RefCell<Vec<Call>>,
    body_reads: Rc<Cell<usize>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, replies: Vec<FakeReply>) {
        self.routes
            .borrow_mut()
            .insert(url.to_string(), replies.into());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.url == url).count()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.url.clone()).collect()
    }

    /// How many `read` calls hit any response body.
    pub fn body_reads(&self) -> usize {
        self.body_reads.get()
    }
}

impl HttpTransport for FakeTransport {
    fn get(&self, url: &str, headers: HeaderMap) -> Result<Fetched, FetchError> {
        self.calls.borrow_mut().push(Call {
            url: url.to_string(),
            headers,
        });

        let reply = {
            let mut routes = self.routes.borrow_mut();
            let queue = routes.get_mut(url);
            match queue {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            }
        };

        match reply.unwrap_or(FakeReply::Status(404)) {
            FakeReply::Body { bytes, declared } => Ok(Fetched {
                content_length: declared,
                body: Box::new(CountingReader {
                    inner: io::Cursor::new(bytes),
                    fail_after: None,
                    reads: Rc::clone(&self.body_reads),
                }),
            }),
            FakeReply::Truncated { declared, sent } => Ok(Fetched {
                content_length: Some(declared),
                body: Box::new(CountingReader {
                    fail_after: Some(sent.len()),
                    inner: io::Cursor::new(sent),
                    reads: Rc::clone(&self.body_reads),
                }),
            }),
            FakeReply::Status(404) => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
            FakeReply::Status(code) => Err(FetchError::transient(url, format!("HTTP {code}"))),
            FakeReply::Network => Err(FetchError::transient(url, "connection reset")),
            FakeReply::LocalIo(kind) => Err(FetchError::io(
                url,
                io::Error::new(kind, "scripted local failure"),
            )),
        }
    }
}

struct CountingReader {
    inner: io::Cursor<Vec<u8>>,
    fail_after: Option<usize>,
    reads: Rc<Cell<usize>>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.set(self.reads.get() + 1);
        let n = self.inner.read(buf)?;
        if n == 0
            && let Some(limit) = self.fail_after
            && self.inner.position() as usize >= limit
        {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-body",
            ));
        }
        Ok(n)
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    naps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn naps(&self) -> Vec<Duration> {
        self.naps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.naps.borrow_mut().push(duration);
    }
}

/// Page URL -> (target, title); unknown pages fail resolution.
#[derive(Default)]
pub struct FakeIndex {
    entries: HashMap<String, IndexEntry>,
}

impl FakeIndex {
    pub fn with(mut self, page_url: &str, target_url: &str, title: &str) -> Self {
        self.entries.insert(
            page_url.to_string(),
            IndexEntry {
                target_url: target_url.to_string(),
                title: title.to_string(),
            },
        );
        self
    }
}

impl IndexResolver for FakeIndex {
    fn resolve(&self, page_url: &str) -> Result<IndexEntry, FetchError> {
        self.entries
            .get(page_url)
            .cloned()
            .ok_or_else(|| FetchError::Resolution {
                url: page_url.to_string(),
                reason: "no gallery link on page".to_string(),
            })
    }
}
