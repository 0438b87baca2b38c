//! Global configuration (`Config`) and its defaults.
//!
//! Also carries the field metadata used to generate a commented `config.yml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use super::retry::RetryPolicy;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_4) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/73.0.3683.103 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Network
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    // Remote layout
    #[serde(default = "default_metadata_host")]
    pub metadata_host: String,
    #[serde(default = "default_metadata_ext")]
    pub metadata_ext: String,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default = "default_cdn_host")]
    pub cdn_host: String,
    #[serde(default = "default_reader_host")]
    pub reader_host: String,
    #[serde(default = "default_index_link_text")]
    pub index_link_text: String,

    // Output
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            metadata_host: default_metadata_host(),
            metadata_ext: default_metadata_ext(),
            metadata_prefix: default_metadata_prefix(),
            cdn_host: default_cdn_host(),
            reader_host: default_reader_host(),
            index_link_text: default_index_link_text(),
            save_path: String::new(),
            show_progress: default_true(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 13] = [
            FieldMeta {
                name: "user_agent",
                description: "User-Agent sent with every request",
            },
            FieldMeta {
                name: "max_attempts",
                description: "Attempts per request before giving up (>= 1)",
            },
            FieldMeta {
                name: "retry_delay_ms",
                description: "Delay between attempts, in ms",
            },
            FieldMeta {
                name: "request_timeout",
                description: "Request timeout, in seconds",
            },
            FieldMeta {
                name: "connect_timeout",
                description: "Connect timeout, in seconds",
            },
            FieldMeta {
                name: "metadata_host",
                description: "Host serving galleries/<id>.<ext> manifests",
            },
            FieldMeta {
                name: "metadata_ext",
                description: "Manifest file extension",
            },
            FieldMeta {
                name: "metadata_prefix",
                description: "Text that precedes the JSON object in a manifest",
            },
            FieldMeta {
                name: "cdn_host",
                description: "Image CDN host; the shard label is prepended as a subdomain",
            },
            FieldMeta {
                name: "reader_host",
                description: "Host used to build the Referer (https://<host>/reader/<id>.html)",
            },
            FieldMeta {
                name: "index_link_text",
                description: "Anchor text that marks the gallery link on a mirror index page",
            },
            FieldMeta {
                name: "save_path",
                description: "Output directory for archives (empty = current directory)",
            },
            FieldMeta {
                name: "show_progress",
                description: "Show a progress bar per gallery",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        let trimmed = self.save_path.trim();
        if trimmed.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(trimmed)
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            retry: RetryPolicy::new(
                self.max_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ),
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
            connect_timeout: Duration::from_secs(self.connect_timeout.max(1)),
            metadata_host: self.metadata_host.trim().to_string(),
            metadata_ext: self.metadata_ext.trim().trim_start_matches('.').to_string(),
            metadata_prefix: self.metadata_prefix.clone(),
            cdn_host: self.cdn_host.trim().to_string(),
            reader_host: self.reader_host.trim().to_string(),
            index_link_text: self.index_link_text.trim().to_string(),
        }
    }
}

/// Everything the fetch components need, handed to each of them explicitly.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub metadata_host: String,
    pub metadata_ext: String,
    pub metadata_prefix: String,
    pub cdn_host: String,
    pub reader_host: String,
    pub index_link_text: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Config::default().fetch_settings()
    }
}

impl FetchSettings {
    pub fn metadata_url(&self, gallery_id: &str) -> String {
        format!(
            "https://{}/galleries/{}.{}",
            self.metadata_host, gallery_id, self.metadata_ext
        )
    }

    pub fn referer_url(&self, gallery_id: &str) -> String {
        format!("https://{}/reader/{}.html", self.reader_host, gallery_id)
    }
}

/// Turns a gallery title into something usable as a single file name.
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let sub = replacement.chars().next().unwrap_or('_');
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => sub,
            c if (c as u32) < 32 => sub,
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = cleaned.to_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // Back off to a char boundary so multi-byte titles don't panic.
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_attempts() -> u32 {
    4
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_metadata_host() -> String {
    "ltn.hitomi.la".to_string()
}

fn default_metadata_ext() -> String {
    "js".to_string()
}

fn default_metadata_prefix() -> String {
    "var galleryinfo = ".to_string()
}

fn default_cdn_host() -> String {
    "hitomi.la".to_string()
}

fn default_reader_host() -> String {
    "hitomi.la".to_string()
}

fn default_index_link_text() -> String {
    "hitomi.la".to_string()
}
