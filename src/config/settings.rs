use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the relay.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub buffer: BufferSettings,
    pub ingest: IngestSettings,
    pub source: SourceSettings,
    pub log: LogSettings,
}

/// Where subscribers connect, and how patient the relay is with them.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub subscriber_queue: usize,
    pub send_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
}

/// Retention and rendering of the rolling chat buffer.
#[derive(Debug, Deserialize, Clone)]
pub struct BufferSettings {
    pub max_messages: usize,
    pub max_message_width: usize,
    /// 0 = unlimited.
    pub max_lines: usize,
    pub separator_char: String,
    pub separator_len: usize,
}

/// Upstream polling and recovery.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestSettings {
    pub retry_wait_secs: u64,
    /// 0 disables the staleness watchdog.
    pub stale_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub console: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceSettings {
    pub feed_path: Option<String>,
    pub video_id: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub buffer: Option<PartialBufferSettings>,
    pub ingest: Option<PartialIngestSettings>,
    pub source: Option<SourceSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub subscriber_queue: Option<usize>,
    pub send_timeout_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBufferSettings {
    pub max_messages: Option<usize>,
    pub max_message_width: Option<usize>,
    pub max_lines: Option<usize>,
    pub separator_char: Option<String>,
    pub separator_len: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialIngestSettings {
    pub retry_wait_secs: Option<u64>,
    pub stale_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub console: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8765,
                subscriber_queue: 32,
                send_timeout_ms: 5000,
                shutdown_grace_ms: 2000,
            },
            buffer: BufferSettings {
                max_messages: 10,
                max_message_width: 100,
                max_lines: 0,
                separator_char: "-".to_string(),
                separator_len: 100,
            },
            ingest: IngestSettings {
                retry_wait_secs: 5,
                stale_timeout_secs: 120,
                poll_interval_ms: 500,
                console: true,
            },
            source: SourceSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let buffer = self.buffer.unwrap_or_default();
        let ingest = self.ingest.unwrap_or_default();
        let source = self.source.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                subscriber_queue: server
                    .subscriber_queue
                    .unwrap_or(default.server.subscriber_queue),
                send_timeout_ms: server
                    .send_timeout_ms
                    .unwrap_or(default.server.send_timeout_ms),
                shutdown_grace_ms: server
                    .shutdown_grace_ms
                    .unwrap_or(default.server.shutdown_grace_ms),
            },
            buffer: BufferSettings {
                max_messages: buffer
                    .max_messages
                    .unwrap_or(default.buffer.max_messages),
                max_message_width: buffer
                    .max_message_width
                    .unwrap_or(default.buffer.max_message_width),
                max_lines: buffer.max_lines.unwrap_or(default.buffer.max_lines),
                separator_char: buffer
                    .separator_char
                    .unwrap_or(default.buffer.separator_char),
                separator_len: buffer
                    .separator_len
                    .unwrap_or(default.buffer.separator_len),
            },
            ingest: IngestSettings {
                retry_wait_secs: ingest
                    .retry_wait_secs
                    .unwrap_or(default.ingest.retry_wait_secs),
                stale_timeout_secs: ingest
                    .stale_timeout_secs
                    .unwrap_or(default.ingest.stale_timeout_secs),
                poll_interval_ms: ingest
                    .poll_interval_ms
                    .unwrap_or(default.ingest.poll_interval_ms),
                console: ingest.console.unwrap_or(default.ingest.console),
            },
            source: SourceSettings {
                feed_path: source.feed_path.or(default.source.feed_path),
                video_id: source.video_id.or(default.source.video_id),
                url: source.url.or(default.source.url),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}

impl Settings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// At least one message is always retained.
    pub fn capacity(&self) -> usize {
        self.buffer.max_messages.max(1)
    }

    /// Narrower widths are clamped to 10 columns.
    pub fn wrap_width(&self) -> usize {
        self.buffer.max_message_width.max(10)
    }

    pub fn separator_char(&self) -> char {
        self.buffer.separator_char.chars().next().unwrap_or('-')
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.ingest.retry_wait_secs)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest.stale_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.ingest.poll_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.server.send_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.server.shutdown_grace_ms)
    }

    /// Canonical upstream URL: explicit `url`, else the YouTube watch URL
    /// for `video_id`, else the feed file.
    pub fn source_url(&self) -> Option<String> {
        if let Some(url) = &self.source.url {
            return Some(url.clone());
        }
        if let Some(video_id) = &self.source.video_id {
            return Some(format!("https://www.youtube.com/watch?v={video_id}"));
        }
        self.source
            .feed_path
            .as_ref()
            .map(|path| format!("file://{path}"))
    }
}
