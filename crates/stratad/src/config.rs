//! TOML configuration for the Strata daemon.
//!
//! Every section and field is optional; the effective accessors on
//! [`CliConfig`] fill in defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use strata_chain::{ClientWins, ConflictPolicy, HeadOrder, RejectDivergent};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Node identity and addresses.
    pub node: NodeSection,
    /// Cluster membership.
    pub cluster: ClusterSection,
    /// Anti-entropy tuning.
    pub replication: ReplicationSection,
    /// Entry store settings.
    pub store: StoreSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Directory for persistent data (metadata DB, node key).
    pub data_dir: PathBuf,
    /// Address of the client listener.
    pub listen_addr: String,
    /// Refuse client writes on this node.
    pub read_only: bool,
}

impl Default for NodeSection {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".strata"))
            .unwrap_or_else(|| PathBuf::from(".strata"));
        Self {
            data_dir,
            listen_addr: "127.0.0.1:4830".to_string(),
            read_only: false,
        }
    }
}

/// `[cluster]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Shared secret; nodes with the same secret join the same gossip topic.
    ///
    /// If empty, a random secret is generated at startup and logged.
    pub secret: String,
    /// Peer nodes to contact on startup (`"endpoint-id"` or
    /// `"endpoint-id@host:port"`).
    pub peers: Vec<String>,
}

/// `[replication]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplicationSection {
    /// Milliseconds between two anti-entropy summaries.
    pub interval_ms: Option<u64>,
    /// Maximum number of updates resent in answer to one summary.
    pub max_resend: Option<usize>,
    /// Largest gossip message in bytes.
    pub max_message_size: Option<usize>,
}

/// `[store]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Backend type: `"file"` (default) or `"memory"`.
    pub backend: String,
    /// Conflict policy: `"head_order"` (default), `"client_wins"` or
    /// `"reject_divergent"`.
    pub policy: String,
    /// Maximum number of links kept per chain.
    pub chain_depth: Option<usize>,
    /// Keep superseded versions until compaction.
    pub retain_history: Option<bool>,
    /// Channel capacity behind each tree stream.
    pub stream_buffer: Option<usize>,
    /// Records read per lock acquisition while streaming.
    pub stream_batch: Option<usize>,
    /// Committed changes a watcher may fall behind by.
    pub watch_buffer: Option<usize>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            policy: "head_order".to_string(),
            chain_depth: None,
            retain_history: None,
            stream_buffer: None,
            stream_batch: None,
            watch_buffer: None,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Whether the node keeps nothing on disk.
    pub fn memory_mode(&self) -> bool {
        self.store.backend == "memory"
    }

    /// Effective anti-entropy interval (5 s default).
    pub fn replication_interval(&self) -> Duration {
        Duration::from_millis(self.replication.interval_ms.unwrap_or(5_000))
    }

    /// Effective resend cap per answered summary.
    pub fn max_resend(&self) -> usize {
        self.replication.max_resend.unwrap_or(256)
    }

    /// Effective gossip message size limit (1 MB default).
    pub fn max_message_size(&self) -> usize {
        self.replication.max_message_size.unwrap_or(1024 * 1024)
    }

    /// Effective chain depth.
    pub fn chain_depth(&self) -> usize {
        self.store.chain_depth.unwrap_or(5)
    }

    /// Effective history retention.
    pub fn retain_history(&self) -> bool {
        self.store.retain_history.unwrap_or(true)
    }

    /// Effective stream channel capacity.
    pub fn stream_buffer(&self) -> usize {
        self.store.stream_buffer.unwrap_or(64)
    }

    /// Effective stream batch size.
    pub fn stream_batch(&self) -> usize {
        self.store.stream_batch.unwrap_or(32)
    }

    /// Effective watcher backlog.
    pub fn watch_buffer(&self) -> usize {
        self.store.watch_buffer.unwrap_or(256)
    }

    /// The configured conflict policy.
    pub fn conflict_policy(&self) -> anyhow::Result<Arc<dyn ConflictPolicy>> {
        match self.store.policy.as_str() {
            "head_order" => Ok(Arc::new(HeadOrder)),
            "client_wins" => Ok(Arc::new(ClientWins)),
            "reject_divergent" => Ok(Arc::new(RejectDivergent)),
            other => anyhow::bail!("unknown conflict policy: {other}"),
        }
    }
}
