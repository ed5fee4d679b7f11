//! `stratad`: the Strata daemon.
//!
//! Binary entrypoint that runs one replica: the entry store, replication
//! over iroh-gossip and the client listener.
//!
//! # Usage
//!
//! ```text
//! stratad start                               # start the node
//! stratad start -c strata.toml                # start with a config file
//! stratad start -d ./node2 -l 127.0.0.1:4831  # second instance
//! stratad start --peer <endpoint_id>          # join an existing cluster
//! stratad status                              # show persisted counters
//! ```

mod config;
mod server;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iroh::discovery::static_provider::StaticProvider;
use iroh::{Endpoint, EndpointAddr, EndpointId, SecretKey};
use strata_engine::{Dispatcher, ReadOnly, StrataNode, StrataNodeConfig};
use strata_meta::MetaStore;
use strata_net::{GossipTransport, Transport};
use strata_replica::{ReplicaConfig, ReplicaStore, Replicator};
use strata_types::NodeId;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use config::CliConfig;
use server::ClientServer;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "stratad", version, about = "Strata replicated tree store daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Strata node.
    Start {
        /// Override data directory (useful for running multiple instances).
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Override client listen address (e.g. "127.0.0.1:4831").
        #[arg(short = 'l', long)]
        listen_addr: Option<String>,

        /// Peer node(s) to connect to on startup.
        ///
        /// Format: `<endpoint_id>` or `<endpoint_id>@<host:port>`.
        /// Can be specified multiple times.
        #[arg(short, long)]
        peer: Vec<String>,

        /// Cluster secret (nodes must share the same secret).
        #[arg(long, env = "STRATA_SECRET")]
        secret: Option<String>,

        /// Run fully in-memory (no disk persistence).
        #[arg(short, long)]
        memory: bool,

        /// Refuse client writes.
        #[arg(long)]
        read_only: bool,
    },

    /// Show the persisted node counters.
    Status,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Start {
            data_dir,
            listen_addr,
            peer,
            secret,
            memory,
            read_only,
        } => {
            // CLI args override config file values.
            if let Some(dir) = data_dir {
                config.node.data_dir = dir;
            }
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            if !peer.is_empty() {
                config.cluster.peers = peer;
            }
            if let Some(s) = secret {
                config.cluster.secret = s;
            }
            if memory {
                config.store.backend = "memory".to_string();
            }
            if read_only {
                config.node.read_only = true;
            }
            cmd_start(config).await
        }
        Commands::Status => cmd_status(&config),
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// stratad start
// -----------------------------------------------------------------------

async fn cmd_start(mut config: CliConfig) -> Result<()> {
    info!("starting stratad");
    info!(
        data_dir = %config.node.data_dir.display(),
        listen_addr = %config.node.listen_addr,
        backend = %config.store.backend,
        policy = %config.store.policy,
        chain_depth = config.chain_depth(),
        read_only = config.node.read_only,
        "node configuration"
    );

    let memory_mode = config.memory_mode();
    let policy = config.conflict_policy()?;

    if !memory_mode {
        std::fs::create_dir_all(&config.node.data_dir)
            .context("failed to create data directory")?;
    }

    // --- Node identity (iroh SecretKey) ---
    let secret_key = if memory_mode {
        info!("generated ephemeral node key (memory mode)");
        random_secret_key()
    } else {
        load_or_create_secret_key(&config.node.data_dir)?
    };
    let public_key = secret_key.public();
    let node_id = NodeId::from(*public_key.as_bytes());
    info!(node = %node_id.short(), endpoint_id = %public_key.fmt_short(), "node identity");

    // --- Cluster secret ---
    let generated_secret = config.cluster.secret.is_empty();
    if generated_secret {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        config.cluster.secret = bytes.iter().map(|b| format!("{b:02x}")).collect();
    }
    info!(
        cluster_id = %blake3::hash(config.cluster.secret.as_bytes()).to_hex()[..16],
        "cluster identity derived from secret"
    );

    // --- Endpoint and peers ---
    let discovery = StaticProvider::new();
    let mut bootstrap = Vec::new();
    for peer_str in &config.cluster.peers {
        match parse_peer(peer_str) {
            Ok(addr) => {
                info!(peer = %peer_str, "bootstrapping via peer");
                bootstrap.push(addr.id);
                discovery.add_endpoint_info(addr);
            }
            Err(e) => warn!(peer = %peer_str, %e, "invalid peer format, skipping"),
        }
    }

    let endpoint = Endpoint::builder()
        .secret_key(secret_key)
        .alpns(vec![iroh_gossip::net::GOSSIP_ALPN.to_vec()])
        .discovery(discovery)
        .relay_mode(iroh::RelayMode::Default)
        .bind()
        .await
        .context("failed to bind iroh endpoint")?;
    for addr in endpoint.addr().ip_addrs() {
        info!(%addr, "iroh endpoint listening on");
    }

    let transport: Arc<dyn Transport> = Arc::new(
        GossipTransport::start(
            endpoint.clone(),
            config.cluster.secret.as_bytes(),
            bootstrap,
            config.max_message_size(),
        )
        .await
        .context("failed to start gossip")?,
    );

    if generated_secret {
        info!("cluster secret (generated): {}", config.cluster.secret);
    }
    info!(
        "to join this node: stratad start --secret {} --peer {}",
        config.cluster.secret,
        endpoint.id()
    );

    // --- Store ---
    let mut node = StrataNode::new(StrataNodeConfig {
        node_id,
        chain_depth: config.chain_depth(),
        retain_history: config.retain_history(),
        stream_buffer: config.stream_buffer(),
        stream_batch: config.stream_batch(),
        watch_buffer: config.watch_buffer(),
    })
    .with_policy(policy);

    if memory_mode {
        info!("running without metadata store");
    } else {
        let meta_path = config.node.data_dir.join("meta");
        let meta = MetaStore::open(&meta_path).context("failed to open metadata store")?;
        node = node.with_meta(Arc::new(meta));
    }
    let node = Arc::new(node.with_transport(transport.clone()));
    node.restore().await.context("failed to restore store")?;

    // --- Replication ---
    let replicator = Replicator::new(
        node.clone() as Arc<dyn ReplicaStore>,
        transport,
        ReplicaConfig {
            interval: config.replication_interval(),
            max_resend: config.max_resend(),
        },
    );
    let tasks = replicator
        .start()
        .await
        .context("failed to start replication")?;
    if let Err(e) = replicator.announce().await {
        warn!(%e, "initial summary failed");
    }

    // --- Client listener ---
    let mut dispatcher = Dispatcher::new(node);
    if config.node.read_only {
        dispatcher = dispatcher.with_gate(Arc::new(ReadOnly));
    }
    let server = ClientServer::new(Arc::new(dispatcher));

    let listener = TcpListener::bind(&config.node.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.node.listen_addr))?;
    info!(addr = %config.node.listen_addr, "client listener ready");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "failed to listen for ctrl-c");
        }
    };
    let served = server.serve(listener, shutdown).await;

    info!("shutting down");
    tasks.shutdown();
    endpoint.close().await;

    served.context("client listener failed")
}

// -----------------------------------------------------------------------
// Networking helpers
// -----------------------------------------------------------------------

/// Parse a peer string.
///
/// Formats:
/// - `<endpoint_id>`: hex-encoded public key, reached through the relay
/// - `<endpoint_id>@<host:port>`: with an explicit direct address
fn parse_peer(s: &str) -> Result<EndpointAddr> {
    let (id_str, addr_str) = match s.split_once('@') {
        Some((id, addr)) => (id, Some(addr)),
        None => (s, None),
    };

    let endpoint_id: EndpointId = id_str
        .parse()
        .context("invalid endpoint ID (expected hex-encoded public key)")?;

    let mut endpoint_addr = EndpointAddr::new(endpoint_id);
    if let Some(addr) = addr_str {
        let socket_addr: SocketAddr = addr
            .parse()
            .context("invalid socket address in peer (expected host:port)")?;
        endpoint_addr = endpoint_addr.with_ip_addr(socket_addr);
    }

    Ok(endpoint_addr)
}

// -----------------------------------------------------------------------
// Key management
// -----------------------------------------------------------------------

fn random_secret_key() -> SecretKey {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    SecretKey::from(bytes)
}

/// Load or create a persistent iroh secret key from `data_dir/node.key`.
///
/// The key doubles as the store's node identifier, so it must survive
/// restarts: ticks persisted under one identity are meaningless under
/// another.
fn load_or_create_secret_key(data_dir: &Path) -> Result<SecretKey> {
    let key_path = data_dir.join("node.key");
    if key_path.exists() {
        let bytes = std::fs::read(&key_path).context("failed to read node.key")?;
        anyhow::ensure!(bytes.len() == 32, "node.key must be exactly 32 bytes");
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        let key = SecretKey::from_bytes(&arr);
        info!(endpoint_id = %key.public().fmt_short(), "loaded existing node key");
        Ok(key)
    } else {
        let key = random_secret_key();
        std::fs::write(&key_path, key.to_bytes()).context("failed to write node.key")?;
        info!(
            path = %key_path.display(),
            endpoint_id = %key.public().fmt_short(),
            "generated new node key"
        );
        Ok(key)
    }
}

// -----------------------------------------------------------------------
// stratad status
// -----------------------------------------------------------------------

fn cmd_status(config: &CliConfig) -> Result<()> {
    let meta_path = config.node.data_dir.join("meta");

    let meta = MetaStore::open(&meta_path).map_err(|e| {
        error!(path = %meta_path.display(), %e, "failed to open metadata store");
        anyhow::anyhow!(
            "cannot open metadata at {}. Is the node running? ({e})",
            meta_path.display(),
        )
    })?;

    let entries = meta.list_entries()?;
    let tombstones = entries.iter().filter(|e| e.value.is_none()).count();
    println!("Entries: {} ({tombstones} tombstones)", entries.len());

    let nodes = meta.list_nodes()?;
    println!("Origins: {}", nodes.len());
    for record in &nodes {
        println!(
            "  {} tick={} tock={}",
            record.node, record.tick, record.tock
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
