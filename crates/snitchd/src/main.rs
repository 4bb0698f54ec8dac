// # snitchd - Topology Snitch Daemon
//
// Thin integration layer: all topology and routing logic lives in
// snitch-core. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the in-process collaborators
// 4. Running the snitch until a shutdown signal arrives
//
// ## Configuration
//
// ### Placement
// - `SNITCH_DC`: Datacenter of this node
// - `SNITCH_RACK`: Rack of this node
// - `SNITCH_PREFER_LOCAL`: Re-route same-datacenter peers (true, false)
// - `SNITCH_PROPERTIES_FILE`: Properties file with dc/rack/prefer_local;
//   the variables above override it
//
// ### Addresses
// - `SNITCH_BROADCAST_ADDRESS`: Address this node is known by (default 127.0.0.1)
// - `SNITCH_LISTEN_ADDRESS`: Internal address advertised to peers (default: this machine's host name)
//
// ### Topology sources
// - `SNITCH_TOPOLOGY_FILE`: Legacy static placement file (optional)
// - `SNITCH_PEERS_FILE`: Persisted peer placement (optional, in-memory otherwise)
//
// ### Logging
// - `SNITCH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export SNITCH_DC=dc1
// export SNITCH_RACK=r1
// export SNITCH_PREFER_LOCAL=true
// export SNITCH_BROADCAST_ADDRESS=203.0.113.10
// export SNITCH_LISTEN_ADDRESS=10.0.0.10
// export SNITCH_PEERS_FILE=/var/lib/snitch/peers.json
//
// snitchd
// ```

use anyhow::Result;
use snitch_core::{
    Endpoint, FileTopologyStore, GossipingSnitch, LocalMembership, MemoryTopologyStore,
    PersistedTopologyStore, RouteTable, SnitchCollaborators, SnitchConfig, SystemHostResolver,
    TopologyLookup, load_static_topology,
};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SnitchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SnitchExitCode> for ExitCode {
    fn from(code: SnitchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    dc: Option<String>,
    rack: Option<String>,
    prefer_local: Option<String>,
    properties_file: Option<String>,
    topology_file: Option<String>,
    peers_file: Option<String>,
    broadcast_address: String,
    listen_address: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            dc: non_empty_var("SNITCH_DC"),
            rack: non_empty_var("SNITCH_RACK"),
            prefer_local: non_empty_var("SNITCH_PREFER_LOCAL"),
            properties_file: non_empty_var("SNITCH_PROPERTIES_FILE"),
            topology_file: non_empty_var("SNITCH_TOPOLOGY_FILE"),
            peers_file: non_empty_var("SNITCH_PEERS_FILE"),
            broadcast_address: non_empty_var("SNITCH_BROADCAST_ADDRESS")
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            listen_address: non_empty_var("SNITCH_LISTEN_ADDRESS"),
            log_level: env::var("SNITCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Placement itself is checked once the properties file is merged in.
    fn validate(&self) -> Result<()> {
        if let Some(ref value) = self.prefer_local {
            parse_bool(value)?;
        }

        if self.broadcast_address.parse::<Endpoint>().is_err() {
            anyhow::bail!(
                "SNITCH_BROADCAST_ADDRESS '{}' is not an IP address",
                self.broadcast_address
            );
        }

        if let Some(ref path) = self.properties_file
            && !Path::new(path).is_file()
        {
            anyhow::bail!("SNITCH_PROPERTIES_FILE does not exist: {}", path);
        }

        if let Some(ref path) = self.peers_file
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "SNITCH_PEERS_FILE parent directory does not exist: {}. \
                    Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SNITCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the snitch configuration: properties file first, then env vars
    async fn snitch_config(&self) -> Result<SnitchConfig> {
        let base = match self.properties_file {
            Some(ref path) => {
                info!("Reading snitch properties from {}", path);
                SnitchConfig::load(path).await?
            }
            None => SnitchConfig::default(),
        };

        let overlay = SnitchConfig {
            dc: self.dc.clone(),
            rack: self.rack.clone(),
            prefer_local: false,
            listen_address: self.listen_address.clone(),
        };

        let mut config = base.merge(overlay);
        if let Some(ref value) = self.prefer_local {
            config.prefer_local = parse_bool(value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => anyhow::bail!(
            "SNITCH_PREFER_LOCAL '{}' is not valid. Valid values: true, false",
            value
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SnitchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SnitchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SnitchExitCode::ConfigError.into();
    }

    info!("Starting snitchd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SnitchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => SnitchExitCode::CleanShutdown,
            Err(e) if is_config_error(&e) => {
                error!("Configuration error: {}", e);
                SnitchExitCode::ConfigError
            }
            Err(e) => {
                error!("Daemon error: {}", e);
                SnitchExitCode::RuntimeError
            }
        }
    });

    result.into()
}

fn is_config_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<snitch_core::Error>()
        .is_some_and(snitch_core::Error::is_fatal)
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let snitch_config = config.snitch_config().await?;
    let self_address: Endpoint = config.broadcast_address.parse()?;

    let membership = LocalMembership::new(self_address);
    let routes = RouteTable::new();

    let store: Arc<dyn PersistedTopologyStore> = match config.peers_file {
        Some(ref path) => {
            info!("Persisted peer placement: {}", path);
            Arc::new(FileTopologyStore::new(path))
        }
        None => {
            info!("No SNITCH_PEERS_FILE set; persisted placement kept in memory");
            Arc::new(MemoryTopologyStore::new())
        }
    };

    let static_topology = match config.topology_file {
        Some(ref path) => load_static_topology(path).await,
        None => None,
    };

    let collaborators = SnitchCollaborators {
        membership: Arc::new(membership.clone()),
        static_topology,
        store,
        router: Arc::new(routes.clone()),
        host_resolver: Arc::new(SystemHostResolver::new()),
    };

    let snitch = Arc::new(GossipingSnitch::new(&snitch_config, collaborators)?);
    snitch.on_service_starting().await;

    let topology = snitch.topology(&self_address).await;
    info!(
        "Node {} placed in datacenter={}, rack={}",
        self_address, topology.datacenter, topology.rack
    );
    info!("Ready to track peer topology");

    let shutdown_result = wait_for_shutdown().await;

    snitch.shutdown();
    membership.shutdown();
    info!("Re-routed peers at shutdown: {}", routes.len().await);

    match shutdown_result {
        Ok(signal) => {
            info!("Received shutdown signal: {}", signal);
            info!("Shutting down daemon");
            Ok(())
        }
        Err(e) => {
            error!("Shutdown error: {}", e);
            Err(e)
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
