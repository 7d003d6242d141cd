use anyhow::{Context, Result};
use azgraph::azure::auth::ClientSecretCredential;
use azgraph::azure::client::ResourceGraphClient;
use azgraph::azure::http::format_azure_error;
use azgraph::azure::subscriptions;
use azgraph::config::{Config, ENV_CLIENT_SECRET};
use azgraph::integration::{self, Endpoints};
use azgraph::resource::{
    Delivery, FetchOptions, FnSink, Resource, ResourceGraphDescriber, TriggerType, DEFAULT_TABLE,
};
use azgraph::{DescribeError, SinkError};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Describe Azure resources through Resource Graph
#[derive(Parser, Debug)]
#[command(name = "azgraph", version = azgraph::VERSION, about, long_about = None)]
struct Args {
    /// Entra ID tenant
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Service principal client id
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe every resource of one type
    Describe {
        /// Resource type, e.g. Microsoft.Compute/virtualMachines
        #[arg(short = 't', long = "type")]
        resource_type: String,

        /// Resource Graph table
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,

        /// Subscriptions to query (defaults to config, then all visible ones)
        #[arg(short, long = "subscription")]
        subscriptions: Vec<String>,

        /// Print resources as JSON lines as they are discovered
        #[arg(long)]
        stream: bool,

        /// Mark the run as manually triggered
        #[arg(long)]
        manual: bool,

        /// Subscription batches queried at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Pause while the Resource Graph throttling quota is exhausted
        #[arg(long)]
        respect_quota: bool,
    },
    /// List enabled subscriptions
    Subscriptions,
    /// Verify the credentials can see at least one subscription
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azgraph started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azgraph").join("azgraph.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azgraph").join("azgraph.log");
    }
    PathBuf::from("azgraph.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();
    if let Some(tenant) = &args.tenant {
        config.tenant_id = Some(tenant.clone());
    }
    if let Some(client_id) = &args.client_id {
        config.client_id = Some(client_id.clone());
    }

    match args.command {
        Command::Describe {
            resource_type,
            table,
            subscriptions,
            stream,
            manual,
            concurrency,
            respect_quota,
        } => {
            let client = build_client(&config)?;
            let subscriptions = resolve_subscriptions(&client, &config, subscriptions).await?;
            let describer = ResourceGraphDescriber::new(&table, &resource_type);

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling describe");
                    on_ctrl_c.cancel();
                }
            });

            let options = FetchOptions::default()
                .with_concurrency(concurrency.unwrap_or_else(|| config.effective_concurrency()))
                .with_respect_quota(respect_quota)
                .with_cancellation(cancel);
            let trigger = if manual {
                TriggerType::Manual
            } else {
                TriggerType::Scheduled
            };

            run_describe(&client, &describer, &subscriptions, trigger, stream, &options).await
        }
        Command::Subscriptions => {
            let client = build_client(&config)?;
            let subs = subscriptions::list_subscriptions(&client)
                .await
                .map_err(|e| anyhow::anyhow!(format_azure_error(&e)))?;
            for sub in subs {
                println!("{}\t{}", sub.subscription_id, sub.display_name);
            }
            Ok(())
        }
        Command::Health => {
            let tenant = config
                .tenant_id
                .clone()
                .context("No tenant configured. Set AZURE_TENANT_ID or use --tenant")?;
            let payload = serde_json::json!({
                "tenantId": tenant,
                "clientId": config.client_id.clone().unwrap_or_default(),
                "clientPassword": Config::client_secret().unwrap_or_default(),
            });
            let endpoints = Endpoints {
                authority: config.effective_authority().to_string(),
                arm: config.effective_endpoint().to_string(),
            };

            let healthy =
                integration::health_check(payload.to_string().as_bytes(), &tenant, &endpoints)
                    .await?;
            println!("{}", if healthy { "healthy" } else { "no subscriptions visible" });
            if healthy {
                Ok(())
            } else {
                anyhow::bail!("Health check found no enabled subscriptions")
            }
        }
    }
}

fn build_client(config: &Config) -> Result<ResourceGraphClient> {
    let tenant = config
        .tenant_id
        .as_deref()
        .context("No tenant configured. Set AZURE_TENANT_ID or use --tenant")?;
    let client_id = config
        .client_id
        .as_deref()
        .context("No client id configured. Set AZURE_CLIENT_ID or use --client-id")?;
    let secret = Config::client_secret()
        .with_context(|| format!("No client secret configured. Set {}", ENV_CLIENT_SECRET))?;

    tracing::info!("Using tenant: {}, endpoint: {}", tenant, config.effective_endpoint());

    let credential = ClientSecretCredential::with_authority(
        tenant,
        client_id,
        &secret,
        config.effective_authority(),
    )?;
    Ok(ResourceGraphClient::with_endpoint(
        Arc::new(credential),
        config.effective_endpoint(),
    )?)
}

async fn resolve_subscriptions(
    client: &ResourceGraphClient,
    config: &Config,
    from_args: Vec<String>,
) -> Result<Vec<String>> {
    if !from_args.is_empty() {
        return Ok(from_args);
    }
    if !config.subscriptions.is_empty() {
        return Ok(config.subscriptions.clone());
    }

    let ids = subscriptions::list_subscription_ids(client)
        .await
        .map_err(|e| anyhow::anyhow!(format_azure_error(&e)))?;
    tracing::info!("Loaded {} subscriptions", ids.len());
    Ok(ids)
}

async fn run_describe(
    client: &ResourceGraphClient,
    describer: &ResourceGraphDescriber,
    subscriptions: &[String],
    trigger: TriggerType,
    stream: bool,
    options: &FetchOptions,
) -> Result<()> {
    let result = if stream {
        let sink = FnSink::new(|resource: Resource| {
            let mut out = std::io::stdout().lock();
            serde_json::to_writer(&mut out, &resource)
                .map_err(|e| SinkError::new(e.to_string()))?;
            writeln!(out).map_err(|e| SinkError::new(e.to_string()))
        });
        describer
            .describe_resources(client, subscriptions, trigger, Delivery::stream(&sink), options)
            .await
    } else {
        describer
            .describe_resources(client, subscriptions, trigger, Delivery::Collect, options)
            .await
            .and_then(|resources| {
                serde_json::to_writer_pretty(std::io::stdout().lock(), &resources)
                    .map_err(|e| DescribeError::from(SinkError::new(e.to_string())))?;
                println!();
                Ok(Vec::new())
            })
    };

    match result {
        Ok(_) => Ok(()),
        Err(DescribeError::Provider(e)) => Err(anyhow::anyhow!(format_azure_error(&e))),
        Err(e) => Err(e.into()),
    }
}
