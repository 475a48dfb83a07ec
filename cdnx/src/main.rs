mod config;

use cdn_experiment::{ASSIGNMENT_ALGORITHM, Assignment, BucketSelector, RequestContext};
use clap::{Args, Parser};
use config::{Config, ConfigError, MetricsConfig};
use edge::EdgeError;
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use std::net::{AddrParseError, IpAddr};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
enum CliCommand {
    /// Serve pages with the CDN experiment applied
    Edge(EdgeArgs),
    /// Print the bucket and origins a client would be assigned
    Assign(AssignArgs),
}

#[derive(Args, Debug, Clone)]
struct EdgeArgs {
    #[arg(long)]
    pub config_file_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct AssignArgs {
    #[arg(long)]
    pub config_file_path: PathBuf,
    /// Client IP address, v4 or v6
    #[arg(long)]
    pub ip: String,
    /// Explicit bucket, as it would arrive in the `_cdn_index` parameter
    #[arg(long)]
    pub index: Option<String>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("config has no `{0}` section")]
    MissingSection(&'static str),
    #[error("invalid client IP: {0}")]
    InvalidIp(#[from] AddrParseError),
    #[error(transparent)]
    Edge(#[from] EdgeError),
    #[error("CDN experiment: {0}")]
    Experiment(#[from] cdn_experiment::ExperimentError),
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("could not install metrics recorder: {0}")]
    Recorder(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    let cli = CliCommand::parse();

    let config_file_path = match &cli {
        CliCommand::Edge(args) => &args.config_file_path,
        CliCommand::Assign(args) => &args.config_file_path,
    };

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(None);
            tracing::error!(
                error = %e,
                path = %config_file_path.display(),
                "Failed to load config"
            );
            process::exit(1);
        }
    };

    let _sentry = config.sentry_dsn().map(init_sentry);
    init_tracing(config.sentry_dsn());

    let result = match cli {
        CliCommand::Edge(_) => run_edge(config),
        CliCommand::Assign(args) => run_assign(config, args),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Exiting with error");
        process::exit(1);
    }
}

fn init_sentry(dsn: &str) -> sentry::ClientInitGuard {
    sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ))
}

fn init_tracing(sentry_dsn: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = sentry_dsn.map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();
}

fn init_metrics(metrics_config: &MetricsConfig) -> Result<(), CliError> {
    let recorder =
        StatsdBuilder::from(metrics_config.statsd_host.as_str(), metrics_config.statsd_port)
            .build(Some(metrics_config.prefix.as_str()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Recorder(e.to_string()))?;

    shared::metrics_defs::describe_all(cdn_experiment::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(edge::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %metrics_config.statsd_host,
        port = metrics_config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}

fn run_edge(config: Config) -> Result<(), CliError> {
    if let Some(metrics_config) = &config.common.metrics {
        init_metrics(metrics_config)?;
    }
    let edge_config = config.edge.ok_or(CliError::MissingSection("edge"))?;

    tracing::info!("Starting edge");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(edge::run(edge_config))?;
    Ok(())
}

fn run_assign(config: Config, args: AssignArgs) -> Result<(), CliError> {
    let edge_config = config.edge.ok_or(CliError::MissingSection("edge"))?;
    let experiment = edge_config.cdn_experiment.to_config()?;
    if !experiment.enabled {
        println!("CDN experiment is disabled; every client gets the default origins");
        return Ok(());
    }

    let ctx = RequestContext::new(args.ip.parse::<IpAddr>()?, args.index);
    let assignment = Assignment::resolve(&experiment, &ctx, &BucketSelector::new())?;

    println!("algorithm: {ASSIGNMENT_ALGORITHM}");
    println!("bucket:    {}", assignment.bucket);
    println!("app cdn:   {}", assignment.app_origin);
    println!("s3 cdn:    {}", assignment.s3_origin);
    if let Some(segment) = ctx.cache_key_segment() {
        println!("cache key: {segment}");
    }
    Ok(())
}
