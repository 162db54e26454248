//! harhar CLI - record, replay, transform and compare HTTP archives.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harhar::config::{
    load_options, ConnectionPoolConfig, ListenConfig, MatchPolicy, Protocol, ProxyConfig,
    TransformOptions, UpstreamConfig,
};
use harhar::har::STDIO_PATH;
use harhar::proxy::create_http_client;
use harhar::{
    client_replay, diff_archives, read_archive, run_proxy_server, run_replay_server,
    transform_archive, write_archive, Lifecycle, Replayer,
};
use harhar_lint::{lint_file, lint_str, render_json, render_text, LintOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// harhar - record, replay, transform and diff HTTP traffic archives
#[derive(Parser, Debug)]
#[command(name = "harhar")]
#[command(version, about)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Forward traffic to an upstream server and record every exchange
    Proxy {
        #[arg(long)]
        listen_port: u16,

        #[arg(long, default_value = "0.0.0.0")]
        listen_host: String,

        /// Upstream host
        #[arg(long)]
        connect_host: String,

        /// Upstream port
        #[arg(long)]
        connect_port: u16,

        /// Upstream protocol (http or https)
        #[arg(long, default_value = "http", value_parser = Protocol::from_scheme)]
        connect_protocol: Protocol,

        /// Archive to write the recorded exchanges to (`-` for stdout)
        #[arg(long)]
        record: PathBuf,
    },

    /// Answer requests with the responses recorded in an archive
    #[command(name = "serverreplay")]
    ServerReplay {
        #[arg(long)]
        port: u16,

        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Archive with the recorded exchanges (`-` for stdin)
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        policy: MatchPolicyArgs,

        /// YAML or JSON file with a match policy, merged with the flags
        #[arg(long = "policy")]
        policy_file: Option<PathBuf>,

        /// Archive to write the replayed exchanges to
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Send the requests of an archive to a live server and record the answers
    #[command(name = "clientreplay")]
    ClientReplay {
        #[arg(long)]
        input: PathBuf,

        /// Archive to write the live responses to
        #[arg(long)]
        record: Option<PathBuf>,

        #[command(flatten)]
        rewrite: UrlRewriteArgs,

        /// YAML or JSON file with transform options, merged with the flags
        #[arg(long = "options")]
        options_file: Option<PathBuf>,
    },

    /// Rewrite the entries of an archive
    Transform {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        options: TransformArgs,

        /// YAML or JSON file with transform options, merged with the flags
        #[arg(long = "options")]
        options_file: Option<PathBuf>,
    },

    /// Compare two archives entry by entry, paired by x-request-id
    Diff { input1: PathBuf, input2: PathBuf },

    /// Check an archive for problems
    Validate {
        #[arg(long)]
        input: PathBuf,

        /// Request header every entry must carry (repeatable)
        #[arg(long = "require-request-header")]
        require_request_headers: Vec<String>,

        /// Response header every entry must carry (repeatable)
        #[arg(long = "require-response-header")]
        require_response_headers: Vec<String>,

        /// Output format: text (default), json
        #[arg(long, default_value = "text")]
        output: String,

        /// Only show errors
        #[arg(long)]
        errors_only: bool,

        /// Exit 1 when errors are found
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Args, Debug, Default)]
struct MatchPolicyArgs {
    /// Pair requests by x-request-id when present
    #[arg(long)]
    match_request_id: bool,
    #[arg(long)]
    ignore_hostname: bool,
    #[arg(long)]
    ignore_port: bool,
    /// Only consider these headers (repeatable)
    #[arg(long)]
    match_headers: Vec<String>,
    #[arg(long)]
    ignore_headers: Vec<String>,
    #[arg(long)]
    ignore_header_casing: bool,
    #[arg(long)]
    ignore_header_order: bool,
    /// Only consider these query parameters (repeatable)
    #[arg(long)]
    match_query_params: Vec<String>,
    #[arg(long)]
    ignore_query_params: Vec<String>,
    #[arg(long)]
    ignore_query_param_order: bool,
    #[arg(long)]
    ignore_post_data: bool,
}

impl From<MatchPolicyArgs> for MatchPolicy {
    fn from(args: MatchPolicyArgs) -> Self {
        MatchPolicy {
            match_request_id: args.match_request_id,
            ignore_hostname: args.ignore_hostname,
            ignore_port: args.ignore_port,
            match_headers: args.match_headers,
            ignore_headers: args.ignore_headers,
            ignore_header_casing: args.ignore_header_casing,
            ignore_header_order: args.ignore_header_order,
            match_query_params: args.match_query_params,
            ignore_query_params: args.ignore_query_params,
            ignore_query_param_order: args.ignore_query_param_order,
            ignore_post_data: args.ignore_post_data,
        }
    }
}

#[derive(Args, Debug, Default)]
struct UrlRewriteArgs {
    #[arg(long)]
    replace_hostname: Option<String>,
    #[arg(long)]
    replace_port: Option<u16>,
    /// http or https
    #[arg(long)]
    replace_protocol: Option<String>,
}

impl From<UrlRewriteArgs> for TransformOptions {
    fn from(args: UrlRewriteArgs) -> Self {
        TransformOptions {
            replace_hostname: args.replace_hostname,
            replace_port: args.replace_port,
            replace_protocol: args.replace_protocol,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Default)]
struct TransformArgs {
    #[arg(long)]
    match_headers: Vec<String>,
    #[arg(long)]
    ignore_headers: Vec<String>,
    #[arg(long)]
    match_query_params: Vec<String>,
    #[arg(long)]
    ignore_query_params: Vec<String>,
    #[arg(long)]
    match_multipart_headers: Vec<String>,
    #[arg(long)]
    ignore_multipart_headers: Vec<String>,
    #[arg(long)]
    normalize_header_names: bool,
    #[arg(long)]
    remove_query_string_from_url: bool,
    #[command(flatten)]
    rewrite: UrlRewriteArgs,
    #[arg(long)]
    replace_status_text: Option<String>,
    #[arg(long)]
    replace_multipart_boundary: Option<String>,
    #[arg(long)]
    scrub_timings: bool,
    #[arg(long)]
    scrub_sizes: bool,
    #[arg(long)]
    sort_headers: bool,
    #[arg(long)]
    sort_query_params: bool,
    /// Sort multipart parts (only when part order carries no meaning)
    #[arg(long)]
    sort_multipart: bool,
}

impl From<TransformArgs> for TransformOptions {
    fn from(args: TransformArgs) -> Self {
        TransformOptions {
            match_headers: args.match_headers,
            ignore_headers: args.ignore_headers,
            match_query_params: args.match_query_params,
            ignore_query_params: args.ignore_query_params,
            match_multipart_headers: args.match_multipart_headers,
            ignore_multipart_headers: args.ignore_multipart_headers,
            normalize_header_names: args.normalize_header_names,
            remove_query_string_from_url: args.remove_query_string_from_url,
            replace_status_text: args.replace_status_text,
            replace_multipart_boundary: args.replace_multipart_boundary,
            scrub_timings: args.scrub_timings,
            scrub_sizes: args.scrub_sizes,
            sort_headers: args.sort_headers,
            sort_query_params: args.sort_query_params,
            sort_multipart: args.sort_multipart,
            ..TransformOptions::from(args.rewrite)
        }
    }
}

/// Setup logging on stderr. RUST_LOG overrides the level chosen by `--debug`.
fn setup_logging(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .init();
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining connections");
        token.cancel();
    });
    cancel
}

fn load_policy(flags: MatchPolicyArgs, file: Option<&Path>) -> Result<MatchPolicy> {
    let base = match file {
        Some(path) => load_options::<MatchPolicy, _>(path)
            .with_context(|| format!("Failed to load match policy {}", path.display()))?,
        None => MatchPolicy::default(),
    };
    Ok(base.merge(flags.into()))
}

fn load_transform_options(flags: TransformOptions, file: Option<&Path>) -> Result<TransformOptions> {
    let base = match file {
        Some(path) => load_options::<TransformOptions, _>(path)
            .with_context(|| format!("Failed to load transform options {}", path.display()))?,
        None => TransformOptions::default(),
    };
    Ok(base.merge(flags))
}

fn read_input(path: &Path) -> Result<harhar::Archive> {
    read_archive(path).with_context(|| format!("Failed to read archive {}", path.display()))
}

fn write_output(path: &Path, archive: &harhar::Archive) -> Result<()> {
    write_archive(path, archive).with_context(|| format!("Failed to write archive {}", path.display()))
}

async fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Proxy {
            listen_port,
            listen_host,
            connect_host,
            connect_port,
            connect_protocol,
            record,
        } => {
            let config = ProxyConfig {
                listen: ListenConfig::new(Some(listen_host), listen_port),
                upstream: UpstreamConfig {
                    protocol: connect_protocol,
                    ..UpstreamConfig::new(connect_host, connect_port)
                },
                connection_pool: ConnectionPoolConfig::default(),
            };
            config.validate().context("Invalid proxy configuration")?;
            let lifecycle = Lifecycle::bind(&config.listen)
                .await
                .context("Failed to start proxy")?;
            let archive = run_proxy_server(lifecycle, &config, cancel_on_signal())
                .await
                .context("Proxy failed")?;
            write_output(&record, &archive)?;
            Ok(0)
        }

        Commands::ServerReplay {
            port,
            host,
            input,
            policy,
            policy_file,
            record,
        } => {
            let policy = load_policy(policy, policy_file.as_deref())?;
            let archive = read_input(&input)?;
            let replayer =
                Replayer::new(&archive, policy).context("Failed to index recorded requests")?;
            let lifecycle = Lifecycle::bind(&ListenConfig::new(Some(host), port))
                .await
                .context("Failed to start replay server")?;
            let replayed = run_replay_server(lifecycle, replayer, cancel_on_signal()).await;
            match record {
                Some(record) => write_output(&record, &replayed)?,
                None => info!(entries = replayed.log.entries.len(), "Replay server stopped"),
            }
            Ok(0)
        }

        Commands::ClientReplay {
            input,
            record,
            rewrite,
            options_file,
        } => {
            let options = load_transform_options(rewrite.into(), options_file.as_deref())?;
            let archive = read_input(&input)?;
            let client = create_http_client(&ConnectionPoolConfig::default());
            let replayed = client_replay(&archive, &options, &client)
                .await
                .context("Client replay failed")?;
            match record {
                Some(record) => write_output(&record, &replayed)?,
                None => info!(entries = replayed.log.entries.len(), "Client replay finished"),
            }
            Ok(0)
        }

        Commands::Transform {
            input,
            output,
            options,
            options_file,
        } => {
            let options = load_transform_options(options.into(), options_file.as_deref())?;
            let archive = read_input(&input)?;
            let transformed = transform_archive(&archive, &options)
                .with_context(|| format!("Failed to transform {}", input.display()))?;
            write_output(&output, &transformed)?;
            Ok(0)
        }

        Commands::Diff { input1, input2 } => {
            let first = read_input(&input1)?;
            let second = read_input(&input2)?;
            let diffs = diff_archives(&first, &second).context("Failed to diff archives")?;
            for entry_diff in &diffs {
                println!("request id: {}", entry_diff.request_id);
                print!("{}", entry_diff.diff);
            }
            info!("{} request ids differ", diffs.len());
            Ok(if diffs.is_empty() { 0 } else { 1 })
        }

        Commands::Validate {
            input,
            require_request_headers,
            require_response_headers,
            output,
            errors_only,
            strict,
        } => {
            let options = LintOptions {
                require_request_headers,
                require_response_headers,
            };
            let result = if input.as_os_str() == STDIO_PATH {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("Failed to read archive from stdin")?;
                lint_str(&text, &options)
            } else {
                lint_file(&input, &options)
            };

            if output == "json" {
                println!("{}", render_json(&result).context("Failed to render results")?);
            } else {
                print!(
                    "{}",
                    render_text(&result, &input.display().to_string(), errors_only)
                );
            }
            Ok(if strict && result.has_errors() { 1 } else { 0 })
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    match run(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
