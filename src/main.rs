use anyhow::{Context, Result};
use clap::Parser;
use mqa_rest::cli::{init_logging, parse_error_exit, report_failure};
use mqa_rest::client::ApplianceClient;
use mqa_rest::config::resolve_transport;
use mqa_rest::fetch::{DEFAULT_LOG_FILE, DownloadRequest, LogFetcher};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "logfetch",
    version,
    about = "Download a queue manager error log from an MQ Appliance"
)]
struct Cli {
    /// Hostname or IP address of the appliance
    host: String,
    /// REST management interface port
    port: u16,
    /// Appliance user to connect as
    user: String,
    /// Password for the appliance user
    password: String,
    /// Name of the queue manager
    #[arg(value_name = "QMGR")]
    queue_manager: String,
    /// Error log file to download, saved under the same name
    #[arg(value_name = "LOGFILE", default_value = DEFAULT_LOG_FILE)]
    log_file: String,

    #[arg(
        long,
        short = 'k',
        help = "Accept the appliance certificate without verification (self-signed appliances)"
    )]
    insecure: bool,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Total request timeout (defaults to config or 30 seconds)"
    )]
    timeout: Option<u64>,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_error_exit(err),
    };
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let transport = resolve_transport(&cwd, cli.insecure, cli.timeout)?;

    let request = DownloadRequest {
        host: cli.host,
        port: cli.port,
        user: cli.user,
        password: cli.password,
        queue_manager: cli.queue_manager,
        log_file: cli.log_file,
    };
    let client = ApplianceClient::for_appliance(
        &request.host,
        request.port,
        &request.user,
        &request.password,
        &transport,
    )?;

    LogFetcher::new(&client).download(&request, &cwd)?;
    Ok(())
}
