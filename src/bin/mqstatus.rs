use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use mqa_rest::cli::{init_logging, parse_error_exit, report_failure};
use mqa_rest::client::ApplianceClient;
use mqa_rest::config::{self, ApplianceConfig, Scope, resolve_appliance, resolve_transport, save};
use mqa_rest::poll::{Poller, cancel_on_enter};
use mqa_rest::status::{
    StatusKind, StatusReport, cpu_usage, fetch_status, queue_managers, render_cpu_usage,
    render_queue_managers, render_system_resources, system_resources,
};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "mqstatus",
    version,
    about = "Status views for the MQ Appliance REST management interface"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Appliance hostname (otherwise APPLIANCENAME or config)"
    )]
    host: Option<String>,

    #[arg(long, global = true, help = "REST management port (default 5554)")]
    port: Option<u16>,

    #[arg(
        long,
        global = true,
        help = "Appliance user (otherwise APPLIANCEUSER or config)"
    )]
    user: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Appliance password (otherwise APPLIANCEPASS or config)"
    )]
    password: Option<String>,

    #[arg(
        long,
        short = 'k',
        global = true,
        help = "Accept the appliance certificate without verification (self-signed appliances)"
    )]
    insecure: bool,

    #[arg(
        long,
        value_name = "SECONDS",
        global = true,
        help = "Total request timeout (defaults to config or 30 seconds)"
    )]
    timeout: Option<u64>,

    #[arg(
        long,
        short = 'o',
        value_enum,
        default_value_t = OutputFormat::Pretty,
        global = true,
        help = "Output format"
    )]
    output: OutputFormat,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List queue managers and their status
    QueueManagers,
    /// Show MQ storage, error storage and trace storage usage
    Resources,
    /// Poll system CPU usage until Enter is pressed
    Cpu {
        #[arg(
            long,
            value_name = "SECONDS",
            default_value_t = 2,
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Seconds between samples"
        )]
        interval: u64,
        #[arg(
            long,
            value_name = "N",
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Stop after N samples"
        )]
        count: Option<u64>,
    },
    /// Persist appliance connection settings to the chosen scope
    Configure {
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
        #[arg(
            long,
            help = "Store verify_tls: false for this appliance (self-signed certs)"
        )]
        no_verify_tls: bool,
    },
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
    Raw,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
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
    let overrides = ApplianceConfig {
        host: cli.host.clone(),
        port: cli.port,
        user: cli.user.clone(),
        password: cli.password.clone(),
    };

    match cli.command {
        Commands::Configure {
            scope,
            no_verify_tls,
        } => {
            let mut existing = config::load_scope(scope.into(), &cwd)?;
            let mut appliance = existing.appliance.take().unwrap_or_default();
            appliance.host = overrides.host.or(appliance.host);
            appliance.port = overrides.port.or(appliance.port);
            appliance.user = overrides.user.or(appliance.user);
            appliance.password = overrides.password.or(appliance.password);
            existing.appliance = Some(appliance);
            if no_verify_tls {
                existing.verify_tls = Some(false);
            }
            if let Some(timeout) = cli.timeout {
                existing.timeout_secs = Some(timeout);
            }

            let path = save(scope.into(), &existing, &cwd)?;
            println!("Saved appliance settings to {}", path.display());
            Ok(())
        }
        Commands::ConfigShow => {
            let mut masked = config::load(&cwd)?;
            if let Some(appliance) = masked.appliance.as_mut()
                && appliance.password.is_some()
            {
                appliance.password = Some("*****".into());
            }
            println!("{}", serde_json::to_string_pretty(&masked)?);
            Ok(())
        }
        Commands::Completion { shell } => {
            use clap_complete::{generate, shells};
            let mut cmd = Cli::command();
            let bin = cmd.get_name().to_string();
            match shell {
                CompletionShell::Bash => {
                    generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Zsh => {
                    generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::Fish => {
                    generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout())
                }
                CompletionShell::PowerShell => {
                    generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
                }
            }
            Ok(())
        }
        Commands::QueueManagers => {
            let client = connect(&cwd, overrides, cli.insecure, cli.timeout)?;
            tracing::info!("Searching for queue managers...");
            let report = fetch_status(&client, StatusKind::QueueManagers)?;
            render_report(&report, cli.output, |section| {
                Ok(render_queue_managers(client.host(), &queue_managers(section)?))
            })
        }
        Commands::Resources => {
            let client = connect(&cwd, overrides, cli.insecure, cli.timeout)?;
            let report = fetch_status(&client, StatusKind::SystemResources)?;
            render_report(&report, cli.output, |section| {
                Ok(render_system_resources(
                    client.host(),
                    &system_resources(section)?,
                ))
            })
        }
        Commands::Cpu { interval, count } => {
            let client = connect(&cwd, overrides, cli.insecure, cli.timeout)?;
            if cli.output == OutputFormat::Pretty {
                println!("System CPU Usage on {}:", client.host());
            }
            if count.is_none() {
                eprintln!("Press enter to exit.");
            }

            let cancel = cancel_on_enter();
            let poller = Poller::new(Duration::from_secs(interval)).with_max_ticks(count);
            poller.run(&cancel, || {
                let report = fetch_status(&client, StatusKind::SystemCpu)?;
                render_report(&report, cli.output, |section| {
                    Ok(vec![render_cpu_usage(&cpu_usage(section)?)])
                })
            })?;
            Ok(())
        }
    }
}

fn connect(
    cwd: &Path,
    overrides: ApplianceConfig,
    insecure: bool,
    timeout: Option<u64>,
) -> Result<ApplianceClient> {
    let target = resolve_appliance(cwd, overrides)?;
    let transport = resolve_transport(cwd, insecure, timeout)?;
    ApplianceClient::for_appliance(
        &target.host,
        target.port,
        &target.user,
        &target.password,
        &transport,
    )
}

fn render_report<F>(report: &StatusReport, output: OutputFormat, pretty: F) -> Result<()>
where
    F: FnOnce(&serde_json::Value) -> Result<Vec<String>, mqa_rest::errors::FetchError>,
{
    match output {
        OutputFormat::Raw => println!("{}", report.response.body),
        OutputFormat::Json => println!("{}", serde_json::to_string(&report.section)?),
        OutputFormat::Pretty => {
            for line in pretty(&report.section)? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
