use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use infinity_next_api::{
    api::auth::endpoint_for_token, Client, ClientConfig, PollSettings, PublishEnforce,
};
use log::{debug, info};
use tokio_util::sync::CancellationToken;

mod config;
mod output;

use config::{CliValues, Credentials, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "inext",
    about = "Infinity Next API Command Line Interface",
    long_about = "Infinity Next API Command Line Interface\n\n\
                  Publishes, discards and enforces staged policy changes, e.g.:\n\n    \
                  inext publish && inext enforce",
    version
)]
struct Cli {
    /// Config file (default is $HOME/.inext.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the gateway host, e.g. for a local test server
    #[arg(long, env = "INEXT_HOST", global = true, hide = true)]
    host: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct CredentialArgs {
    /// Infinity Portal API client id
    #[arg(short = 'c', long, env = "INEXT_CLIENT_ID")]
    client_id: Option<String>,

    /// Infinity Portal API access key
    #[arg(short = 'k', long, env = "INEXT_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Infinity Portal region: eu, us, dev or preprod
    #[arg(short = 'r', long, env = "INEXT_REGION")]
    region: Option<String>,

    /// Pre-issued bearer token, skips authentication
    #[arg(short = 't', long, env = "INEXT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish staged changes
    Publish {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Discard staged changes
    Discard {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Enforce published policy and wait for the enforce task
    Enforce {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Profile to enforce (repeatable, all profiles when omitted)
        #[arg(long = "profile-id", value_name = "ID")]
        profile_ids: Vec<String>,

        /// Seconds to wait for the enforce task before giving up
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

impl Commands {
    fn credentials(&self) -> &CredentialArgs {
        match self {
            Self::Publish { credentials }
            | Self::Discard { credentials }
            | Self::Enforce { credentials, .. } => credentials,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let file = config::load_file_config(cli.config.as_deref())?;
    let credentials = cli.command.credentials().clone();
    config::resolve(
        CliValues {
            client_id: credentials.client_id,
            access_key: credentials.access_key,
            region: credentials.region,
            token: credentials.token,
            host: cli.host.clone(),
        },
        file,
    )
}

async fn connect(settings: Settings) -> Result<Client> {
    let mut client = Client::for_region(settings.region, ClientConfig::default())
        .context("failed to create client")?;
    if let Some(host) = settings.host {
        client.set_host(host);
    }
    debug!(
        "Using region {} at {}{}",
        settings.region,
        client.host(),
        client.endpoint()
    );

    match settings.credentials {
        Credentials::Token(token) => {
            match endpoint_for_token(&token) {
                Ok(Some(endpoint)) => client.set_endpoint(endpoint),
                Ok(None) => {}
                Err(err) => output::warn(&format!(
                    "cannot read token claims, keeping endpoint {}: {err}",
                    client.endpoint()
                )),
            }
            client.set_token(token);
        }
        Credentials::ApiKey {
            client_id,
            access_key,
        } => {
            client
                .authenticate(&client_id, &access_key)
                .await
                .context("failed to authenticate")?;
            info!("Authenticated as {client_id}");
        }
    }
    Ok(client)
}

fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::note("interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

async fn run(cli: Cli) -> Result<()> {
    let settings = resolve_settings(&cli)?;
    let client = connect(settings).await?;

    match cli.command {
        Commands::Publish { .. } => {
            let outcome = PublishEnforce::new(client, PollSettings::cli()).publish().await?;
            output::print_publish_outcome(&outcome);
        }
        Commands::Discard { .. } => {
            PublishEnforce::new(client, PollSettings::cli()).discard().await?;
            output::print_discarded();
        }
        Commands::Enforce {
            profile_ids,
            timeout_secs,
            ..
        } => {
            let poll = PollSettings::cli().with_timeout(Duration::from_secs(timeout_secs));
            let cancel = cancel_on_interrupt();
            let task_id = PublishEnforce::new(client, poll)
                .enforce(&cancel, &profile_ids)
                .await?;
            output::print_enforced(&task_id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&err);
            ExitCode::FAILURE
        }
    }
}
