mod dispatch;
mod display;
mod server;
mod settings;
mod store;
mod upstream;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{arg, Arg, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::dispatch::{Dispatcher, Outcome};
use crate::settings::Settings;
use crate::store::SqliteStore;
use crate::webhook::WebhookEvent;

static CLIENT_NAME: &str = "belvo-sync";

const MANUAL_SYNC_CODE: &str = "manual_sync";
const DEFAULT_EVENT_LIMIT: u64 = 20;

fn init_tracing(settings: &Settings, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_new("debug")?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.log.level))?
    };

    let json = settings.log.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .try_init()?;

    Ok(())
}

async fn open_store(settings: &Settings) -> Result<SqliteStore> {
    settings::ensure_database_dir(&settings.database.url)
        .context("failed to create database directory")?;

    SqliteStore::new(&settings.database.url)
        .await
        .context("failed to open database")
}

fn belvo_client(settings: &Settings) -> Result<belvo::Client> {
    Ok(belvo::Builder::new()
        .with_credentials(belvo::Credentials {
            secret_id: settings.belvo.secret_id.clone(),
            secret_password: settings.belvo.secret_password.clone(),
        })
        .with_base_url(settings.belvo.api_url.as_str())
        .with_timeout(Duration::from_secs(settings.belvo.timeout_secs))
        .build()?)
}

async fn serve(settings: Settings) -> Result<()> {
    let store = open_store(&settings).await?;
    let dispatcher = Dispatcher::new(belvo_client(&settings)?, store);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid server address")?;
    let router = server::router(
        Arc::new(dispatcher),
        Duration::from_secs(settings.server.pipeline_timeout_secs),
    );

    server::serve(addr, router).await
}

async fn sync(settings: Settings, matches: &ArgMatches) -> Result<()> {
    let link_id = matches
        .value_of("link")
        .ok_or_else(|| anyhow!("--link is required"))?;
    let kind = matches
        .value_of("kind")
        .ok_or_else(|| anyhow!("--type is required"))?;

    let store = open_store(&settings).await?;
    let dispatcher = Dispatcher::new(belvo_client(&settings)?, store);
    let event = WebhookEvent {
        webhook_id: ulid::Ulid::new().to_string(),
        webhook_type: kind.to_string(),
        process_type: "recurrent_update".to_string(),
        webhook_code: MANUAL_SYNC_CODE.to_string(),
        link_id: link_id.to_string(),
        ..WebhookEvent::default()
    };

    match dispatcher.dispatch(&event).await? {
        Outcome::Succeeded => {
            info!(link_id, webhook_type = kind, "manual sync complete");
            println!("synced {} for link {}", kind, link_id);
            Ok(())
        }
        Outcome::UserNotFound => Err(anyhow!("no user onboarded for link {}", link_id)),
        Outcome::ErrorReported(errors) => Err(anyhow!("sync reported errors: {:?}", errors)),
    }
}

async fn events(settings: Settings, matches: &ArgMatches) -> Result<()> {
    let limit = matches
        .value_of("limit")
        .map(str::parse::<u64>)
        .transpose()
        .context("--limit must be a positive number")?
        .unwrap_or(DEFAULT_EVENT_LIMIT);

    let store = open_store(&settings).await?;
    let events = store
        .webhook_events()
        .recent(limit, matches.value_of("link"))
        .await?;

    display::print_events(std::io::stdout(), &events)
}

async fn run() -> Result<()> {
    let app = Command::new(CLIENT_NAME)
        .about("Receives Belvo webhooks and synchronizes owners, accounts and \
         transactions for the notified link into a local database.")
        .version("0.1.0")
        .subcommand_required(true)
        .allow_external_subcommands(false)
        .arg(arg!(CONFIG: -c --config [FILE] "Sets a custom config file"))
        .arg(arg!(verbose: -v --verbose "Logs at debug level"))
        .subcommand(Command::new("serve").about("Runs the webhook receiver."))
        .subcommand(Command::new("sync")
            .about("Pulls data for a link as if a webhook had been received.")
            .arg(arg!(link: -l --link <ID> "The Belvo link to synchronize."))
            .arg(Arg::new("kind")
                .short('t')
                .long("type")
                .value_name("TYPE")
                .takes_value(true)
                .required(true)
                .possible_values(["OWNERS", "ACCOUNTS", "TRANSACTIONS"])
                .help("The kind of data to pull.")))
        .subcommand(Command::new("events")
            .about("Prints the most recently received webhooks.")
            .arg(arg!(link: -l --link [ID] "Only show webhooks for this link."))
            .arg(arg!(limit: -n --limit [N] "How many webhooks to show, defaults to 20.")));

    let matches = app.get_matches();

    dotenvy::dotenv().ok();
    let settings = Settings::new(matches.value_of("CONFIG"))?;
    init_tracing(&settings, matches.is_present("verbose"))?;

    match matches.subcommand() {
        Some(("serve", _)) => serve(settings).await?,
        Some(("sync", sync_matches)) => sync(settings, sync_matches).await?,
        Some(("events", events_matches)) => events(settings, events_matches).await?,
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        println!("{:#}", err);
        std::process::exit(1);
    }
}
