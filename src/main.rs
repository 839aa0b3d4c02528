use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use fleet_api::{Client, IncidentStatus, Resource};
use fleet_console::{ConsoleSurface, Provider, Session};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use trip_tracker::socket::SocketTransport;
use trip_tracker::view::TripView;
use trip_tracker::{Config, Lifecycle, Subscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a trip's live position until interrupted.
    Watch {
        trip_id: String,

        /// Timezone for the timestamp readout, e.g. `America/Lima`.
        #[arg(short, long)]
        timezone: Option<chrono_tz::Tz>,
    },

    /// Read records from the fleet backend.
    Api {
        resource: Resource,

        #[arg(short, long)]
        id: Option<String>,

        /// Search parameter as `key=value`; may be repeated.
        #[arg(short, long, value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },

    /// List incidents, or move one to a new status.
    Incident {
        #[arg(short, long)]
        id: Option<String>,

        #[arg(short, long)]
        status: Option<IncidentStatus>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let session = Session::load()?;

    match args.command {
        Command::Watch { trip_id, timezone } => watch(&trip_id, timezone, &session).await,
        Command::Api { resource, id, query } => {
            let provider = Provider::new(session);
            let client = Client::new(&provider);
            let records = match id {
                Some(id) => client.get(resource, &id).await?,
                None => {
                    let query = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>();
                    client.search(resource, &query).await?
                }
            };
            print_json(&records)
        }
        Command::Incident { id, status } => {
            let provider = Provider::new(session);
            let client = Client::new(&provider);
            let records = match (id, status) {
                (Some(id), Some(status)) => client.transition_incident(&id, status).await?,
                (Some(_), None) => return Err(anyhow!("--status is required to move an incident")),
                (None, status) => client.incidents(status).await?,
            };
            print_json(&records)
        }
    }
}

async fn watch(trip_id: &str, timezone: Option<chrono_tz::Tz>, session: &Session) -> Result<()> {
    let config = Config::from_env();
    let mut transport = SocketTransport::new(&config);
    if let Some(token) = session.token() {
        transport = transport.credential(token);
    }

    let subscriber = Subscriber::new(transport, &config);
    let surface = Arc::new(ConsoleSurface::default());
    let mut view = TripView::new(subscriber, surface, timezone.unwrap_or(config.timezone));

    let Some(mut handle) = view.open(trip_id) else {
        tracing::warn!("no trip id given, nothing to watch");
        return Ok(());
    };

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("listening for ctrl-c")?;
                break;
            }
            event = handle.next_lifecycle() => match event {
                Some(Lifecycle::ReconnectFailed { attempts }) => {
                    tracing::error!(attempts, "live tracking unavailable, showing last known position");
                }
                Some(event) => tracing::debug!(?event, "lifecycle"),
                None => break,
            },
        }
    }

    view.close();
    Ok(())
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((key.to_string(), value.to_string()))
}

fn print_json(value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing response")?;
    println!("{json}");
    Ok(())
}
