use std::{error::Error, path::PathBuf, process, time::Duration};

use clap::{Parser, Subcommand};
use log::error;
use mindrpc::{
    AirDate, Credential, EpisodeKey, MindConfig, MindSearch, Session, config, protocol::Request,
};
use serde_json::Value;

#[derive(Parser)]
#[command(version, about = "Query the Mind metadata service", long_about = None)]
struct Cli {
    /// Account username
    #[arg(long, env = "MIND_USERNAME")]
    username: String,
    /// Account password
    #[arg(long, env = "MIND_PASSWORD", hide_env_values = true)]
    password: String,
    /// Service host
    #[arg(long, env = "MIND_HOST", default_value = config::DEFAULT_HOST)]
    host: String,
    /// Service port
    #[arg(long, env = "MIND_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,
    /// PEM bundle with the service trust anchors
    #[arg(long, env = "MIND_CERT", default_value = config::DEFAULT_CERT)]
    cert: PathBuf,
    /// Description language to keep; empty keeps all
    #[arg(long, env = "MIND_LANGUAGE", default_value = config::DEFAULT_LANGUAGE)]
    language: String,
    /// Socket read timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    /// Attempts for requests the service reports as unavailable
    #[arg(long, default_value_t = 3)]
    retries: usize,

    #[command(subcommand)]
    command: Query,
}

#[derive(Debug, Subcommand)]
enum Query {
    /// Search series by title keywords
    Series { title: String },
    /// Search a movie by title keywords and optional release year
    Movie {
        title: String,
        #[arg(long)]
        year: Option<i64>,
    },
    /// Look up an episode's partner content id
    ProgramId {
        collection_id: String,
        #[arg(long, requires = "episode", conflicts_with = "date")]
        season: Option<u32>,
        #[arg(long, requires = "season")]
        episode: Option<u32>,
        /// Original air date as YYYY-MM-DD
        #[arg(long, value_parser = parse_air_date)]
        date: Option<AirDate>,
    },
    /// Search linear offers on a receiver
    Offers {
        title: String,
        /// Receiver id, without the `tsn:` prefix
        tsn: String,
        #[arg(long)]
        subtitle: Option<String>,
    },
    /// Send an arbitrary request with a JSON object body
    Raw { request_type: String, body: String },
}

fn parse_air_date(s: &str) -> Result<AirDate, String> {
    let parts = s.split('-').collect::<Vec<&str>>();
    if parts.len() != 3 {
        return Err(format!("expected YYYY-MM-DD, got '{s}'"));
    }
    let invalid = |_: std::num::ParseIntError| format!("invalid date '{s}'");
    Ok(AirDate {
        year: parts[0].parse().map_err(invalid)?,
        month: parts[1].parse().map_err(invalid)?,
        day: parts[2].parse().map_err(invalid)?,
    })
}

fn main() {
    env_logger::init();

    // Interrupted runs exit like a shell job killed by SIGINT.
    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("Stopped by keyboard interrupt");
        process::exit(130);
    }) {
        error!("failed to install interrupt handler: {e}");
    }

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = MindConfig {
        host: cli.host,
        port: cli.port,
        cert_path: cli.cert,
        read_timeout: Duration::from_secs(cli.timeout),
        language: cli.language,
        retry_attempts: cli.retries,
        ..MindConfig::default()
    };

    let session = Session::connect(&config, Credential::new(cli.username, cli.password))?;
    let mut search = MindSearch::new(session, &config);

    let out: Value = match cli.command {
        Query::Series { title } => search.search_series(&title)?.into_iter().collect(),
        Query::Movie { title, year } => Value::Object(search.search_movie(&title, year)?),
        Query::ProgramId {
            collection_id,
            season,
            episode,
            date,
        } => {
            let key = match (season, episode, date) {
                (Some(season), Some(episode), _) => EpisodeKey::SeasonEpisode { season, episode },
                (_, _, Some(date)) => EpisodeKey::AirDate(date),
                _ => return Err("either --season and --episode or --date is required".into()),
            };
            search.get_program_id(&collection_id, key)?.into()
        }
        Query::Offers {
            title,
            tsn,
            subtitle,
        } => search
            .search_offers(&title, subtitle.as_deref(), &format!("tsn:{tsn}"))?
            .into_iter()
            .collect(),
        Query::Raw { request_type, body } => {
            let Value::Object(fields) = serde_json::from_str::<Value>(&body)? else {
                return Err("request body must be a JSON object".into());
            };
            let resp = search.call(Request::with_fields(request_type.as_str(), fields))?;
            Value::Object(resp.into_body())
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
