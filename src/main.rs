use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod ddragon;
mod error;
mod fetch;
mod match_data;
mod players;
mod rate_limit;
mod riot_api;
mod star_schema;

use ddragon::{DataDragonClient, DdragonIndex};
use riot_api::RiotClient;
use star_schema::StarSchemaBuilder;

#[derive(Parser, Debug)]
#[command(
    name = "lol-star-etl",
    about = "Fetch League of Legends matches and build star-schema CSVs",
    version
)]
struct Cli {
    /// Player registry file.
    #[arg(long, default_value = "players.json", global = true)]
    players_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a Riot ID and add it to the player registry.
    AddPlayer {
        /// Stable internal id (used in data paths).
        #[arg(long)]
        id: String,

        /// Riot ID in GameName#TAG form.
        #[arg(long)]
        riot_id: String,

        /// API routing region (americas, europe, asia).
        #[arg(long, default_value = "americas")]
        region: String,
    },

    /// List registered players.
    ListPlayers,

    /// Download match history, one raw JSON batch per month.
    Fetch {
        /// Internal player id from the registry.
        #[arg(long)]
        player: String,

        /// First month, YYYY-MM.
        #[arg(long)]
        from: String,

        /// Last month (inclusive), YYYY-MM.
        #[arg(long)]
        to: String,

        /// Queue ids to include.
        #[arg(long, value_delimiter = ',', default_values_t = vec![400u32, 420])]
        queues: Vec<u32>,

        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },

    /// Transform fetched raw batches into star-schema CSVs.
    Transform {
        /// Internal player id from the registry.
        #[arg(long)]
        player: String,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Data Dragon cache for name/icon enrichment.
        #[arg(long, default_value = "static/ddragon")]
        ddragon_dir: PathBuf,
    },

    /// Refresh the Data Dragon static-data cache.
    Ddragon {
        #[arg(long, default_value = "static/ddragon")]
        cache_dir: PathBuf,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::AddPlayer { id, riot_id, region } => {
            players::add_player(&cli.players_file, &id, &riot_id, &region)
        }

        Command::ListPlayers => players::list_players(&cli.players_file),

        Command::Fetch {
            player,
            from,
            to,
            queues,
            out_dir,
        } => {
            let registry = players::PlayerRegistry::load(&cli.players_file)?;
            let Some(player) = registry.find(&player) else {
                bail!("player '{}' not in {}", player, cli.players_file.display());
            };

            let client = RiotClient::new(&player.region)
                .context("could not build API client (is RIOT_API_KEY set?)")?;
            fetch::fetch_player(&client, player, &from, &to, &queues, &out_dir)?;
            Ok(())
        }

        Command::Transform {
            player,
            data_dir,
            ddragon_dir,
        } => {
            let registry = players::PlayerRegistry::load(&cli.players_file)?;
            let Some(player) = registry.find(&player) else {
                bail!("player '{}' not in {}", player, cli.players_file.display());
            };

            let ddragon = DdragonIndex::load(&ddragon_dir);
            let mut builder = StarSchemaBuilder::new(&player.puuid, ddragon);

            let player_dir = data_dir.join(&player.id);
            builder.load_and_process_dir(&player_dir)?;
            builder.export_all(&player_dir)?;
            builder.print_summary();
            Ok(())
        }

        Command::Ddragon { cache_dir } => {
            let client = DataDragonClient::new(&cache_dir);
            client.refresh()
        }
    }
}
