use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pod_league::catalog::DeckCatalog;
use pod_league::config::AppConfig;
use pod_league::ledger::{MatchFilter, MatchLedger};
use pod_league::models::{Deck, GameId, LeagueId, PlayerId};
use pod_league::roster::LeaderboardSort;
use pod_league::stats;
use pod_league::storage::{JsonlStore, LeagueStore};

#[derive(Parser)]
#[command(name = "pod-league")]
#[command(about = "Match tracking and ratings for four-player commander pods")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// League to operate on (all commands except serve and deck management)
    #[arg(long, default_value = "default")]
    league: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Register a player in the league
    Register {
        player_id: PlayerId,
        display_name: String,
    },

    /// Report a match: winner first, then the three other seats
    Report {
        winner_id: PlayerId,
        others: Vec<PlayerId>,
    },

    /// Confirm a match for a player
    Confirm {
        player_id: PlayerId,

        /// Match to confirm (defaults to the player's latest pending)
        #[arg(long)]
        game: Option<String>,

        /// Deck played
        #[arg(long)]
        deck: Option<String>,
    },

    /// Dispute a match
    Deny {
        player_id: PlayerId,
        game: String,
    },

    /// Force-accept a match (admin)
    Accept { game: String },

    /// Remove a non-accepted match
    Remove {
        game: String,

        /// Player requesting the removal
        #[arg(long)]
        requested_by: PlayerId,

        /// Bypass the winner-only check
        #[arg(long)]
        admin: bool,
    },

    /// Show the league leaderboard
    Leaderboard {
        /// Sort key: points, wins, accepted, winrate
        #[arg(long, default_value = "points")]
        sort: String,

        /// Max rows (0 for all)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Show the deck meta over accepted matches
    Meta {
        /// Minimum entries for a deck to be listed
        #[arg(long)]
        min_entries: Option<u32>,
    },

    /// Register a deck in the global catalog
    AddDeck {
        name: String,

        /// WUBRG color identity, e.g. "wub"
        #[arg(long, default_value = "")]
        colors: String,

        /// Decklist URL
        #[arg(long)]
        link: Option<String>,
    },

    /// Attach aliases to a registered deck
    AddAlias {
        /// Any existing alias of the deck
        deck: String,

        /// New aliases to attach
        aliases: Vec<String>,
    },

    /// Close the current season and open the next
    ResetSeason,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = PathBuf::from(&cli.config);
    let mut config = if config_path.exists() {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::default()
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }

    let store: Arc<dyn LeagueStore> = Arc::new(JsonlStore::new(config.data_dir.clone()));
    let catalog = Arc::new(DeckCatalog::load(store.clone()).await?);
    let ledger = Arc::new(MatchLedger::new(store, catalog, config.scoring.clone()));
    let league = LeagueId::new(cli.league.clone());

    match cli.command {
        Commands::Serve { host, port } => {
            let state = pod_league::api::state::AppState {
                ledger: ledger.clone(),
            };
            let app = pod_league::api::build_router(state);
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Register {
            player_id,
            display_name,
        } => {
            let player = ledger
                .roster()
                .register(&league, player_id, &display_name, ledger.base_rating())
                .await?;
            println!(
                "Registered {} ({}) at {} points",
                player.display_name, player.player_id, player.rating
            );
        }
        Commands::Report { winner_id, others } => {
            let game_id = ledger.report_match(&league, winner_id, &others).await?;
            println!("Match {} reported. All four players must confirm.", game_id);
        }
        Commands::Confirm {
            player_id,
            game,
            deck,
        } => {
            let game_id = game.map(GameId::new);
            let outcome = ledger
                .confirm(&league, game_id.as_ref(), player_id, deck.as_deref())
                .await?;
            match outcome.delta {
                Some(deltas) => {
                    println!("Match {} accepted:", outcome.game_id);
                    for d in deltas {
                        println!("  player {}: {:+}", d.player_id, d.change);
                    }
                }
                None => println!(
                    "Confirmation recorded for match {} ({:?}).",
                    outcome.game_id, outcome.status
                ),
            }
        }
        Commands::Deny { player_id, game } => {
            let outcome = ledger.deny(&league, &GameId::new(game), player_id).await?;
            println!("Match {} is now {:?}.", outcome.game_id, outcome.status);
        }
        Commands::Accept { game } => {
            let outcome = ledger.admin_accept(&league, &GameId::new(game)).await?;
            println!("Match {} force-accepted:", outcome.game_id);
            if let Some(deltas) = outcome.delta {
                for d in deltas {
                    println!("  player {}: {:+}", d.player_id, d.change);
                }
            }
        }
        Commands::Remove {
            game,
            requested_by,
            admin,
        } => {
            let game_id = GameId::new(game);
            ledger
                .admin_remove(&league, &game_id, requested_by, admin)
                .await?;
            println!("Match {} removed.", game_id);
        }
        Commands::Leaderboard { sort, limit } => {
            let sort_key: LeaderboardSort = sort.parse().map_err(anyhow::Error::msg)?;
            let min_games = ledger.settings(&league).await?.player_match_threshold;
            let players = ledger
                .roster()
                .leaderboard(&league, sort_key, min_games, limit)
                .await?;

            if players.is_empty() {
                println!(
                    "No ranked players (threshold: {} accepted matches).",
                    min_games
                );
            } else {
                println!("=== Leaderboard ({}) ===", sort);
                for (rank, p) in players.iter().enumerate() {
                    println!(
                        "{:>3}. {:<24} {:>5} pts  {:>3}W {:>3}L  {:>5.1}%",
                        rank + 1,
                        p.display_name,
                        p.rating,
                        p.wins,
                        p.losses,
                        p.win_rate() * 100.0
                    );
                }
            }
        }
        Commands::Meta { min_entries } => {
            let min_entries = match min_entries {
                Some(t) => t,
                None => ledger.settings(&league).await?.deck_match_threshold,
            };
            let filter = MatchFilter {
                status: Some(pod_league::models::MatchStatus::Accepted),
                ..Default::default()
            };
            let matches = ledger.find_matches(&league, &filter, 0).await?;
            let rows = stats::deck_meta(&matches, min_entries);

            if rows.is_empty() {
                println!("No decks above {} entries.", min_entries);
            } else {
                println!("=== Deck Meta (min {} entries) ===", min_entries);
                for row in rows {
                    println!(
                        "{:<28} {:>4} entries  {:>3}W {:>3}L  {:>5.1}% win  {:>5.1}% meta  {:>3} pilots",
                        row.deck,
                        row.entries,
                        row.wins,
                        row.losses,
                        row.win_rate * 100.0,
                        row.meta_share * 100.0,
                        row.unique_players
                    );
                }
            }
        }
        Commands::AddDeck { name, colors, link } => {
            let mut deck = Deck::new(name, &colors);
            if let Some(link) = link {
                deck = deck.with_link(link);
            }
            let created = ledger.catalog().add_deck(deck.clone()).await?;
            if created {
                println!("Registered deck {}.", deck.name);
            } else {
                println!("Updated deck {}.", deck.name);
            }
        }
        Commands::AddAlias { deck, aliases } => {
            let deck = ledger.catalog().add_aliases(&deck, &aliases).await?;
            println!("{} now answers to: {}", deck.name, deck.aliases.join(", "));
        }
        Commands::ResetSeason => {
            let summary = ledger.reset_season(&league).await?;
            println!(
                "Season {} closed; season {} is open.",
                summary.closed_season, summary.next_season
            );
            for (rank, p) in summary.leaders.iter().enumerate() {
                println!("  {}. {} ({} pts)", rank + 1, p.display_name, p.rating);
            }
        }
    }

    Ok(())
}
