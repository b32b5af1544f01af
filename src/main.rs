use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use dinecache::{
  logging, query, Config, HttpRemote, LocalStore, NewReview, Restaurant, Source, SyncCoordinator,
};

#[derive(Parser, Debug)]
#[command(name = "dinecache")]
#[command(about = "Offline-first restaurant and review cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dinecache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List restaurants, optionally filtered
  Restaurants {
    #[arg(long, default_value = query::ALL)]
    cuisine: String,
    #[arg(long, default_value = query::ALL)]
    neighborhood: String,
  },
  /// List reviews for a restaurant
  Reviews { restaurant_id: i64 },
  /// List distinct cuisines
  Cuisines,
  /// List distinct neighborhoods
  Neighborhoods,
  /// Toggle a restaurant's favorite flag
  Favorite { id: i64 },
  /// Submit a review
  Review {
    restaurant_id: i64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    rating: i64,
    #[arg(long)]
    comments: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref());

  let config = Config::load(args.config.as_deref())?;
  info!(restaurants = %config.remote.restaurants_url, store = %config.store.name, "dinecache starting");

  let remote = HttpRemote::new(&config.remote)?;
  let sync = SyncCoordinator::new(remote, LocalStore::new(config.store.clone()));

  match args.command {
    Command::Restaurants {
      cuisine,
      neighborhood,
    } => {
      let synced = sync.fetch_with_source::<Restaurant>().await;
      note_source(synced.source);
      let filtered = query::filter_by_cuisine_and_neighborhood(synced.data, &cuisine, &neighborhood);
      print_json(&filtered)?;
    }
    Command::Reviews { restaurant_id } => {
      let synced = sync.fetch_reviews_with_source(restaurant_id).await;
      note_source(synced.source);
      print_json(&synced.data)?;
    }
    Command::Cuisines => {
      print_json(&sync.cuisines().await)?;
    }
    Command::Neighborhoods => {
      print_json(&sync.neighborhoods().await)?;
    }
    Command::Favorite { id } => {
      let updated = sync
        .toggle_favorite_by_id(id)
        .await?
        .ok_or_else(|| eyre!("Restaurant {} not found", id))?;
      print_json(&updated)?;
    }
    Command::Review {
      restaurant_id,
      name,
      rating,
      comments,
    } => {
      let review = NewReview::new(restaurant_id, name, rating, comments);
      let created = sync.mutations().submit_review(&review).await?;
      print_json(&created)?;
    }
  }

  Ok(())
}

fn note_source(source: Source) {
  match source {
    Source::Network => {}
    Source::Store => eprintln!("offline: showing cached data"),
    Source::Unavailable => eprintln!("offline: no cached data available"),
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
