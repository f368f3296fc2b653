//! RosterDB CLI
//!
//! Opens the roster database, applies the schema upgrade when needed, and
//! runs one operation against the `friends` collection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rosterdb::friends::{self, DEFAULT_DATABASE_NAME, SCHEMA_VERSION};
use rosterdb::{Config, Database, Friend, FriendStore, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// RosterDB CLI
#[derive(Parser, Debug)]
#[command(name = "rosterdb-cli")]
#[command(about = "Keep a small roster of friends in an embedded database")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./rosterdb_data")]
    data_dir: PathBuf,

    /// Database name
    #[arg(short, long, default_value = DEFAULT_DATABASE_NAME)]
    name: String,

    /// Schema version to open with
    #[arg(long, default_value_t = SCHEMA_VERSION)]
    db_version: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add the demo friends (Anna, 25 and Ivan, 30)
    Seed,

    /// Add a friend
    Add {
        /// Friend's name
        name: String,

        /// Friend's age
        age: u32,
    },

    /// List every friend
    List,

    /// Show one friend by id
    Get {
        /// The friend's id
        id: u64,
    },

    /// Delete a friend by id, then list the rest
    Delete {
        /// The friend's id
        id: u64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rosterdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("RosterDB CLI v{}", rosterdb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .name(&args.name)
        .build();

    let database = Database::new();
    database.open(config, args.db_version, friends::upgrade).await?;
    let store = FriendStore::new(database);

    match args.command {
        Commands::Seed => {
            for (name, age) in [("Anna", 25), ("Ivan", 30)] {
                let id = store.insert(name, age)?.await?;
                println!("added {} ({}) as #{}", name, age, id);
            }
        }
        Commands::Add { name, age } => {
            let id = store.insert(name, age)?.await?;
            println!("added #{}", id);
        }
        Commands::List => print_all(&store.read_all()?.await?),
        Commands::Get { id } => match store.read_by_key(id)?.await? {
            Some(friend) => print_friend(&friend),
            None => println!("no friend with id {}", id),
        },
        Commands::Delete { id } => print_all(&store.delete(id)?.await?),
    }

    Ok(())
}

fn print_all(friends: &[Friend]) {
    if friends.is_empty() {
        println!("(no friends)");
    }
    for friend in friends {
        print_friend(friend);
    }
}

fn print_friend(friend: &Friend) {
    let id = friend.id.map(|id| id.to_string()).unwrap_or_default();
    println!(
        "#{:<4} {:<20} {:>3}  added {}",
        id,
        friend.name,
        friend.age,
        friend.added.format("%Y-%m-%d %H:%M:%S")
    );
}
