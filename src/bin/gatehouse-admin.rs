//! Administrative CLI for user management.
//!
//! Talks to the database directly rather than going through the HTTP API, so
//! it works while the service is down and is never subject to the request
//! guards.

use std::path::Path;

use clap::{Parser, Subcommand};

use gatehouse::accounts::PasswordHasher;
use gatehouse::config::{load_config, Config};
use gatehouse::db::Store;

#[derive(Parser)]
#[command(name = "gatehouse-admin")]
#[command(about = "Manage gatehouse users (create, delete, promote, demote, list)", long_about = None)]
struct Cli {
    /// Config file to read the database path from.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Registration IP to record (optional)
        #[arg(long, default_value = "")]
        ip: String,
        /// Role: admin or user
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Delete a user
    Delete {
        #[arg(long)]
        username: String,
    },
    /// Grant the admin role
    Promote {
        #[arg(long)]
        username: String,
    },
    /// Revert to the user role
    Demote {
        #[arg(long)]
        username: String,
    },
    /// List all users
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = if Path::new(&cli.config).exists() {
        load_config(Path::new(&cli.config))?
    } else {
        Config::default()
    };

    let store = Store::connect(&config.database.path).await?;
    store.migrate().await?;

    match cli.command {
        Commands::Create {
            username,
            password,
            ip,
            role,
        } => {
            let role = role.to_lowercase();
            if role != "admin" && role != "user" {
                return Err(format!("invalid role: {}", role).into());
            }

            let hash = PasswordHasher::new()
                .hash(password)
                .await
                .map_err(|e| e.to_string())?;
            let user = store.create_user(&username, &hash, &ip, &role).await?;
            println!(
                "created user: id={} username={} role={} created_at={}",
                user.id, user.username, user.role, user.created_at
            );
        }
        Commands::Delete { username } => {
            if store.delete_user(&username).await? {
                println!("deleted user {}", username);
            } else {
                return Err(format!("no such user: {}", username).into());
            }
        }
        Commands::Promote { username } => {
            let user = store
                .set_role(&username, "admin")
                .await?
                .ok_or_else(|| format!("no such user: {}", username))?;
            println!(
                "promoted user: id={} username={} role={}",
                user.id, user.username, user.role
            );
        }
        Commands::Demote { username } => {
            let user = store
                .set_role(&username, "user")
                .await?
                .ok_or_else(|| format!("no such user: {}", username))?;
            println!(
                "demoted user: id={} username={} role={}",
                user.id, user.username, user.role
            );
        }
        Commands::List => {
            let users = store.list_users().await?;
            println!("{:<5} {:<20} {:<8} {:<12}", "ID", "USERNAME", "ROLE", "CREATED_AT");
            for user in users {
                println!(
                    "{:<5} {:<20} {:<8} {:<12}",
                    user.id, user.username, user.role, user.created_at
                );
            }
        }
    }

    Ok(())
}
