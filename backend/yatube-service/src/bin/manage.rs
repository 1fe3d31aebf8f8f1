//! Administrative commands without a web page.
//!
//! Usage:
//!   manage migrate
//!   manage create-group <slug> <title> [description]
//!   manage delete-group <slug>
//!   manage clear-cache

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatube_service::config::StorageBackend;
use yatube_service::models::NewGroup;
use yatube_service::{build_state, Config};

const USAGE: &str = "usage: manage <migrate | create-group <slug> <title> [description] | delete-group <slug> | clear-cache>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Migrate,
    CreateGroup {
        slug: String,
        title: String,
        description: String,
    },
    DeleteGroup {
        slug: String,
    },
    ClearCache,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let (cmd, rest) = args.split_first().ok_or_else(|| anyhow!(USAGE))?;
    match (cmd.as_str(), rest) {
        ("migrate", []) => Ok(Command::Migrate),
        ("create-group", [slug, title]) => Ok(Command::CreateGroup {
            slug: slug.clone(),
            title: title.clone(),
            description: String::new(),
        }),
        ("create-group", [slug, title, description]) => Ok(Command::CreateGroup {
            slug: slug.clone(),
            title: title.clone(),
            description: description.clone(),
        }),
        ("delete-group", [slug]) => Ok(Command::DeleteGroup { slug: slug.clone() }),
        ("clear-cache", []) => Ok(Command::ClearCache),
        _ => bail!(USAGE),
    }
}

async fn run(command: Command, mut config: Config) -> Result<()> {
    if command == Command::Migrate {
        if config.storage != StorageBackend::Postgres {
            bail!("migrate needs STORAGE_BACKEND=postgres");
        }
        config.database.run_migrations = true;
    }

    let state = build_state(config).await?;
    match command {
        Command::Migrate => println!("Migrations applied"),
        Command::CreateGroup {
            slug,
            title,
            description,
        } => {
            let group = state
                .repo
                .create_group(NewGroup {
                    title,
                    slug,
                    description,
                })
                .await
                .context("failed to create group")?;
            println!("Created group {} ({})", group.slug, group.id);
        }
        Command::DeleteGroup { slug } => {
            let group = state
                .repo
                .find_group_by_slug(&slug)
                .await?
                .ok_or_else(|| anyhow!("no group with slug {}", slug))?;
            state.repo.delete_group(group.id).await?;
            println!("Deleted group {}; its posts were kept without a group", slug);
        }
        Command::ClearCache => {
            let removed = state.cache.clear().await?;
            println!("Cleared {} cached pages", removed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,yatube_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    let config = Config::from_env().map_err(|e| anyhow!(e))?;

    run(command, config).await
}
