mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::commands::{ViewModel, cmd_add, cmd_delete, cmd_edit, cmd_list, cmd_show, cmd_watch};
use crate::config::Config;
use culinary_core::db::Database;
use culinary_core::models::RecipeForm;
use culinary_core::store::DEFAULT_POLL_INTERVAL;
use culinary_core::{RecipeRepository, RecipeStore};

#[derive(Parser)]
#[command(
    name = "culinary",
    version,
    about = "A simple, local-first recipe manager"
)]
struct Cli {
    /// Path to the recipe database (default: culinary.db in the data directory)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all recipes, ordered by title
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe's ingredients and instructions
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a new recipe
    Add {
        /// Recipe title
        title: String,
        /// Ingredients, separated by commas or newlines
        #[arg(long)]
        ingredients: String,
        /// Preparation instructions
        #[arg(long)]
        instructions: String,
        /// Category label (e.g. "Breakfast")
        #[arg(long)]
        category: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing recipe (only the given fields change)
    Edit {
        /// Recipe ID
        id: i64,
        #[command(flatten)]
        fields: EditFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe by ID
    Delete {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the recipe list whenever it changes (Ctrl-C to stop)
    Watch {
        /// How often to check for changes made by other processes, in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,
        /// Output one JSON array per change
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Args)]
struct EditFields {
    /// New title
    #[arg(long)]
    title: Option<String>,
    /// New ingredients
    #[arg(long)]
    ingredients: Option<String>,
    /// New instructions
    #[arg(long)]
    instructions: Option<String>,
    /// New category
    #[arg(long)]
    category: Option<String>,
}

impl From<EditFields> for RecipeForm {
    fn from(fields: EditFields) -> Self {
        RecipeForm {
            title: fields.title,
            ingredients: fields.ingredients,
            instructions: fields.instructions,
            category: fields.category,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let poll_interval = match cli.command {
        Commands::Watch { interval_ms, .. } => Duration::from_millis(interval_ms),
        _ => DEFAULT_POLL_INTERVAL,
    };
    let store = RecipeStore::with_poll_interval(Database::open(&config.db_path)?, poll_interval);
    let repository = Arc::new(RecipeRepository::new(store.clone()));

    let result = dispatch(cli.command, &config, repository).await;
    store.close().await?;
    result
}

async fn dispatch(
    command: Commands,
    config: &Config,
    repository: Arc<RecipeRepository<RecipeStore>>,
) -> Result<()> {
    match command {
        Commands::List { json } => cmd_list(&view_model(repository).await?, json),
        Commands::Show { id, json } => cmd_show(&view_model(repository).await?, id, json).await,
        Commands::Add {
            title,
            ingredients,
            instructions,
            category,
            json,
        } => {
            let form = RecipeForm {
                title: Some(title),
                ingredients: Some(ingredients),
                instructions: Some(instructions),
                category: Some(category),
            };
            cmd_add(&mut view_model(repository).await?, form, json).await
        }
        Commands::Edit { id, fields, json } => {
            cmd_edit(&mut view_model(repository).await?, id, fields.into(), json).await
        }
        Commands::Delete { id, json } => {
            cmd_delete(&mut view_model(repository).await?, id, json).await
        }
        Commands::Watch { json, .. } => cmd_watch(&mut view_model(repository).await?, json).await,
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, created) = config.load_or_create_api_key()?;
                if created {
                    eprintln!("Generated new API key: {key}");
                    eprintln!("Include in requests: Authorization: Bearer {key}");
                }
                Some(key)
            };
            server::start_server(repository, port, &bind, api_key).await
        }
    }
}

async fn view_model(repository: Arc<RecipeRepository<RecipeStore>>) -> Result<ViewModel> {
    Ok(ViewModel::new(repository).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn edit_fields_map_to_partial_form() {
        let cli = Cli::try_parse_from(["culinary", "edit", "3", "--title", "Greek Salad"]).unwrap();
        let Commands::Edit { id, fields, .. } = cli.command else {
            panic!("expected edit command");
        };
        let form = RecipeForm::from(fields);
        assert_eq!(id, 3);
        assert_eq!(form.title.as_deref(), Some("Greek Salad"));
        assert!(form.ingredients.is_none());
    }

    #[test]
    fn db_flag_is_global() {
        let cli = Cli::try_parse_from(["culinary", "list", "--db", "/tmp/r.db"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/r.db")));
    }
}
