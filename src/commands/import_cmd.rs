use chrono::Utc;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::db::FoodLogRepository;
use crate::mealie::{MealieClient, RecipeImport};
use crate::models::{FoodItem, FoodLog};

#[derive(Args)]
pub struct ImportCommand {
    #[command(subcommand)]
    pub command: ImportSubcommand,
}

#[derive(Subcommand)]
pub enum ImportSubcommand {
    /// Verify the configured recipe service credentials
    Check,

    /// Fetch a recipe's ingredients by slug
    Recipe {
        /// Recipe slug on the remote service
        slug: String,

        /// Also create a food log dated now from the ingredients
        #[arg(long)]
        log: bool,
    },
}

impl ImportCommand {
    pub async fn run(
        &self,
        repo: &FoodLogRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let client = match (&config.mealie_url, &config.mealie_token) {
            (Some(url), Some(token)) => MealieClient::new(url.as_str(), token.as_str()),
            _ => {
                return Err(
                    "Recipe import is not configured. Set mealie_url and mealie_token.".into(),
                )
            }
        };

        match &self.command {
            ImportSubcommand::Check => match client.check_credentials().await {
                Ok(username) => {
                    println!("Authenticated as {}", username);
                    Ok(())
                }
                Err(e) => {
                    tracing::debug!("credential check failed: {}", e);
                    Err("Could not validate credentials".into())
                }
            },

            ImportSubcommand::Recipe { slug, log } => {
                match client.fetch_recipe_ingredients(slug).await {
                    RecipeImport::Empty => {
                        println!("Recipe '{}' has no usable ingredients", slug);
                        Ok(())
                    }
                    RecipeImport::Success(names) => {
                        println!("Ingredients for '{}':", slug);
                        for name in &names {
                            println!("  - {}", name);
                        }

                        if *log {
                            let entry = FoodLog::new(Utc::now())
                                .with_items(names.iter().map(FoodItem::new).collect());
                            let created = repo.insert(&entry).await?;
                            println!("Created food log #{}", created.id);
                        }
                        Ok(())
                    }
                    RecipeImport::Error(message) => {
                        let message = message
                            .unwrap_or_else(|| "Unknown recipe import failure".to_string());
                        Err(format!("Recipe import failed: {}", message).into())
                    }
                }
            }
        }
    }
}
