use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;
use std::path::Path;

use crate::{
    app::{get_config_dir, init_config, Config},
    models::{generate_illustration, ChatProvider, GeminiProvider},
};

use super::Commands;

/// Handle CLI subcommands. Returns `false` when the caller should continue into chat.
pub async fn handle_command(command: &Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Init => {
            println!("Initializing BetaHealth configuration...");
            let path = init_config()?;
            println!("Configuration ready at: {}", path.display());
            Ok(true)
        }
        Commands::Illustrate { subject, output } => {
            illustrate(config, subject, output.as_deref()).await?;
            Ok(true)
        }
        Commands::Version => {
            show_version();
            Ok(true)
        }
        Commands::Status => {
            show_status(config).await?;
            Ok(true)
        }
        Commands::Chat => Ok(false), // Continue to chat interface
    }
}

/// Show version information
pub fn show_version() {
    println!("BetaHealth AI v{}", env!("CARGO_PKG_VERSION"));
    println!("   Stem cell therapy questions, answered from your terminal");
}

/// Generate an illustration and print or save its data URL
async fn illustrate(config: &Config, subject: &str, output: Option<&Path>) -> Result<()> {
    let provider = GeminiProvider::from_config(&config.gemini)?;
    write_illustration(
        &provider,
        subject,
        output,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await
}

/// Only the data URL goes to `out`; progress lines go to `progress` so stdout can be piped
async fn write_illustration(
    provider: &GeminiProvider,
    subject: &str,
    output: Option<&Path>,
    out: &mut impl Write,
    progress: &mut impl Write,
) -> Result<()> {
    writeln!(progress, "Generating illustration of {}...", subject.cyan())?;
    let Some(data_url) = generate_illustration(provider, subject).await else {
        anyhow::bail!("No illustration could be generated for '{}'", subject);
    };

    match output {
        Some(path) => {
            std::fs::write(path, &data_url)
                .with_context(|| format!("Failed to write illustration to {}", path.display()))?;
            writeln!(progress, "  [OK] Saved to {}", path.display())?;
        }
        None => writeln!(out, "{}", data_url)?,
    }
    Ok(())
}

/// Show configuration and endpoint status
async fn show_status(config: &Config) -> Result<()> {
    println!("BetaHealth Status:");
    println!();

    let config_path = get_config_dir()?.join("config.toml");
    if config_path.exists() {
        println!("  [OK] Configuration: {}", config_path.display());
    } else {
        println!("  [WARNING] Configuration: Not found (using defaults)");
    }

    println!("  Chat model:  {}", config.gemini.chat_model.green());
    println!("  Image model: {}", config.gemini.image_model.green());

    match GeminiProvider::from_config(&config.gemini) {
        Ok(provider) => {
            println!("  [OK] API key: Set");
            if provider.validate_connection().await? {
                println!("  [OK] Gemini: Reachable at {}", config.gemini.base_url);
            } else {
                println!("  [ERROR] Gemini: Not reachable at {}", config.gemini.base_url);
            }
        }
        Err(e) => println!("  [ERROR] {}", e),
    }

    println!();
    Ok(())
}
