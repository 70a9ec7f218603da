use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "betahealth")]
#[command(version)]
#[command(about = "BetaHealth AI - ask questions about stem cell therapy from your terminal", long_about = None)]
pub struct Cli {
    /// Gemini model to chat with (overrides gemini.chat_model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Ask a single question and exit
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output format for non-interactive mode
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, requires = "prompt")]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// Start a chat session (default)
    Chat,
    /// Generate a scientific illustration of a therapy topic
    Illustrate {
        /// What to draw, e.g. "mesenchymal stem cells repairing cartilage"
        subject: String,
        /// Write the data URL to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show version information
    Version,
    /// Check API key and endpoint reachability
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
    /// Markdown formatted output
    Markdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_with_json_output() {
        let cli = Cli::try_parse_from([
            "betahealth",
            "--prompt",
            "What is an iPSC?",
            "--output-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("What is an iPSC?"));
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_output_format_requires_prompt() {
        let result = Cli::try_parse_from(["betahealth", "--output-format", "json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_illustrate_subcommand() {
        let cli = Cli::try_parse_from([
            "betahealth",
            "illustrate",
            "cardiac stem cells",
            "--output",
            "heart.txt",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Illustrate { subject, output }) => {
                assert_eq!(subject, "cardiac stem cells");
                assert_eq!(output, Some(PathBuf::from("heart.txt")));
            }
            other => panic!("Expected illustrate, got {:?}", other),
        }
    }
}
