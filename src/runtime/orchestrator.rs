use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufRead, BufReader};

use super::non_interactive::{format_result, NonInteractiveRunner};
use super::repl::run_repl;
use crate::{
    app::{load_config, load_config_from, Config},
    cli::{handle_command, Cli},
    models::{ChatProvider, GeminiProvider},
    session::{ChatSession, SessionSettings, Transcript},
    utils::{log_warn, ChatError},
};

/// Main runtime orchestrator
pub struct Orchestrator {
    cli: Cli,
    config: Config,
}

impl Orchestrator {
    /// Create a new orchestrator from CLI args
    pub fn new(cli: Cli) -> Result<Self> {
        // Load configuration
        let mut config = if let Some(config_path) = &cli.config {
            if !config_path.exists() {
                return Err(ChatError::Config(format!(
                    "config file not found: {}",
                    config_path.display()
                ))
                .into());
            }
            load_config_from(&[config_path.clone()])?
        } else {
            match load_config() {
                Ok(cfg) => cfg,
                Err(e) => {
                    log_warn("⚠️", format!("Failed to load config: {:#}. Using defaults.", e));
                    Config::default()
                }
            }
        };

        if let Some(model) = &cli.model {
            config.gemini.chat_model = model.clone();
        }

        Ok(Self { cli, config })
    }

    /// Run the orchestrator
    pub async fn run(self) -> Result<()> {
        // Handle subcommands
        if let Some(command) = &self.cli.command {
            if handle_command(command, &self.config).await? {
                return Ok(()); // Command handled, exit
            }
            // Continue to chat for Commands::Chat
        }

        let settings = SessionSettings::from_config(&self.config);

        // A setup failure means no input is accepted at all
        let provider = match GeminiProvider::from_config(&self.config.gemini) {
            Ok(p) => p,
            Err(e) => exit_with_setup_error(&e),
        };

        if let Some(prompt) = self.cli.prompt.clone() {
            let runner = match NonInteractiveRunner::new(&provider, &settings).await {
                Ok(r) => r,
                Err(e) => exit_with_setup_error(&e),
            };

            let result = runner.execute(prompt).await;
            println!("{}", format_result(&result, self.cli.output_format));

            // Exit with appropriate code
            if !result.answered {
                std::process::exit(1);
            }
            return Ok(());
        }

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();
        let transcript = match run_chat(&provider, &settings, stdin, &mut stdout).await {
            Ok(t) => t,
            Err(e) if ChatError::kind_of(&e) == "setup" => exit_with_setup_error(&e),
            Err(e) => return Err(e),
        };

        println!(
            "{}",
            format!("Session ended after {} messages.", transcript.len()).dimmed()
        );
        Ok(())
    }
}

/// Open a session on `provider` and run the REPL over it.
///
/// A setup failure is returned before anything is read from `input` or
/// written to `out`.
pub async fn run_chat<R, W>(
    provider: &dyn ChatProvider,
    settings: &SessionSettings,
    input: R,
    out: &mut W,
) -> Result<Transcript>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let session = ChatSession::initialize(provider, settings).await?;

    writeln!(
        out,
        "🧬 BetaHealth AI ready with model: {}\n",
        session.model_name().green()
    )?;
    run_repl(&session, input, out).await?;

    Ok(session.dispose())
}

fn exit_with_setup_error(error: &impl std::fmt::Display) -> ! {
    eprintln!("❌ Failed to start chat: {}", error);
    eprintln!("   Check your Gemini API key and model configuration.");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatModel, MockChatProvider, ModelResponse};
    use async_trait::async_trait;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct CannedModel;

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn send_message(&mut self, _text: &str) -> Result<ModelResponse> {
            Ok(ModelResponse::new("Ask your doctor.", "canned"))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_setup_failure_reads_no_input() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_create_chat()
            .times(1)
            .returning(|_, _| Err(ChatError::Setup("model identifier is empty".into()).into()));

        let mut input: &[u8] = b"hello\n";
        let mut out = Vec::new();
        let err = run_chat(&provider, &SessionSettings::default(), &mut input, &mut out)
            .await
            .unwrap_err();

        assert_eq!(ChatError::kind_of(&err), "setup");
        assert_eq!(input, b"hello\n");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_chat_runs_until_eof() {
        let mut provider = MockChatProvider::new();
        provider
            .expect_create_chat()
            .times(1)
            .return_once(|_, _| Ok(Box::new(CannedModel) as Box<dyn ChatModel>));

        let mut out = Vec::new();
        let transcript = run_chat(
            &provider,
            &SessionSettings::default(),
            &b"Can stem cells help arthritis?\n"[..],
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(transcript.len(), 3);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("ready with model"));
        assert!(printed.contains("Ask your doctor."));
    }

    fn cli_with_config(path: &std::path::Path, extra: &[&str]) -> Cli {
        let mut args = vec!["betahealth", "--config", path.to_str().unwrap()];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_config_flag_layers_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[gemini]\nimage_model = \"file-image\"\n").unwrap();

        let orchestrator = Orchestrator::new(cli_with_config(&path, &[])).unwrap();
        assert_eq!(orchestrator.config.gemini.image_model, "file-image");
        assert_eq!(orchestrator.config.chat.fallback_reply, crate::constants::FALLBACK_REPLY);

        let orchestrator = Orchestrator::new(cli_with_config(&path, &["--model", "flag-model"]))
            .unwrap();
        assert_eq!(orchestrator.config.gemini.chat_model, "flag-model");
    }

    #[test]
    fn test_missing_config_flag_is_config_error() {
        let dir = TempDir::new().unwrap();
        let cli = cli_with_config(&dir.path().join("absent.toml"), &[]);
        let err = match Orchestrator::new(cli) {
            Err(e) => e,
            Ok(_) => panic!("Expected config error"),
        };
        assert_eq!(ChatError::kind_of(&err), "config");
    }
}
