mod ai_sdk;
mod assistant;
mod client;
mod error;
mod prompts;
mod protocol;
mod relay;
mod report;
mod server;
mod token;

use ai_sdk::AiConfig;
use clap::{Args, Parser, Subcommand};
use client::{ClientConfig, StreamClient};
use protocol::{AskRequest, StreamEvent};
use server::ServerConfig;
use std::io::Write;
use token::TokenFile;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "weekly-report-ai", version, about = "AI assistant backend for daily and weekly work reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Ask a running server a question and stream the answer
    Ask(AskArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "WEEKLY_AI_LISTEN", default_value = "127.0.0.1:3001")]
    listen: String,
    /// Bearer token clients must present; generated and stored when omitted
    #[arg(long, env = "WEEKLY_AI_TOKEN")]
    token: Option<String>,
    #[arg(long, env = "AI_API_URL", default_value = ai_sdk::DEFAULT_API_URL)]
    api_url: String,
    #[arg(long, env = "AI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = "AI_MODEL", default_value = ai_sdk::DEFAULT_MODEL)]
    model: String,
    #[arg(long, env = "AI_TEMPERATURE", default_value_t = ai_sdk::DEFAULT_TEMPERATURE)]
    temperature: f32,
}

#[derive(Args)]
struct AskArgs {
    question: String,
    #[arg(long, env = "WEEKLY_AI_URL", default_value = "http://127.0.0.1:3001")]
    url: String,
    #[arg(long, env = "WEEKLY_AI_TOKEN")]
    token: Option<String>,
    #[arg(long)]
    system_prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,weekly_report_ai=debug".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Ask(args) => ask(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let token_file = TokenFile::default_location();
    let auth_token = token::resolve_server_token(&token_file, args.token)?;
    tracing::info!("auth token stored at {}", token_file.path().display());
    server::run(ServerConfig {
        listen: args.listen,
        auth_token,
        ai: AiConfig {
            api_url: args.api_url,
            api_key: args.api_key,
            model: args.model,
            temperature: args.temperature,
        },
    })
    .await
}

async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let client = StreamClient::new(ClientConfig {
        base_url: args.url,
        token: token::resolve_client_token(&TokenFile::default_location(), args.token)?,
    });
    tracing::debug!(url = client.base_url(), "asking");

    let request = AskRequest {
        question: args.question,
        system_prompt: args.system_prompt,
    };
    let mut printer = AnswerPrinter::new(std::io::stdout());
    client
        .ask_stream(&request, |event| {
            printer.handle(event);
            async {}
        })
        .await?;
    printer.finish()
}

/// Writes streamed fragments as they arrive and keeps the first failure,
/// whether the server reported it or the output could not be written.
struct AnswerPrinter<W> {
    out: W,
    failure: Option<anyhow::Error>,
}

impl<W: Write> AnswerPrinter<W> {
    fn new(out: W) -> Self {
        Self { out, failure: None }
    }

    fn handle(&mut self, event: StreamEvent) {
        if self.failure.is_some() {
            return;
        }

        match event {
            StreamEvent::Content { content } => {
                let written = self
                    .out
                    .write_all(content.as_bytes())
                    .and_then(|()| self.out.flush());
                if let Err(err) = written {
                    self.failure = Some(anyhow::Error::new(err).context("could not write answer"));
                }
            }
            StreamEvent::Error { error } => self.failure = Some(anyhow::anyhow!(error)),
        }
    }

    fn finish(mut self) -> anyhow::Result<()> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        writeln!(self.out)?;
        Ok(())
    }
}
