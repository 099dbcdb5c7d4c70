//! Terminal front-end: read prompts from stdin, stream replies to stdout.

use anyhow::Context;
use gatechat::api::Credential;
use gatechat::chat::{generate_session_id, ChatContext, Transcript};
use gatechat::config::ConfigLoader;
use gatechat::ChatClient;
use std::io::Write;
use std::ops::ControlFlow;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

const ENV_USER_ID: &str = "GATECHAT_USER_ID";
const ENV_API_KEY: &str = "GATECHAT_API_KEY";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they never interleave with the streamed reply
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = ConfigLoader::new()
        .context("failed to load configuration")?
        .into_settings();
    let client = ChatClient::from_settings(&settings).context("failed to create chat client")?;
    let session_id = settings.session_id.clone().unwrap_or_else(generate_session_id);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let user_id = credential_field(ENV_USER_ID, "User ID", &mut input).await?;
    let api_key = credential_field(ENV_API_KEY, "API Key", &mut input).await?;
    let context = ChatContext::new(Credential::new(user_id, api_key), session_id);

    tracing::info!(flow_id = %settings.flow_id, session_id = %context.session_id, "chat started");
    println!("Chatting with flow {}. Commands: /history, /clear, /quit", settings.flow_id);

    let mut transcript = Transcript::new();
    loop {
        show_prompt("> ")?;
        let Some(line) = input.next_line().await? else {
            break;
        };

        let prompt = line.trim();
        match prompt {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                transcript = Transcript::new();
                continue;
            }
            "/history" => {
                print!("{}", transcript);
                continue;
            }
            _ => {}
        }

        let mut stdout = std::io::stdout();
        let mut write_error = None;
        transcript = client
            .chat_turn(transcript, &context, prompt, |chunk| {
                match write!(stdout, "{}", chunk).and_then(|_| stdout.flush()) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(e) => {
                        write_error = Some(e);
                        ControlFlow::Break(())
                    }
                }
            })
            .await;

        if let Some(e) = write_error {
            return Err(e).context("failed to write reply to stdout");
        }
        println!();
    }

    Ok(())
}

fn show_prompt(text: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

/// Read a credential from the environment, or ask for it on stdin
async fn credential_field(
    env: &str,
    label: &str,
    input: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<String> {
    if let Ok(value) = std::env::var(env) {
        if !value.is_empty() {
            return Ok(value);
        }
    }

    show_prompt(&format!("{}: ", label))?;
    let line = input
        .next_line()
        .await?
        .with_context(|| format!("stdin closed before {} was entered", label))?;
    Ok(line.trim().to_string())
}
