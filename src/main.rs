use std::io::{self as std_io, Write};
use std::path::PathBuf;

use clap::Parser;
use console::{style, Term};
use futures::StreamExt;
use tokio::io::{self, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use ragdesk::domains::chat::{ChatMode, Reaction, Role};
use ragdesk::domains::format_timestamp;
use ragdesk::domains::preferences::{ColorPalette, Theme};
use ragdesk::domains::presentation::PresentationBrief;
use ragdesk::error::{RagDeskError, Result};
use ragdesk::services::notifications::NoticeLevel;
use ragdesk::{Config, RagDesk};

#[derive(Parser, Debug)]
#[command(name = "ragdesk")]
#[command(about = "Document-grounded assistant for the terminal")]
struct Cli {
    #[arg(long, env = "RAGDESK_CONFIG", default_value = "./ragdesk.json")]
    config: PathBuf,

    #[arg(long, env = "RAGDESK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Interactive chat session.
    Chat {
        #[arg(long, default_value = "chat")]
        mode: ChatMode,
        /// Start a fresh chat instead of resuming the active one.
        #[arg(long, default_value_t = false)]
        new: bool,
        #[arg(long = "doc")]
        documents: Vec<String>,
    },
    /// One question, answer printed to stdout.
    Ask {
        #[arg(long, default_value = "chat")]
        mode: ChatMode,
        #[arg(long = "doc")]
        documents: Vec<String>,
        prompt: String,
    },
    Chats {
        #[command(subcommand)]
        command: Option<ChatsCommand>,
    },
    Docs {
        #[command(subcommand)]
        command: DocsCommand,
    },
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
    /// Generate a sales presentation and export it as .pptx and .html.
    Present {
        #[arg(long)]
        client: String,
        #[arg(long)]
        industry: String,
        #[arg(long, default_value = "")]
        pain_points: String,
        #[arg(long, default_value = "")]
        interests: String,
        #[arg(long, default_value = "./presentation")]
        out: PathBuf,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ChatsCommand {
    List,
    Select { id: String },
    Rename { id: String, title: String },
    Delete { id: String },
    Export { id: String },
}

#[derive(clap::Subcommand, Debug)]
enum DocsCommand {
    List,
    Upload { path: PathBuf },
    Delete { id: String },
}

#[derive(clap::Subcommand, Debug)]
enum PrefsCommand {
    Show,
    Theme { theme: Theme },
    Prompt { mode: ChatMode, text: String },
    Palette {
        primary: String,
        secondary: String,
        accent: String,
        background: String,
        text: String,
    },
    ResetPalette,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigCommand {
    Show,
}

fn rule(width: usize) -> String {
    "─".repeat(width.clamp(36, 96))
}

fn runtime_err(err: std_io::Error) -> RagDeskError {
    RagDeskError::Runtime(err.to_string())
}

fn print_banner(user_id: &str, chat_title: &str, mode: ChatMode) {
    let width = Term::stdout().size().1 as usize;
    let line = rule(width);
    println!("{}", style(&line).color256(39));
    println!("{}", style("ragdesk").color256(39).bold());
    println!(
        "{}",
        style(format!("User: {user_id} • Chat: {chat_title} • Mode: {mode}")).color256(250)
    );
    println!(
        "{}",
        style("Commands: /mode <m>, /docs <id,..>, /new, /regen, /react <up|down|star>, /clear, /quit")
            .color256(245)
    );
    println!("{}", style(&line).color256(39));
}

fn print_user_prompt() -> std_io::Result<()> {
    let mut out = std_io::stdout();
    write!(
        out,
        "{} {} ",
        style("➜").color256(45).bold(),
        style("You").color256(81).bold()
    )?;
    out.flush()
}

fn print_assistant_prefix() {
    print!("{} {} ", style("✦").color256(39).bold(), style("Assistant").color256(39).bold());
    let _ = std_io::stdout().flush();
}

fn spawn_notice_printer(app: &RagDesk) {
    let mut rx = app.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let text = match event.level {
                        NoticeLevel::Info => style(event.message).color256(245),
                        NoticeLevel::Warning => style(event.message).color256(214),
                        NoticeLevel::Error => style(event.message).color256(196).bold(),
                    };
                    eprintln!("{} {text}", style("•").color256(245));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Streams one reply to stdout; returns false when it failed.
async fn stream_reply(app: &RagDesk, chat_id: &str, text: &str) -> bool {
    print_assistant_prefix();
    let mut stream = app.send_message_stream(chat_id, text);
    let mut ok = true;
    while let Some(delta) = stream.next().await {
        match delta {
            Ok(delta) => {
                print!("{delta}");
                let _ = std_io::stdout().flush();
            }
            Err(err) => {
                println!("{}", style(format!("[{err}]")).color256(196));
                ok = false;
                break;
            }
        }
    }
    drop(stream);
    println!();
    if ok {
        print_sources(app, chat_id).await;
    }
    ok
}

async fn print_sources(app: &RagDesk, chat_id: &str) {
    let Ok(chat) = app.chat().chat(chat_id).await else {
        return;
    };
    let Some(reply) = chat.messages.iter().rev().find(|m| m.role == Role::Assistant) else {
        return;
    };
    if reply.sources.is_empty() || chat.mode != ChatMode::Rag {
        return;
    }
    println!("{}", style("Sources:").color256(81).bold());
    for (idx, source) in reply.sources.iter().enumerate() {
        println!(
            "  {} {} {}",
            style(format!("[{}]", idx + 1)).color256(245),
            source.label,
            style(format!("({:.2})", source.score)).color256(245)
        );
    }
}

fn parse_documents(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn run_chat(app: &RagDesk, user_id: &str, mode: ChatMode, new: bool, documents: Vec<String>) -> Result<()> {
    let mut chat_id = if new {
        app.chat().create_chat(mode, None).await?
    } else {
        app.ensure_active_chat(mode).await?
    };
    if !documents.is_empty() {
        app.chat().set_chat_documents(&chat_id, documents).await?;
    }
    let chat = app.chat().chat(&chat_id).await?;
    print_banner(user_id, &chat.title, chat.mode);

    let stdin = io::BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    loop {
        print_user_prompt().map_err(runtime_err)?;
        let Some(line) = lines.next_line().await.map_err(runtime_err)? else {
            println!("\n{}", style("Goodbye").color256(245));
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
            let outcome = match name {
                "quit" | "exit" => break,
                "new" => app.chat().create_chat(mode, None).await.map(|id| {
                    chat_id = id;
                    "Started a new chat".to_string()
                }),
                "mode" => match arg.trim().parse::<ChatMode>() {
                    Ok(mode) => app
                        .chat()
                        .set_chat_mode(&chat_id, mode)
                        .await
                        .map(|_| format!("Mode set to {mode}")),
                    Err(err) => Err(err),
                },
                "docs" => app
                    .chat()
                    .set_chat_documents(&chat_id, parse_documents(arg))
                    .await
                    .map(|_| "Documents updated".to_string()),
                "clear" => app
                    .chat()
                    .clear_messages(&chat_id)
                    .await
                    .map(|_| "Chat cleared".to_string()),
                "react" => react_to_last(app, &chat_id, arg).await,
                "regen" => {
                    print_assistant_prefix();
                    let mut stream = app.chat().regenerate_last_stream(&chat_id);
                    let mut result = Ok(String::new());
                    while let Some(delta) = stream.next().await {
                        match delta {
                            Ok(delta) => {
                                print!("{delta}");
                                let _ = std_io::stdout().flush();
                            }
                            Err(err) => {
                                result = Err(err);
                                break;
                            }
                        }
                    }
                    println!();
                    result
                }
                other => Err(RagDeskError::Validation(format!("unknown command /{other}"))),
            };
            match outcome {
                Ok(message) if !message.is_empty() => println!("{}", style(message).color256(245)),
                Ok(_) => {}
                Err(err) => println!("{}", style(err.to_string()).color256(196)),
            }
            continue;
        }
        stream_reply(app, &chat_id, line).await;
    }
    Ok(())
}

async fn react_to_last(app: &RagDesk, chat_id: &str, arg: &str) -> Result<String> {
    let reaction: Reaction = arg.trim().parse()?;
    let chat = app.chat().chat(chat_id).await?;
    let message = chat
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .ok_or_else(|| RagDeskError::Validation("no reply to react to".to_string()))?;
    let on = app.chat().toggle_reaction(chat_id, &message.id, reaction).await?;
    Ok(format!("{reaction:?} {}", if on { "added" } else { "removed" }))
}

async fn run_chats(app: &RagDesk, command: Option<ChatsCommand>) -> Result<()> {
    match command.unwrap_or(ChatsCommand::List) {
        ChatsCommand::List => {
            let active = app.chat().active_chat().await.map(|c| c.id);
            for chat in app.list_chats().await {
                let marker = if active.as_deref() == Some(chat.id.as_str()) { "*" } else { " " };
                println!(
                    "{marker} {} {} {} {}",
                    style(&chat.id).color256(245),
                    style(&chat.title).bold(),
                    style(format!("[{}]", chat.mode)).color256(81),
                    style(format_timestamp(chat.updated_at)).color256(245)
                );
            }
        }
        ChatsCommand::Select { id } => app.chat().select_chat(&id).await?,
        ChatsCommand::Rename { id, title } => app.chat().rename_chat(&id, &title).await?,
        ChatsCommand::Delete { id } => app.chat().delete_chat(&id).await?,
        ChatsCommand::Export { id } => print!("{}", app.chat().chat(&id).await?.to_markdown()),
    }
    Ok(())
}

async fn run_docs(app: &RagDesk, command: DocsCommand) -> Result<()> {
    match command {
        DocsCommand::List => {
            let docs = app.list_documents().await?;
            if docs.is_empty() {
                println!("{}", style("No documents.").color256(245));
            }
            for doc in docs {
                println!(
                    "{} {} {}",
                    style(&doc.id).color256(245),
                    style(&doc.name).bold(),
                    style(doc.status.unwrap_or_default()).color256(81)
                );
            }
        }
        DocsCommand::Upload { path } => {
            let doc = app.upload_document(&path).await?;
            println!("Uploaded {} as {}", doc.name, doc.id);
        }
        DocsCommand::Delete { id } => {
            app.delete_document(&id).await?;
        }
    }
    Ok(())
}

async fn run_prefs(app: &RagDesk, command: PrefsCommand) -> Result<()> {
    match command {
        PrefsCommand::Show => {
            let prefs = app.chat().preferences().await;
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
        PrefsCommand::Theme { theme } => app.chat().set_theme(theme).await?,
        PrefsCommand::Prompt { mode, text } => app.chat().set_default_system_prompt(mode, &text).await?,
        PrefsCommand::Palette {
            primary,
            secondary,
            accent,
            background,
            text,
        } => {
            app.chat()
                .set_custom_palette(ColorPalette {
                    primary,
                    secondary,
                    accent,
                    background,
                    text,
                })
                .await?
        }
        PrefsCommand::ResetPalette => app.chat().reset_palette().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ragdesk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std_io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_file(&cli.config)?.with_api_key(cli.api_key.clone());
    if let Some(user_id) = &cli.user_id {
        config.user_id = Some(user_id.clone());
    }

    if let Commands::Config {
        command: ConfigCommand::Show,
    } = &cli.command
    {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    let user_id = config.user_id().to_string();
    let app = RagDesk::from_config(config).await?;
    spawn_notice_printer(&app);

    match cli.command {
        Commands::Chat { mode, new, documents } => run_chat(&app, &user_id, mode, new, documents).await?,
        Commands::Ask { mode, documents, prompt } => {
            let chat_id = app.chat().create_chat(mode, None).await?;
            if !documents.is_empty() {
                app.chat().set_chat_documents(&chat_id, documents).await?;
            }
            let reply = app.send_message(&chat_id, &prompt).await?;
            println!("{}", reply.content);
        }
        Commands::Chats { command } => run_chats(&app, command).await?,
        Commands::Docs { command } => run_docs(&app, command).await?,
        Commands::Prefs { command } => run_prefs(&app, command).await?,
        Commands::Present {
            client,
            industry,
            pain_points,
            interests,
            out,
        } => {
            let brief = PresentationBrief {
                client_name: client,
                industry,
                pain_points,
                interests,
            };
            let data = app.generate_presentation(&brief).await?;
            app.export_presentation(&data, &out).await?;
            println!(
                "{} {} ({} slides)",
                style("Saved").color256(81).bold(),
                out.with_extension("pptx").display(),
                data.slides.len()
            );
        }
        Commands::Config { .. } => {}
    }
    Ok(())
}
