mod commands;
mod render;

use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{
    api::ChatApi, load_settings, login, register, spawn_synchronizer, Attachment, HttpChatApi,
    SyncError, SyncEvent, SyncHandle, WsConnector,
};
use shared::domain::{ChatId, ChatKind, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{Command, HELP},
    render::Renderer,
};

#[derive(Parser, Debug)]
struct Args {
    /// Overrides the configured server.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    /// Create the account before logging in.
    #[arg(long)]
    register: bool,
    /// Chat to open right after login.
    #[arg(long)]
    chat: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(settings.server_url.clone()));

    let context = if args.register {
        register(api.as_ref(), &settings.server_url, &args.username, &args.password).await?
    } else {
        login(api.as_ref(), &settings.server_url, &args.username, &args.password).await?
    };
    println!(
        "Logged in as {} (user_id={})",
        context.user.username, context.user.id
    );

    let connector = Arc::new(WsConnector::for_server(&context.server_url, context.user.id)?);
    let (handle, events) = spawn_synchronizer(context, &settings, Arc::clone(&api), connector);
    if let Some(chat) = args.chat {
        handle.select_chat(ChatId(chat)).await?;
    }

    let mut events = BroadcastStream::new(events);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = Renderer::default();
    println!("Type /help for commands.");

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    for line in renderer.render(&event) {
                        println!("{line}");
                    }
                    if let SyncEvent::ChatCreated { chat_id }
                    | SyncEvent::Error(SyncError::Conflict { chat_id }) = event
                    {
                        handle.select_chat(chat_id).await?;
                    }
                }
                Some(Err(err)) => warn!("event stream lagged: {err}"),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(err) = run_command(command, &handle, api.as_ref(), &mut renderer).await {
                            println!("! {err:#}");
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("! {message}"),
                }
            }
        }
    }

    handle.shutdown().await.ok();
    Ok(())
}

async fn run_command(
    command: Command,
    handle: &SyncHandle,
    api: &dyn ChatApi,
    renderer: &mut Renderer,
) -> Result<()> {
    match command {
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
        Command::Chats => {
            renderer.request_chat_list();
            handle.refresh_chats().await?;
        }
        Command::Users => {
            let own_id = handle.context().user.id;
            for user in api.list_users().await? {
                if user.id != own_id {
                    println!("{:>4}  {}", user.id.0, user.username);
                }
            }
        }
        Command::Select(chat_id) => handle.select_chat(chat_id).await?,
        Command::Leave => handle.leave_chat().await?,
        Command::Resync => handle.resync().await?,
        Command::Reply(message_id) => {
            let message = renderer
                .message(message_id)
                .ok_or_else(|| anyhow!("message {message_id} is not loaded"))?;
            handle.begin_reply(message.reply_target()).await?;
        }
        Command::CancelReply => handle.clear_reply().await?,
        Command::React { message_id, emoji } => handle.react(message_id, emoji).await?,
        Command::Unreact(message_id) => handle.remove_reaction(message_id).await?,
        Command::File { path, caption } => {
            let attachment = read_attachment(&path).await?;
            handle.edit_draft(caption).await?;
            handle.send(Some(attachment)).await?;
        }
        Command::Save { message_id, path } => {
            let file_path = renderer
                .message(message_id)
                .and_then(|m| m.attachment_path.clone())
                .ok_or_else(|| anyhow!("message {message_id} has no attachment"))?;
            let bytes = api.download_attachment(&file_path).await?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("* saved {} bytes to {}", bytes.len(), path.display());
        }
        Command::Direct { username } => {
            let members = resolve_users(api, &[username]).await?;
            handle.create_chat(ChatKind::Direct, None, members).await?;
        }
        Command::Group { name, usernames } => {
            let members = resolve_users(api, &usernames).await?;
            handle
                .create_chat(ChatKind::Group, Some(name), members)
                .await?;
        }
        Command::Say(text) => {
            handle.edit_draft(text).await?;
            handle.send(None).await?;
        }
    }
    Ok(())
}

async fn resolve_users(api: &dyn ChatApi, usernames: &[String]) -> Result<Vec<UserId>> {
    let directory = api.list_users().await?;
    usernames
        .iter()
        .map(|name| {
            directory
                .iter()
                .find(|user| &user.username == name)
                .map(|user| user.id)
                .ok_or_else(|| anyhow!("unknown user '{name}'"))
        })
        .collect()
}

async fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("attachment.bin")
        .to_string();
    let mime_type = mime_guess::from_path(path).first_raw().map(str::to_string);
    Ok(Attachment::File {
        filename,
        mime_type,
        bytes,
    })
}
