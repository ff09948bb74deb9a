use std::{future::Future, sync::Arc};

use shared::domain::{ChatId, ChatKind, MessageId, ReplyRef, UserId};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TrySendError},
};
use tracing::{debug, info, warn};

use crate::{
    api::ChatApi,
    config::ClientSettings,
    error::{SyncError, SyncResult},
    push::{run_push_channel, Backoff, PushConnector, PushSignal},
    session::SessionContext,
    synchronizer::{Effect, SyncEvent, SyncInput, Synchronizer, UserAction},
    upload::{Attachment, UploadCoordinator},
};

enum Command {
    Input(SyncInput),
    Shutdown,
}

/// Cloneable handle to a running synchronizer.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SyncEvent>,
    context: SessionContext,
}

impl SyncHandle {
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    async fn act(&self, action: UserAction) -> SyncResult<()> {
        self.commands
            .send(Command::Input(SyncInput::User(action)))
            .await
            .map_err(|_| SyncError::Stopped)
    }

    pub async fn select_chat(&self, chat_id: ChatId) -> SyncResult<()> {
        self.act(UserAction::SelectChat(chat_id)).await
    }

    pub async fn leave_chat(&self) -> SyncResult<()> {
        self.act(UserAction::LeaveChat).await
    }

    pub async fn refresh_chats(&self) -> SyncResult<()> {
        self.act(UserAction::RefreshChats).await
    }

    pub async fn resync(&self) -> SyncResult<()> {
        self.act(UserAction::Resync).await
    }

    pub async fn edit_draft(&self, text: impl Into<String>) -> SyncResult<()> {
        self.act(UserAction::EditDraft(text.into())).await
    }

    pub async fn begin_reply(&self, reply: ReplyRef) -> SyncResult<()> {
        self.act(UserAction::BeginReply(reply)).await
    }

    pub async fn clear_reply(&self) -> SyncResult<()> {
        self.act(UserAction::ClearReply).await
    }

    /// Sends the current draft, uploading `attachment` first when present.
    pub async fn send(&self, attachment: Option<Attachment>) -> SyncResult<()> {
        self.act(UserAction::Send { attachment }).await
    }

    pub async fn react(&self, message_id: MessageId, emoji: impl Into<String>) -> SyncResult<()> {
        self.act(UserAction::React {
            message_id,
            emoji: emoji.into(),
        })
        .await
    }

    pub async fn add_reaction(
        &self,
        message_id: MessageId,
        emoji: impl Into<String>,
    ) -> SyncResult<()> {
        self.act(UserAction::AddReaction {
            message_id,
            emoji: emoji.into(),
        })
        .await
    }

    pub async fn remove_reaction(&self, message_id: MessageId) -> SyncResult<()> {
        self.act(UserAction::RemoveReaction { message_id }).await
    }

    pub async fn create_chat(
        &self,
        kind: ChatKind,
        name: Option<String>,
        members: Vec<UserId>,
    ) -> SyncResult<()> {
        self.act(UserAction::CreateChat {
            kind,
            name,
            members,
        })
        .await
    }

    /// Logs out: stops the synchronizer and its push channel.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| SyncError::Stopped)
    }
}

/// Starts the synchronizer for a logged-in session. The returned receiver is
/// subscribed before the first effect runs, so it sees every event.
pub fn spawn_synchronizer(
    context: SessionContext,
    settings: &ClientSettings,
    api: Arc<dyn ChatApi>,
    connector: Arc<dyn PushConnector>,
) -> (SyncHandle, broadcast::Receiver<SyncEvent>) {
    let buffer = settings.event_buffer.max(1);
    let (commands, command_rx) = mpsc::channel(buffer);
    let (events, event_rx) = broadcast::channel(buffer);
    let (outbound, outbound_rx) = mpsc::channel(buffer);
    let (signal_tx, signal_rx) = mpsc::channel(buffer);

    tokio::spawn(run_push_channel(
        connector,
        outbound_rx,
        signal_tx,
        Backoff::new(
            settings.reconnect_initial_backoff,
            settings.reconnect_max_backoff,
        ),
    ));

    let actor = SyncActor {
        synchronizer: Synchronizer::new(context.clone(), settings),
        uploads: UploadCoordinator::new(Arc::clone(&api)),
        api,
        completions: commands.downgrade(),
        outbound,
        events: events.clone(),
    };
    tokio::spawn(actor.run(command_rx, signal_rx));

    (
        SyncHandle {
            commands,
            events,
            context,
        },
        event_rx,
    )
}

struct SyncActor {
    synchronizer: Synchronizer,
    api: Arc<dyn ChatApi>,
    uploads: UploadCoordinator,
    /// Weak so the actor stops once every handle is dropped.
    completions: mpsc::WeakSender<Command>,
    outbound: mpsc::Sender<shared::protocol::ClientRequest>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut signals: mpsc::Receiver<PushSignal>,
    ) {
        let user = &self.synchronizer.context().user;
        info!(user_id = user.id.0, username = %user.username, "sync: session started");
        let effects = self.synchronizer.start();
        self.execute(effects);

        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Input(input)) => input,
                    Some(Command::Shutdown) | None => break,
                },
                Some(signal) = signals.recv() => SyncInput::Push(signal),
            };
            let effects = self.synchronizer.handle(input);
            self.execute(effects);
        }
        info!("sync: session stopped");
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Push(request) => match self.outbound.try_send(request) {
                    Ok(()) => {}
                    Err(TrySendError::Full(request)) => {
                        warn!(?request, "sync: push queue full; dropping request");
                        self.emit(SyncEvent::Error(SyncError::Transport(
                            "push queue is full".into(),
                        )));
                    }
                    Err(TrySendError::Closed(_)) => {
                        self.emit(SyncEvent::Error(SyncError::Stopped));
                    }
                },
                Effect::FetchSnapshot {
                    chat_id,
                    generation,
                } => {
                    let api = Arc::clone(&self.api);
                    self.complete(async move {
                        SyncInput::SnapshotLoaded {
                            chat_id,
                            generation,
                            result: api.fetch_messages(chat_id).await,
                        }
                    });
                }
                Effect::FetchChats { generation } => {
                    let api = Arc::clone(&self.api);
                    let user_id = self.synchronizer.context().user.id;
                    self.complete(async move {
                        SyncInput::ChatsLoaded {
                            generation,
                            result: api.list_chats(user_id).await,
                        }
                    });
                }
                Effect::MarkRead {
                    chat_id,
                    generation,
                } => {
                    let api = Arc::clone(&self.api);
                    let user_id = self.synchronizer.context().user.id;
                    self.complete(async move {
                        SyncInput::MarkReadFinished {
                            chat_id,
                            generation,
                            result: api.mark_read(chat_id, user_id).await,
                        }
                    });
                }
                Effect::Upload {
                    request_id,
                    attachment,
                } => {
                    let uploads = self.uploads.clone();
                    self.complete(async move {
                        SyncInput::UploadFinished {
                            request_id,
                            result: uploads.upload(attachment).await,
                        }
                    });
                }
                Effect::CreateChat(request) => {
                    let api = Arc::clone(&self.api);
                    self.complete(async move {
                        SyncInput::ChatCreated {
                            result: api.create_chat(&request).await,
                        }
                    });
                }
                Effect::ScheduleTypingExpiry {
                    chat_id,
                    token,
                    after,
                } => {
                    self.complete(async move {
                        tokio::time::sleep(after).await;
                        SyncInput::TypingExpired { chat_id, token }
                    });
                }
                Effect::Emit(event) => self.emit(event),
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Runs `task` in the background and delivers its result as an input.
    fn complete<F>(&self, task: F)
    where
        F: Future<Output = SyncInput> + Send + 'static,
    {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let input = task.await;
            let Some(commands) = completions.upgrade() else {
                debug!("sync: session gone; dropping completion");
                return;
            };
            let _ = commands.send(Command::Input(input)).await;
        });
    }
}
