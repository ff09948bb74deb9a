use std::time::Duration;

use chrono::NaiveDateTime;
use shared::{
    domain::{ChatId, ChatKind, LinkPreview, Message, MessageId, MessageKind, ReplyRef, UserId},
    protocol::{
        ChatSummary, ClientRequest, CreateChatRequest, CreateChatResponse, MessagePayload,
        ServerEvent,
    },
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::ClientSettings,
    error::{SyncError, SyncResult},
    message_store::{Ingest, MessageStore},
    push::PushSignal,
    reactions::{summarize, ReactionAggregator, ReactionOutcome, ReactionSummary},
    read_tracker::ReadTracker,
    reply::{ComposeState, OutgoingDraft},
    session::SessionContext,
    typing::TypingTracker,
    upload::{Attachment, UploadedAttachment},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Active,
    Leaving,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub id: MessageId,
    pub author_id: UserId,
    pub author: String,
    pub is_own: bool,
    pub kind: MessageKind,
    pub content: Option<String>,
    /// Server-relative upload path, as accepted by `ChatApi::download_attachment`.
    pub attachment_path: Option<String>,
    pub attachment_url: Option<String>,
    pub link_preview: Option<LinkPreview>,
    pub created_at: NaiveDateTime,
    pub reply: Option<ReplyRef>,
    pub reactions: Vec<ReactionSummary>,
    reply_target: ReplyRef,
}

impl MessageView {
    fn build(message: &Message, context: &SessionContext) -> Self {
        Self {
            id: message.id,
            author_id: message.author.id,
            author: message.author.username.clone(),
            is_own: message.author.id == context.user.id,
            kind: message.kind,
            content: message.content.clone(),
            attachment_path: message.attachment_ref.clone(),
            attachment_url: message
                .attachment_ref
                .as_deref()
                .map(|path| context.attachment_url(path)),
            link_preview: message.link_preview.clone(),
            created_at: message.created_at,
            reply: message.reply_ref.clone(),
            reactions: summarize(&message.reactions, context.user.id),
            reply_target: message.reply_ref(),
        }
    }

    pub fn reply_target(&self) -> ReplyRef {
        self.reply_target.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub id: ChatId,
    pub display_name: String,
    pub kind_label: &'static str,
    pub members: Vec<String>,
    pub unread_count: u32,
    pub is_active: bool,
}

impl ChatView {
    fn build(chat: &ChatSummary, active: Option<ChatId>) -> Self {
        Self {
            id: chat.id,
            display_name: chat.display_name(),
            kind_label: chat.kind.label(),
            members: chat.members.clone(),
            unread_count: chat.unread_count,
            is_active: active == Some(chat.id),
        }
    }
}

#[derive(Debug, Clone)]
pub enum UserAction {
    SelectChat(ChatId),
    LeaveChat,
    RefreshChats,
    Resync,
    EditDraft(String),
    BeginReply(ReplyRef),
    ClearReply,
    Send { attachment: Option<Attachment> },
    /// Quick-reaction click: adds the emoji, or removes the viewer's
    /// reaction when they already hold it.
    React { message_id: MessageId, emoji: String },
    AddReaction { message_id: MessageId, emoji: String },
    RemoveReaction { message_id: MessageId },
    CreateChat {
        kind: ChatKind,
        name: Option<String>,
        members: Vec<UserId>,
    },
}

#[derive(Debug)]
pub enum SyncInput {
    User(UserAction),
    Push(PushSignal),
    SnapshotLoaded {
        chat_id: ChatId,
        generation: u64,
        result: SyncResult<Vec<MessagePayload>>,
    },
    ChatsLoaded {
        generation: u64,
        result: SyncResult<Vec<ChatSummary>>,
    },
    MarkReadFinished {
        chat_id: ChatId,
        generation: u64,
        result: SyncResult<()>,
    },
    UploadFinished {
        request_id: u64,
        result: SyncResult<UploadedAttachment>,
    },
    ChatCreated {
        result: SyncResult<CreateChatResponse>,
    },
    TypingExpired {
        chat_id: ChatId,
        token: u64,
    },
}

/// Work the synchronizer asks its driver to perform.
#[derive(Debug, Clone)]
pub enum Effect {
    Push(ClientRequest),
    FetchSnapshot { chat_id: ChatId, generation: u64 },
    FetchChats { generation: u64 },
    MarkRead { chat_id: ChatId, generation: u64 },
    Upload { request_id: u64, attachment: Attachment },
    CreateChat(CreateChatRequest),
    ScheduleTypingExpiry { chat_id: ChatId, token: u64, after: Duration },
    Emit(SyncEvent),
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    PhaseChanged(SessionPhase),
    ConnectionChanged(ConnectionState),
    ChatsUpdated(Vec<ChatView>),
    MessagesUpdated {
        chat_id: ChatId,
        messages: Vec<MessageView>,
    },
    TypingChanged {
        chat_id: ChatId,
        username: Option<String>,
    },
    ComposeChanged {
        draft: String,
        reply: Option<ReplyRef>,
    },
    ChatCreated {
        chat_id: ChatId,
    },
    Error(SyncError),
}

#[derive(Debug)]
struct PendingSend {
    request_id: u64,
    chat_id: ChatId,
    draft: OutgoingDraft,
}

pub struct Synchronizer {
    context: SessionContext,
    phase: SessionPhase,
    connection: ConnectionState,
    has_connected: bool,
    active_chat: Option<ChatId>,
    /// Bumped on every chat selection; tags mark-read calls.
    selection: u64,
    /// Bumped on every snapshot request; only the latest may be applied.
    snapshot_generation: u64,
    mark_read_pending: bool,
    store: MessageStore,
    aggregator: ReactionAggregator,
    reaction_resync: bool,
    compose: ComposeState,
    typing: TypingTracker,
    reads: ReadTracker,
    pending_send: Option<PendingSend>,
    next_request_id: u64,
}

impl Synchronizer {
    pub fn new(context: SessionContext, settings: &ClientSettings) -> Self {
        Self {
            context,
            phase: SessionPhase::Idle,
            connection: ConnectionState::Connecting,
            has_connected: false,
            active_chat: None,
            selection: 0,
            snapshot_generation: 0,
            mark_read_pending: false,
            store: MessageStore::new(),
            aggregator: ReactionAggregator::new(settings.reaction_policy),
            reaction_resync: settings.reaction_resync,
            compose: ComposeState::default(),
            typing: TypingTracker::new(settings.typing_ttl),
            reads: ReadTracker::new(),
            pending_send: None,
            next_request_id: 0,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn active_chat(&self) -> Option<ChatId> {
        self.active_chat
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn compose(&self) -> &ComposeState {
        &self.compose
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn reads(&self) -> &ReadTracker {
        &self.reads
    }

    pub fn message_views(&self) -> Vec<MessageView> {
        self.store
            .messages()
            .map(|message| MessageView::build(message, &self.context))
            .collect()
    }

    pub fn chat_views(&self) -> Vec<ChatView> {
        self.reads
            .chats()
            .iter()
            .map(|chat| ChatView::build(chat, self.active_chat))
            .collect()
    }

    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::Emit(SyncEvent::ConnectionChanged(self.connection))];
        self.request_chats(&mut effects);
        effects
    }

    pub fn handle(&mut self, input: SyncInput) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            SyncInput::User(action) => self.on_user_action(action, &mut effects),
            SyncInput::Push(signal) => self.on_push_signal(signal, &mut effects),
            SyncInput::SnapshotLoaded {
                chat_id,
                generation,
                result,
            } => self.on_snapshot(chat_id, generation, result, &mut effects),
            SyncInput::ChatsLoaded { generation, result } => {
                self.on_chats(generation, result, &mut effects)
            }
            SyncInput::MarkReadFinished {
                chat_id,
                generation,
                result,
            } => self.on_mark_read(chat_id, generation, result, &mut effects),
            SyncInput::UploadFinished { request_id, result } => {
                self.on_upload(request_id, result, &mut effects)
            }
            SyncInput::ChatCreated { result } => self.on_chat_created(result, &mut effects),
            SyncInput::TypingExpired { chat_id, token } => {
                if self.typing.expire(chat_id, token) {
                    effects.push(Effect::Emit(SyncEvent::TypingChanged {
                        chat_id,
                        username: None,
                    }));
                }
            }
        }
        effects
    }

    fn on_user_action(&mut self, action: UserAction, effects: &mut Vec<Effect>) {
        match action {
            UserAction::SelectChat(chat_id) => self.select_chat(chat_id, effects),
            UserAction::LeaveChat => {
                if self.active_chat.is_some() {
                    self.leave_active_chat(effects);
                    self.emit_chats(effects);
                }
            }
            UserAction::RefreshChats => self.request_chats(effects),
            UserAction::Resync => match self.active_chat {
                Some(_) => self.request_snapshot(effects),
                None => self.emit_error(SyncError::NoActiveChat, effects),
            },
            UserAction::EditDraft(text) => {
                self.compose.set_draft(text);
                if let Some(chat_id) = self.active_chat {
                    // Typing notifications are best effort.
                    if self.connection == ConnectionState::Connected {
                        effects.push(Effect::Push(ClientRequest::Typing {
                            username: self.context.user.username.clone(),
                            chat_id,
                        }));
                    }
                }
            }
            UserAction::BeginReply(reply) => {
                if self.active_chat.is_none() {
                    return self.emit_error(SyncError::NoActiveChat, effects);
                }
                self.compose.begin_reply(reply);
                self.emit_compose(effects);
            }
            UserAction::ClearReply => {
                self.compose.clear_reply();
                self.emit_compose(effects);
            }
            UserAction::Send { attachment } => self.send(attachment, effects),
            UserAction::React { message_id, emoji } => {
                let Some(chat_id) = self.active_chat else {
                    return self.emit_error(SyncError::NoActiveChat, effects);
                };
                match self.aggregator.toggle_request(
                    &self.store,
                    chat_id,
                    message_id,
                    &emoji,
                    self.context.user.id,
                ) {
                    Some(request) => self.push_or_fail(request, "reaction", effects),
                    None => self.emit_error(
                        SyncError::Validation(format!("message {message_id} is not loaded")),
                        effects,
                    ),
                }
            }
            UserAction::AddReaction { message_id, emoji } => {
                let Some(chat_id) = self.active_chat else {
                    return self.emit_error(SyncError::NoActiveChat, effects);
                };
                let request = ClientRequest::AddReaction {
                    message_id,
                    user_id: self.context.user.id,
                    emoji,
                    chat_id,
                };
                self.push_or_fail(request, "reaction", effects);
            }
            UserAction::RemoveReaction { message_id } => {
                let Some(chat_id) = self.active_chat else {
                    return self.emit_error(SyncError::NoActiveChat, effects);
                };
                let request = ClientRequest::RemoveReaction {
                    message_id,
                    user_id: self.context.user.id,
                    chat_id,
                };
                self.push_or_fail(request, "reaction", effects);
            }
            UserAction::CreateChat {
                kind,
                name,
                members,
            } => self.create_chat(kind, name, members, effects),
        }
    }

    fn select_chat(&mut self, chat_id: ChatId, effects: &mut Vec<Effect>) {
        if self.active_chat.is_some() {
            self.leave_active_chat(effects);
        }
        info!(chat_id = chat_id.0, "sync: selecting chat");

        self.active_chat = Some(chat_id);
        self.selection += 1;
        self.mark_read_pending = true;
        self.store.open(chat_id);
        self.typing.set_active_chat(Some(chat_id));
        if self.connection == ConnectionState::Connected {
            effects.push(Effect::Push(ClientRequest::join(
                self.context.user.username.clone(),
                chat_id,
            )));
        }
        self.request_snapshot(effects);

        effects.push(Effect::Emit(SyncEvent::MessagesUpdated {
            chat_id,
            messages: Vec::new(),
        }));
        self.emit_compose(effects);
        self.emit_chats(effects);
    }

    /// Tears down per-chat state. Events for the old room that were already
    /// in flight are filtered by chat id.
    fn leave_active_chat(&mut self, effects: &mut Vec<Effect>) {
        self.set_phase(SessionPhase::Leaving, effects);
        if let Some(pending) = self.pending_send.take() {
            debug!(
                chat_id = pending.chat_id.0,
                request_id = pending.request_id,
                "sync: dropping send waiting on upload"
            );
        }
        if let Some(previous) = self.active_chat.take() {
            if self.connection == ConnectionState::Connected {
                effects.push(Effect::Push(ClientRequest::leave(
                    self.context.user.username.clone(),
                    previous,
                )));
            }
            if self.typing.current().is_some() {
                effects.push(Effect::Emit(SyncEvent::TypingChanged {
                    chat_id: previous,
                    username: None,
                }));
            }
        }
        self.mark_read_pending = false;
        self.store.close();
        self.compose.clear();
        self.typing.set_active_chat(None);
        self.set_phase(SessionPhase::Idle, effects);
    }

    fn request_snapshot(&mut self, effects: &mut Vec<Effect>) {
        let Some(chat_id) = self.active_chat else {
            return;
        };
        self.snapshot_generation += 1;
        effects.push(Effect::FetchSnapshot {
            chat_id,
            generation: self.snapshot_generation,
        });
        if !self.store.is_loaded() {
            self.set_phase(SessionPhase::Loading, effects);
        }
    }

    fn request_chats(&mut self, effects: &mut Vec<Effect>) {
        let generation = self.reads.begin_list_fetch();
        effects.push(Effect::FetchChats { generation });
    }

    fn on_snapshot(
        &mut self,
        chat_id: ChatId,
        generation: u64,
        result: SyncResult<Vec<MessagePayload>>,
        effects: &mut Vec<Effect>,
    ) {
        if self.active_chat != Some(chat_id) || generation != self.snapshot_generation {
            debug!(
                chat_id = chat_id.0,
                generation,
                current = self.snapshot_generation,
                "sync: discarding stale snapshot"
            );
            return;
        }

        match result {
            Ok(payloads) => {
                let messages = payloads
                    .into_iter()
                    .map(|payload| payload.into_message(chat_id))
                    .collect();
                let retained = self.store.replace_with_snapshot(chat_id, messages);
                info!(
                    chat_id = chat_id.0,
                    messages = self.store.len(),
                    retained_live = retained,
                    "sync: snapshot applied"
                );
                self.settle_phase(effects);
                self.emit_messages(effects);
                if self.mark_read_pending {
                    self.mark_read_pending = false;
                    effects.push(Effect::MarkRead {
                        chat_id,
                        generation: self.selection,
                    });
                }
            }
            Err(err) => {
                warn!(chat_id = chat_id.0, "sync: snapshot failed: {err}");
                self.settle_phase(effects);
                self.emit_error(err, effects);
            }
        }
    }

    fn on_chats(
        &mut self,
        generation: u64,
        result: SyncResult<Vec<ChatSummary>>,
        effects: &mut Vec<Effect>,
    ) {
        match result {
            Ok(chats) => {
                if self.reads.apply_chat_list(generation, chats) {
                    self.emit_chats(effects);
                }
            }
            Err(err) => {
                warn!(generation, "sync: chat list failed: {err}");
                self.emit_error(err, effects);
            }
        }
    }

    fn on_mark_read(
        &mut self,
        chat_id: ChatId,
        generation: u64,
        result: SyncResult<()>,
        effects: &mut Vec<Effect>,
    ) {
        if generation != self.selection || self.active_chat != Some(chat_id) {
            debug!(
                chat_id = chat_id.0,
                generation,
                ok = result.is_ok(),
                "sync: ignoring stale mark read"
            );
            return;
        }
        match result {
            Ok(()) => {
                info!(chat_id = chat_id.0, "sync: chat marked read");
                self.reads.mark_read_succeeded(chat_id);
                self.emit_chats(effects);
                self.request_chats(effects);
            }
            Err(err) => {
                warn!(chat_id = chat_id.0, "sync: mark read failed: {err}");
                self.emit_error(err, effects);
            }
        }
    }

    fn on_push_signal(&mut self, signal: PushSignal, effects: &mut Vec<Effect>) {
        match signal {
            PushSignal::Connected => {
                let reconnect = self.has_connected;
                self.has_connected = true;
                self.set_connection(ConnectionState::Connected, effects);
                if let Some(chat_id) = self.active_chat {
                    info!(chat_id = chat_id.0, reconnect, "sync: resubscribing active chat");
                    effects.push(Effect::Push(ClientRequest::join(
                        self.context.user.username.clone(),
                        chat_id,
                    )));
                    self.request_snapshot(effects);
                }
                if reconnect {
                    self.request_chats(effects);
                }
            }
            PushSignal::Disconnected { reason } => {
                warn!(%reason, "sync: push channel lost");
                self.set_connection(ConnectionState::Reconnecting, effects);
                if self.active_chat.is_some() {
                    self.set_phase(SessionPhase::Reconnecting, effects);
                }
            }
            PushSignal::Event(event) => self.on_server_event(event, effects),
        }
    }

    fn on_server_event(&mut self, event: ServerEvent, effects: &mut Vec<Effect>) {
        let Some(active) = self.active_chat else {
            debug!(event = event.name(), "sync: no active chat; ignoring event");
            if matches!(event, ServerEvent::ChatUpdated { .. }) {
                self.request_chats(effects);
            }
            return;
        };

        match event {
            ServerEvent::NewMessage(payload) => {
                let chat_id = payload.chat_id.unwrap_or(active);
                if chat_id != active {
                    debug!(chat_id = chat_id.0, "sync: message for inactive chat");
                    return;
                }
                let message_id = payload.id;
                match self.store.append_live(payload.into_message(chat_id)) {
                    Ingest::Inserted => self.emit_messages(effects),
                    Ingest::Duplicate => {
                        debug!(message_id = message_id.0, "sync: duplicate message ignored")
                    }
                    Ingest::Foreign => {
                        debug!(message_id = message_id.0, "sync: foreign message ignored")
                    }
                }
            }
            ServerEvent::UserTyping { chat_id, username } => {
                if username == self.context.user.username {
                    return;
                }
                if let Some(renewal) =
                    self.typing
                        .on_remote_typing(chat_id, &username, Instant::now())
                {
                    effects.push(Effect::ScheduleTypingExpiry {
                        chat_id: renewal.chat_id,
                        token: renewal.token,
                        after: renewal.after,
                    });
                    effects.push(Effect::Emit(SyncEvent::TypingChanged {
                        chat_id,
                        username: Some(username),
                    }));
                }
            }
            ServerEvent::ReactionAdded {
                message_id,
                emoji,
                username,
                user_id,
            } => {
                let user = shared::domain::User::new(user_id, username);
                let outcome = self
                    .aggregator
                    .apply_add(&mut self.store, message_id, &emoji, &user);
                self.after_reaction(message_id, outcome, effects);
            }
            ServerEvent::ReactionRemoved {
                message_id,
                user_id,
            } => {
                let outcome = self
                    .aggregator
                    .apply_remove(&mut self.store, message_id, user_id);
                self.after_reaction(message_id, outcome, effects);
            }
            ServerEvent::ChatUpdated { chat_id } => {
                debug!(chat_id = chat_id.map(|c| c.0), "sync: chat updated");
                self.request_chats(effects);
            }
            ServerEvent::UserJoined { username } | ServerEvent::UserLeft { username } => {
                debug!(%username, "sync: room membership changed");
            }
        }
    }

    fn after_reaction(
        &mut self,
        message_id: MessageId,
        outcome: ReactionOutcome,
        effects: &mut Vec<Effect>,
    ) {
        match outcome {
            ReactionOutcome::UnknownMessage => {
                debug!(message_id = message_id.0, "sync: reaction for unknown message");
                return;
            }
            ReactionOutcome::Applied => self.emit_messages(effects),
            ReactionOutcome::Unchanged => {}
        }
        if self.reaction_resync {
            self.request_snapshot(effects);
        }
    }

    fn send(&mut self, attachment: Option<Attachment>, effects: &mut Vec<Effect>) {
        let Some(chat_id) = self.active_chat else {
            return self.emit_error(SyncError::NoActiveChat, effects);
        };
        if self.pending_send.is_some() {
            return self.emit_error(
                SyncError::Validation("an upload is already in progress".into()),
                effects,
            );
        }
        let Some(draft) = self.compose.outgoing(attachment.is_some()) else {
            debug!(chat_id = chat_id.0, "sync: nothing to send");
            return;
        };

        match attachment {
            Some(attachment) => {
                self.next_request_id += 1;
                let request_id = self.next_request_id;
                self.pending_send = Some(PendingSend {
                    request_id,
                    chat_id,
                    draft,
                });
                effects.push(Effect::Upload {
                    request_id,
                    attachment,
                });
            }
            None => self.issue_send(chat_id, draft, MessageKind::Text, None, effects),
        }
    }

    fn issue_send(
        &mut self,
        chat_id: ChatId,
        draft: OutgoingDraft,
        kind: MessageKind,
        file_path: Option<String>,
        effects: &mut Vec<Effect>,
    ) {
        if self.connection != ConnectionState::Connected {
            return self.emit_error(
                SyncError::Transport("push channel is disconnected; message not sent".into()),
                effects,
            );
        }
        self.compose.send_issued(&draft);
        let content = (!draft.content.is_empty()).then_some(draft.content);
        effects.push(Effect::Push(ClientRequest::SendMessage {
            chat_id,
            user_id: self.context.user.id,
            content,
            kind,
            file_path,
            reply_to_id: draft.reply_to_id,
        }));
        self.emit_compose(effects);
    }

    fn on_upload(
        &mut self,
        request_id: u64,
        result: SyncResult<UploadedAttachment>,
        effects: &mut Vec<Effect>,
    ) {
        let pending = match self.pending_send.take() {
            Some(pending) if pending.request_id == request_id => pending,
            other => {
                self.pending_send = other;
                debug!(request_id, "sync: discarding stale upload result");
                return;
            }
        };
        if self.active_chat != Some(pending.chat_id) {
            debug!(request_id, "sync: upload finished after leaving chat");
            return;
        }

        match result {
            Ok(uploaded) => self.issue_send(
                pending.chat_id,
                pending.draft,
                uploaded.kind,
                Some(uploaded.file_path),
                effects,
            ),
            Err(err) => {
                warn!(request_id, "sync: upload failed: {err}");
                self.emit_error(err.into_storage(), effects);
            }
        }
    }

    fn create_chat(
        &mut self,
        kind: ChatKind,
        name: Option<String>,
        members: Vec<UserId>,
        effects: &mut Vec<Effect>,
    ) {
        let own_id = self.context.user.id;
        let mut others: Vec<UserId> = Vec::with_capacity(members.len() + 1);
        for member in members {
            if member != own_id && !others.contains(&member) {
                others.push(member);
            }
        }
        if others.is_empty() {
            return self.emit_error(
                SyncError::Validation("select at least one other user".into()),
                effects,
            );
        }
        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if kind == ChatKind::Group && name.is_none() {
            return self.emit_error(
                SyncError::Validation("group chats need a name".into()),
                effects,
            );
        }
        others.push(own_id);
        effects.push(Effect::CreateChat(CreateChatRequest {
            kind,
            name,
            members: others,
        }));
    }

    fn on_chat_created(
        &mut self,
        result: SyncResult<CreateChatResponse>,
        effects: &mut Vec<Effect>,
    ) {
        match result {
            Ok(response) if response.already_exists() => {
                info!(chat_id = response.chat_id.0, "sync: chat already exists");
                self.emit_error(
                    SyncError::Conflict {
                        chat_id: response.chat_id,
                    },
                    effects,
                );
                self.request_chats(effects);
            }
            Ok(response) => {
                info!(chat_id = response.chat_id.0, "sync: chat created");
                effects.push(Effect::Emit(SyncEvent::ChatCreated {
                    chat_id: response.chat_id,
                }));
                self.request_chats(effects);
            }
            Err(err) => {
                warn!("sync: create chat failed: {err}");
                self.emit_error(err, effects);
            }
        }
    }

    fn push_or_fail(&mut self, request: ClientRequest, what: &str, effects: &mut Vec<Effect>) {
        if self.connection == ConnectionState::Connected {
            effects.push(Effect::Push(request));
        } else {
            self.emit_error(
                SyncError::Transport(format!("push channel is disconnected; {what} not sent")),
                effects,
            );
        }
    }

    /// Leaves `Loading`/`Reconnecting` once a snapshot round trip finished.
    fn settle_phase(&mut self, effects: &mut Vec<Effect>) {
        let phase = if self.connection == ConnectionState::Connected {
            SessionPhase::Active
        } else {
            SessionPhase::Reconnecting
        };
        self.set_phase(phase, effects);
    }

    fn set_phase(&mut self, phase: SessionPhase, effects: &mut Vec<Effect>) {
        if self.phase == phase {
            return;
        }
        info!(
            from = ?self.phase,
            to = ?phase,
            chat_id = self.active_chat.map(|c| c.0),
            "sync: phase changed"
        );
        self.phase = phase;
        effects.push(Effect::Emit(SyncEvent::PhaseChanged(phase)));
    }

    fn set_connection(&mut self, state: ConnectionState, effects: &mut Vec<Effect>) {
        if self.connection == state {
            return;
        }
        self.connection = state;
        effects.push(Effect::Emit(SyncEvent::ConnectionChanged(state)));
    }

    fn emit_messages(&self, effects: &mut Vec<Effect>) {
        if let Some(chat_id) = self.active_chat {
            effects.push(Effect::Emit(SyncEvent::MessagesUpdated {
                chat_id,
                messages: self.message_views(),
            }));
        }
    }

    fn emit_chats(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Emit(SyncEvent::ChatsUpdated(self.chat_views())));
    }

    fn emit_compose(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Emit(SyncEvent::ComposeChanged {
            draft: self.compose.draft().to_string(),
            reply: self.compose.pending_reply().cloned(),
        }));
    }

    fn emit_error(&self, err: SyncError, effects: &mut Vec<Effect>) {
        effects.push(Effect::Emit(SyncEvent::Error(err)));
    }
}

#[cfg(test)]
#[path = "tests/synchronizer_tests.rs"]
mod tests;
