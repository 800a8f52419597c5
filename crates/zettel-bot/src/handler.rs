//! Single-actor event handler.
//!
//! [`Bot`] owns the session and handles one event at a time; each event is
//! awaited to completion before the next one is read, so session state never
//! interleaves.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, instrument, warn};

use zettel_core::{
    ChatTransport, Error, EventBody, GenerationBackend, IncomingEvent, MessageId, Mode,
    OutgoingMessage, RawNote, Result,
};
use zettel_pipeline::{
    clarifying_question, ProcessReport, Processor, Session, IMAGE_CONTEXT_HINT,
    IMAGE_CONTEXT_QUESTION,
};

use crate::telegram::escape_markdown;

/// Chat bot driving the intake pipeline.
pub struct Bot {
    transport: Arc<dyn ChatTransport>,
    backend: Arc<dyn GenerationBackend>,
    processor: Processor,
    session: Session,
    allowed_user_id: i64,
    /// Every question id sent since startup, answered or not.
    asked: HashSet<MessageId>,
}

impl Bot {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        backend: Arc<dyn GenerationBackend>,
        processor: Processor,
        allowed_user_id: i64,
    ) -> Self {
        Self {
            transport,
            backend,
            processor,
            session: Session::new(),
            allowed_user_id,
            asked: HashSet::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handle one event. Failures to reply are logged, never propagated.
    #[instrument(skip_all, fields(
        subsystem = "bot",
        component = "handler",
        message_id = event.message_id,
        session_id = %self.session.id(),
    ))]
    pub async fn handle(&mut self, event: IncomingEvent) {
        if event.sender_id != self.allowed_user_id {
            debug!(sender_id = event.sender_id, "Ignoring unauthorized sender");
            return;
        }
        if let Err(e) = self.dispatch(event).await {
            error!(error = %e, error_kind = e.kind(), "Event handling failed");
        }
    }

    async fn dispatch(&mut self, event: IncomingEvent) -> Result<()> {
        let chat_id = event.chat_id;
        let message_id = event.message_id;
        match event.body {
            EventBody::Command { name, .. } => self.command(chat_id, &name).await,
            EventBody::Text(text) => match event.reply_to_message_id {
                Some(key) if self.is_question(key) => {
                    self.answer(chat_id, message_id, key, &text).await
                }
                _ => self.text_note(chat_id, message_id, &text).await,
            },
            EventBody::Image {
                data,
                media_type,
                caption,
            } => {
                let note = RawNote::image(data, media_type, caption, Local::now());
                self.image_note(chat_id, message_id, note).await
            }
        }
    }

    /// Whether `key` is a question this bot sent. Answered and cleared
    /// questions still count, so late replies get a warning instead of
    /// turning into new notes.
    fn is_question(&self, key: MessageId) -> bool {
        self.session.is_pending(key) || self.asked.contains(&key)
    }

    async fn reply(&self, chat_id: i64, message_id: MessageId, text: String) -> Result<MessageId> {
        self.transport
            .send(OutgoingMessage::plain(chat_id, text).in_reply_to(message_id))
            .await
    }

    async fn reply_markdown(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: String,
    ) -> Result<MessageId> {
        self.transport
            .send(OutgoingMessage::markdown(chat_id, text).in_reply_to(message_id))
            .await
    }

    async fn say(&self, chat_id: i64, text: impl Into<String>) -> Result<()> {
        self.transport.send(OutgoingMessage::plain(chat_id, text)).await?;
        Ok(())
    }

    async fn say_markdown(&self, chat_id: i64, text: impl Into<String>) -> Result<()> {
        self.transport
            .send(OutgoingMessage::markdown(chat_id, text))
            .await?;
        Ok(())
    }

    async fn answer(
        &mut self,
        chat_id: i64,
        message_id: MessageId,
        key: MessageId,
        text: &str,
    ) -> Result<()> {
        let reply = if self.session.answer_clarification(key, text) {
            "✅ Got it! Context added to the note.\nSend more notes or /process when ready."
        } else {
            "⚠️ Couldn't find the original note. Please re-send it."
        };
        self.reply(chat_id, message_id, reply.to_string()).await?;
        Ok(())
    }

    async fn text_note(&mut self, chat_id: i64, message_id: MessageId, text: &str) -> Result<()> {
        let index = self.session.enqueue(RawNote::text(text, Local::now()));
        let question = match self.session.note(index) {
            Some(note) => clarifying_question(self.backend.as_ref(), note).await,
            None => None,
        };

        match question {
            Some(question) => {
                let sent = self
                    .reply_markdown(
                        chat_id,
                        message_id,
                        format!(
                            "🤔 Quick question before I queue this:\n\n*{}*\n\n_Use Telegram's Reply feature to answer me._",
                            escape_markdown(&question)
                        ),
                    )
                    .await?;
                self.asked.insert(sent);
                self.session.request_clarification(index, sent)?;
            }
            None => {
                self.reply(
                    chat_id,
                    message_id,
                    format!(
                        "{} ✅ Queued ({} total). Send more or /process when ready.",
                        self.session.mode().label(),
                        self.session.len()
                    ),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn image_note(&mut self, chat_id: i64, message_id: MessageId, note: RawNote) -> Result<()> {
        let question = clarifying_question(self.backend.as_ref(), &note).await;
        let index = self.session.enqueue(note);

        // Images only ever get the fixed context question.
        match question {
            Some(_) => {
                let body = format!(
                    "🖼️ Image received! Quick question:\n\n*{}*\n_({})_\n\n_Use Telegram's Reply feature to answer._",
                    IMAGE_CONTEXT_QUESTION, IMAGE_CONTEXT_HINT
                );
                let sent = self.reply_markdown(chat_id, message_id, body).await?;
                self.asked.insert(sent);
                self.session.request_clarification(index, sent)?;
            }
            None => {
                self.reply(
                    chat_id,
                    message_id,
                    format!(
                        "{} 🖼️ Image queued ({} total). Send more or /process when ready.",
                        self.session.mode().label(),
                        self.session.len()
                    ),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn command(&mut self, chat_id: i64, name: &str) -> Result<()> {
        debug!(command = name, "Command received");
        match name {
            "start" | "help" => self.say_markdown(chat_id, self.help_text()).await,
            "personal" => {
                self.session.set_mode(Mode::Personal);
                self.say_markdown(
                    chat_id,
                    "🏠 Switched to *Personal mode*.\nNotes will go into `personal/`.\nSend /work to switch back.",
                )
                .await
            }
            "work" => {
                self.session.set_mode(Mode::Work);
                self.say_markdown(chat_id, "💼 Switched to *Work mode*.").await
            }
            "mode" => {
                self.say(chat_id, format!("Current mode: {}", self.session.mode().label()))
                    .await
            }
            "queue" => self.queue_status(chat_id).await,
            "clear" => {
                self.session.clear();
                self.say(chat_id, "🗑️ Queue and pending questions cleared.")
                    .await
            }
            "process" => self.process(chat_id).await,
            "save" => self.save(chat_id).await,
            _ => {
                self.say(chat_id, "❓ Unknown command. Send /help for the list.")
                    .await
            }
        }
    }

    fn help_text(&self) -> String {
        format!(
            "👋 *Zettelkasten Bot ready!*\n\n\
             Send me your thoughts anytime, text or images.\n\
             If I need more context, I'll ask you a question.\n\
             Just use Telegram's *Reply* feature to answer me.\n\n\
             Start a note with @ for a person, ~ for a meeting, or + for a project \
             to skip the question and file it directly.\n\n\
             *Commands:*\n\
             /process - structure & push all queued notes\n\
             /save - log queued notes to today's journal without structuring\n\
             /queue - see how many notes are waiting\n\
             /clear - clear the queue\n\
             /personal - switch to 🏠 Personal mode\n\
             /work - switch to 💼 Work mode (default)\n\
             /mode - see current mode\n\
             /help - show this message\n\n\
             Current mode: {}",
            self.session.mode().label()
        )
    }

    async fn queue_status(&self, chat_id: i64) -> Result<()> {
        let status = self.session.status();
        if status.queued == 0 {
            return self.say(chat_id, "📭 Queue is empty.").await;
        }
        self.say_markdown(
            chat_id,
            format!(
                "📬 *{} note(s)* in queue\n✅ {} enriched with clarification\n⏳ {} awaiting your reply\nMode: {}",
                status.queued,
                status.clarified,
                status.awaiting_reply,
                self.session.mode().label()
            ),
        )
        .await
    }

    async fn process(&mut self, chat_id: i64) -> Result<()> {
        if self.session.is_empty() {
            return self
                .say(chat_id, "📭 Nothing in the queue. Send some notes first!")
                .await;
        }
        let pending = self.session.pending_count();
        if pending > 0 {
            self.say_markdown(
                chat_id,
                format!(
                    "⚠️ You have *{} unanswered question(s)* from me.\nI'll process what I have, but those notes will be less detailed.\nProcessing now...",
                    pending
                ),
            )
            .await?;
        }
        self.say_markdown(
            chat_id,
            format!(
                "⚙️ Processing *{} note(s)* in {} mode...",
                self.session.len(),
                self.session.mode().label()
            ),
        )
        .await?;

        match self.processor.process(&mut self.session).await {
            Ok(report) => {
                info!(
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    "Run reported to user"
                );
                self.say_markdown(chat_id, render_report(&report)).await
            }
            Err(Error::NoStructuredOutput) => {
                self.say(
                    chat_id,
                    "⚠️ No structured notes came back. Your queue is intact, try /process again.",
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, error_kind = e.kind(), "Processing run failed");
                self.say(
                    chat_id,
                    format!("❌ Error: {}\nYour queue is intact.", e),
                )
                .await
            }
        }
    }

    async fn save(&mut self, chat_id: i64) -> Result<()> {
        if self.session.is_empty() {
            return self
                .say(chat_id, "📭 Nothing in the queue. Send some notes first!")
                .await;
        }
        match self.processor.save(&mut self.session).await {
            Ok(report) => {
                self.say_markdown(
                    chat_id,
                    format!(
                        "📓 Saved {} note(s) to `{}` without structuring. Queue cleared.",
                        report.note_count, report.journal_path
                    ),
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, error_kind = e.kind(), "Save failed");
                self.say(chat_id, format!("❌ Error: {}\nYour queue is intact.", e))
                    .await
            }
        }
    }
}

/// User-facing summary of a processing run.
pub fn render_report(report: &ProcessReport) -> String {
    let mut out = format!(
        "✅ *Done!* {} note(s) pushed to Obsidian:\n\n",
        report.succeeded()
    );
    let lines: Vec<String> = report
        .pushed
        .iter()
        .map(|p| {
            format!(
                "{} `{}`{}",
                p.category.emoji(),
                p.path,
                if p.merged { " (updated)" } else { "" }
            )
        })
        .collect();
    out.push_str(&lines.join("\n"));

    let conflicts: Vec<String> = report
        .conflicts()
        .filter_map(|f| match &f.error {
            Error::Conflict { path } => Some(format!("`{}`", path)),
            _ => None,
        })
        .collect();
    if !conflicts.is_empty() {
        out.push_str(&format!(
            "\n\n🔁 Changed elsewhere while I was writing, left untouched: {}",
            conflicts.join(", ")
        ));
    }

    let failed: Vec<String> = report
        .failures
        .iter()
        .filter(|f| !f.error.is_conflict())
        .map(|f| escape_markdown(&f.title))
        .collect();
    if !failed.is_empty() {
        out.push_str(&format!("\n\n⚠️ Failed to push: {}", failed.join(", ")));
    }

    match &report.journal {
        Ok(path) => out.push_str(&format!("\n\n📓 Journal: `{}`", path)),
        Err(e) => out.push_str(&format!(
            "\n\n⚠️ Journal not updated: {}",
            escape_markdown(&e.to_string())
        )),
    }
    out
}
