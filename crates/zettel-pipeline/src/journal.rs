//! Journal aggregator: one append-only document per day, one block per
//! processing session.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, instrument, warn};

use zettel_core::defaults::{JOURNAL_FOLDER, PREVIEW_LENGTH};
use zettel_core::{
    date_stamp, wiki_link, Category, DocumentStore, GenerationBackend, Mode, NotePayload,
    PushedRecord, RawNote, Result,
};
use zettel_inference::prompts::SUMMARY_PROMPT;

/// `journal/<YYYY-MM-DD>.md`
pub fn journal_path(now: &DateTime<Local>) -> String {
    format!("{}/{}.md", JOURNAL_FOLDER, date_stamp(now))
}

/// Summary used when the service cannot write one.
pub fn fallback_summary(note_count: usize, record_count: usize) -> String {
    format!(
        "Captured {} note(s) and wrote {} record(s).",
        note_count, record_count
    )
}

/// Full text of the notes, fed to the summary call.
fn summary_input(notes: &[RawNote]) -> String {
    notes
        .iter()
        .map(|note| {
            let mut line = match &note.payload {
                NotePayload::Text(text) => text.clone(),
                NotePayload::Image(image) => match &image.caption {
                    Some(caption) => format!("[Image] {}", caption),
                    None => "[Image]".to_string(),
                },
            };
            if let Some(answer) = &note.clarification {
                line.push_str(&format!(" (context: {})", answer));
            }
            format!("- {}", line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render one session block.
pub fn render_block(
    now: &DateTime<Local>,
    mode: Mode,
    summary: &str,
    notes: &[RawNote],
    pushed: &[PushedRecord],
) -> String {
    let mut out = format!(
        "## {} · {} session\n\n{}\n\n",
        now.format("%H:%M"),
        match mode {
            Mode::Work => "Work",
            Mode::Personal => "Personal",
        },
        summary.trim()
    );

    if pushed.is_empty() {
        out.push_str("_Saved without structuring._\n\n");
    } else {
        let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
        for record in pushed {
            *counts.entry(record.category).or_default() += 1;
        }
        out.push_str("| Category | Count |\n|----------|-------|\n");
        for (category, count) in &counts {
            out.push_str(&format!("| {} {} | {} |\n", category.emoji(), category, count));
        }
        out.push('\n');
    }

    for (index, note) in notes.iter().enumerate() {
        out.push_str(&format!("- {}\n", note.preview(PREVIEW_LENGTH)));
        for record in pushed.iter().filter(|r| r.source_index == index) {
            out.push_str(&format!(
                "    - {} ({})\n",
                wiki_link(&record.path, &record.title),
                if record.merged { "updated" } else { "created" }
            ));
        }
    }
    out
}

/// Appends session blocks to the daily journal.
#[derive(Clone)]
pub struct JournalAggregator {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn DocumentStore>,
}

impl JournalAggregator {
    pub fn new(backend: Arc<dyn GenerationBackend>, store: Arc<dyn DocumentStore>) -> Self {
        Self { backend, store }
    }

    /// Append a block for this session and return the journal path.
    #[instrument(skip_all, fields(
        subsystem = "pipeline",
        component = "journal",
        op = "append",
        note_count = notes.len(),
        record_count = pushed.len(),
    ))]
    pub async fn append_session(
        &self,
        notes: &[RawNote],
        pushed: &[PushedRecord],
        mode: Mode,
        now: &DateTime<Local>,
    ) -> Result<String> {
        let summary = match self
            .backend
            .generate_text(SUMMARY_PROMPT, &summary_input(notes))
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => fallback_summary(notes.len(), pushed.len()),
            Err(e) => {
                warn!(
                    error = %e,
                    error_kind = e.kind(),
                    "Summary call failed, using fallback"
                );
                fallback_summary(notes.len(), pushed.len())
            }
        };

        let block = render_block(now, mode, &summary, notes, pushed);
        let path = journal_path(now);
        let message = format!("journal: {}", date_stamp(now));

        match self.store.get_file(&path).await? {
            Some(file) => {
                let content = format!("{}\n\n{}", file.content.trim_end(), block);
                self.store
                    .update_file(&path, &message, &content, &file.version)
                    .await?;
            }
            None => {
                let content = format!("# {}\n\n{}", date_stamp(now), block);
                self.store.create_file(&path, &message, &content).await?;
            }
        }

        info!(path = %path, "Journal updated");
        Ok(path)
    }
}
