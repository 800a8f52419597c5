//! Upsert engine: writes one structured record to the document store.
//!
//! People and projects are rolling entity documents, one per normalized
//! name, created on first mention and merged afterwards. Meetings and every
//! other category are always new files.
//!
//! Merged documents keep two invariants regardless of what the generative
//! service returns: the front-matter block is byte-identical to the stored
//! one, and the curated section is unchanged. A merge reply that breaks the
//! second one (or is otherwise unusable) is discarded in favour of a local
//! append.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info, instrument, warn};

use zettel_core::defaults::{BULLET_MAX_LENGTH, MEETING_OCCURRENCE_LIMIT, UNTITLED};
use zettel_core::markdown::{
    append_to_section, body, section, split_front_matter, with_front_matter, EntityFrontMatter,
};
use zettel_core::{
    collapse_whitespace, date_stamp, slugify, truncate_chars, Category, CrossReference,
    DocumentStore, Error, GenerationBackend, PushedRecord, Result, StoredFile, StructuredRecord,
};
use zettel_inference::prompts::{merge_request, strip_code_fence, MERGE_PROMPT};

/// Section collecting links to related actionable items.
pub const ACTION_ITEMS_HEADING: &str = "Action Items";

/// Section layout of an entity document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLayout {
    /// Hand-maintained section, never rewritten.
    pub curated: &'static str,
    /// Append-only dated log.
    pub rolling: &'static str,
}

impl EntityLayout {
    pub fn for_category(category: Category) -> Option<Self> {
        match category {
            Category::Person => Some(Self {
                curated: "Profile",
                rolling: "Observations",
            }),
            Category::Project => Some(Self {
                curated: "Overview",
                rolling: "Updates",
            }),
            _ => None,
        }
    }
}

fn slug_or_untitled(text: &str) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        UNTITLED.to_string()
    } else {
        slug
    }
}

/// Normalized key of an entity record: its name field, else its title.
pub fn entity_slug(record: &StructuredRecord) -> String {
    let slug = slugify(record.entity_name());
    if slug.is_empty() {
        slug_or_untitled(&record.title)
    } else {
        slug
    }
}

/// `meetings/<date>-<slug>.md` for the first occurrence of a day,
/// `meetings/<date>-<slug>-<n>.md` for later ones.
pub fn meeting_path(
    record: &StructuredRecord,
    now: &DateTime<Local>,
    occurrence: u32,
) -> String {
    let suffix = if occurrence > 1 {
        format!("-{}", occurrence)
    } else {
        String::new()
    };
    format!(
        "{}/{}-{}{}.md",
        Category::Meeting.folder(),
        date_stamp(now),
        slug_or_untitled(&record.title),
        suffix
    )
}

/// `<folder>/<id>-<slug>.md`
pub fn note_path(record: &StructuredRecord) -> String {
    format!(
        "{}/{}-{}.md",
        record.declared_type.folder(),
        record.identifier,
        slug_or_untitled(&record.title)
    )
}

/// Dated bullet summarising a record, for the rolling section.
fn observation_bullet(record: &StructuredRecord, date: &str) -> String {
    let text = truncate_chars(&collapse_whitespace(body(&record.raw_text)), BULLET_MAX_LENGTH);
    let text = if text.is_empty() {
        record.title.clone()
    } else {
        text
    };
    format!("- {}: {}", date, text)
}

fn link_bullets(links: &[String]) -> Vec<String> {
    links.iter().map(|l| format!("- {}", l)).collect()
}

/// Append the bullet and links without touching anything else.
fn local_append(existing: &str, layout: EntityLayout, bullet: &str, links: &[String]) -> String {
    let doc = append_to_section(existing, layout.rolling, &[bullet.to_string()]);
    append_to_section(&doc, ACTION_ITEMS_HEADING, &link_bullets(links))
}

fn headings(doc: &str) -> impl Iterator<Item = &str> {
    doc.lines().filter(|l| l.starts_with("## ")).map(str::trim_end)
}

/// Validate a merge reply and splice the original front matter back in.
///
/// Returns `None` when the reply is empty, changes the curated section,
/// drops a section, loses any existing rolling entry, adds no dated entry,
/// or omits a requested link.
fn accept_merge(
    original: &str,
    reply: &str,
    layout: EntityLayout,
    date: &str,
    links: &[String],
) -> Option<String> {
    let candidate = strip_code_fence(reply).trim();
    if candidate.is_empty() {
        return None;
    }
    let candidate = format!("{}\n", candidate);
    let merged = match split_front_matter(original) {
        Some((block, _)) => with_front_matter(&candidate, block),
        None => candidate,
    };

    if let Some(curated) = section(original, layout.curated) {
        let kept = section(&merged, layout.curated)?;
        if kept.trim_end() != curated.trim_end() {
            return None;
        }
    }

    let merged_headings: Vec<&str> = headings(&merged).collect();
    if headings(original).any(|h| !merged_headings.contains(&h)) {
        return None;
    }

    let rolling = section(&merged, layout.rolling)?;
    let previous = section(original, layout.rolling).unwrap_or("");
    let dated = |s: &str| s.lines().filter(|l| l.contains(date)).count();
    if !rolling.starts_with(previous.trim_end()) || dated(rolling) <= dated(previous) {
        return None;
    }

    if links.iter().any(|l| !merged.contains(l.as_str())) {
        return None;
    }

    Some(merged)
}

/// Writes structured records to the document store.
#[derive(Clone)]
pub struct UpsertEngine {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn DocumentStore>,
}

impl UpsertEngine {
    pub fn new(backend: Arc<dyn GenerationBackend>, store: Arc<dyn DocumentStore>) -> Self {
        Self { backend, store }
    }

    /// Write `record`, attaching `related` action items to entity documents.
    #[instrument(skip(self, record, related, now), fields(
        subsystem = "pipeline",
        component = "upsert",
        op = "upsert",
        category = %record.declared_type,
        title = %record.title,
    ))]
    pub async fn upsert(
        &self,
        record: &StructuredRecord,
        related: &[CrossReference],
        now: &DateTime<Local>,
    ) -> Result<PushedRecord> {
        let pushed = match EntityLayout::for_category(record.declared_type) {
            Some(layout) => self.upsert_entity(record, layout, related, now).await?,
            None if record.declared_type == Category::Meeting => {
                self.create_meeting(record, now).await?
            }
            None => self.create_record(record, note_path(record)).await?,
        };

        info!(
            path = %pushed.path,
            merged = pushed.merged,
            "Record written"
        );
        Ok(pushed)
    }

    async fn create_record(&self, record: &StructuredRecord, path: String) -> Result<PushedRecord> {
        let content = format!("{}\n", record.raw_text.trim_end());
        self.store
            .create_file(&path, &format!("add: {}", record.title), &content)
            .await?;
        Ok(PushedRecord {
            path,
            title: record.title.clone(),
            category: record.declared_type,
            source_index: record.source_index,
            merged: false,
        })
    }

    /// Meetings are never merged: a taken name moves on to the next
    /// occurrence suffix.
    async fn create_meeting(
        &self,
        record: &StructuredRecord,
        now: &DateTime<Local>,
    ) -> Result<PushedRecord> {
        let mut occurrence = 1;
        loop {
            let path = meeting_path(record, now, occurrence);
            match self.create_record(record, path).await {
                Err(e) if e.is_conflict() && occurrence < MEETING_OCCURRENCE_LIMIT => {
                    debug!(occurrence, "Meeting name taken, trying next suffix");
                    occurrence += 1;
                }
                result => return result,
            }
        }
    }

    async fn find_entity(&self, folder: &str, slug: &str) -> Result<Option<String>> {
        let names = self.store.list_folder(folder).await?;
        Ok(names
            .into_iter()
            .find(|name| name.contains(slug))
            .map(|name| format!("{}/{}", folder, name)))
    }

    async fn upsert_entity(
        &self,
        record: &StructuredRecord,
        layout: EntityLayout,
        related: &[CrossReference],
        now: &DateTime<Local>,
    ) -> Result<PushedRecord> {
        let folder = record.declared_type.folder();
        let slug = entity_slug(record);
        let date = date_stamp(now);
        let links: Vec<String> = related.iter().map(CrossReference::wiki_link).collect();
        let bullet = observation_bullet(record, &date);

        let (path, merged) = match self.find_entity(folder, &slug).await? {
            Some(path) => {
                let file = self
                    .store
                    .get_file(&path)
                    .await?
                    .ok_or_else(|| Error::NotFound(path.clone()))?;
                debug!(path = %path, "Entity document exists, merging");
                let content = self
                    .merged_content(record, &file, layout, &date, &bullet, &links)
                    .await;
                self.store
                    .update_file(&path, &format!("update: {}", record.title), &content, &file.version)
                    .await?;
                (path, true)
            }
            None => {
                let path = format!("{}/{}.md", folder, slug);
                debug!(path = %path, "No entity document, creating");
                let content = new_entity_document(record, layout, &slug, &bullet, &links)?;
                self.store
                    .create_file(&path, &format!("add: {}", record.entity_name()), &content)
                    .await?;
                (path, false)
            }
        };

        Ok(PushedRecord {
            path,
            title: record.title.clone(),
            category: record.declared_type,
            source_index: record.source_index,
            merged,
        })
    }

    async fn merged_content(
        &self,
        record: &StructuredRecord,
        file: &StoredFile,
        layout: EntityLayout,
        date: &str,
        bullet: &str,
        links: &[String],
    ) -> String {
        let request = merge_request(&file.content, body(&record.raw_text), date, links);
        match self.backend.generate_text(MERGE_PROMPT, &request).await {
            Ok(reply) => match accept_merge(&file.content, &reply, layout, date, links) {
                Some(doc) => doc,
                None => {
                    warn!(
                        response_len = reply.len(),
                        "Merge reply rejected, appending locally"
                    );
                    local_append(&file.content, layout, bullet, links)
                }
            },
            Err(e) => {
                warn!(
                    error = %e,
                    error_kind = e.kind(),
                    "Merge call failed, appending locally"
                );
                local_append(&file.content, layout, bullet, links)
            }
        }
    }
}

/// Initial content of an entity document.
fn new_entity_document(
    record: &StructuredRecord,
    layout: EntityLayout,
    slug: &str,
    bullet: &str,
    links: &[String],
) -> Result<String> {
    let name = record.entity_name().to_string();
    let front_matter = EntityFrontMatter {
        id: record.identifier.clone(),
        title: name.clone(),
        category: record.declared_type,
        name_slug: slug.to_string(),
        person: (record.declared_type == Category::Person).then(|| name.clone()),
        project: (record.declared_type == Category::Project).then(|| name.clone()),
        tags: Vec::new(),
        links: Vec::new(),
    };

    let mut doc = front_matter.render()?;
    doc.push_str(&format!(
        "\n# {}\n\n## {}\n\n_Maintained by hand. Automatic updates never edit this section._\n\n## {}\n\n{}\n",
        name, layout.curated, layout.rolling, bullet
    ));
    if !links.is_empty() {
        doc.push_str(&format!("\n## {}\n\n", ACTION_ITEMS_HEADING));
        for line in link_bullets(links) {
            doc.push_str(&line);
            doc.push('\n');
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use zettel_inference::mock::ScriptedBackend;
    use zettel_store::MemoryStore;

    const PERSON_LAYOUT: EntityLayout = EntityLayout {
        curated: "Profile",
        rolling: "Observations",
    };

    const EXISTING: &str = "---\nid: 202601011200\ntitle: Jane Doe\ntype: people\nname_slug: jane-doe\n---\n\n# Jane Doe\n\n## Profile\n\nStaff engineer, payments.\n\n## Observations\n\n- 2026-01-01: Joined the team.\n";

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
    }

    fn record(category: Category, title: &str, name: Option<&str>, body: &str) -> StructuredRecord {
        StructuredRecord {
            raw_text: format!("---\ntitle: {}\ntype: {}\n---\n\n{}", title, category, body),
            declared_type: category,
            title: title.to_string(),
            identifier: "202610160930".to_string(),
            name: name.map(str::to_string),
            source_index: 0,
            position: 0,
        }
    }

    fn engine(backend: &ScriptedBackend, store: &MemoryStore) -> UpsertEngine {
        UpsertEngine::new(Arc::new(backend.clone()), Arc::new(store.clone()))
    }

    #[test]
    fn test_paths() {
        let r = record(Category::Literature, "Team Topologies: chapter 3", None, "x");
        assert_eq!(note_path(&r), "literature/202610160930-team-topologies-chapter-3.md");
        let m = record(Category::Meeting, "Weekly sync", None, "x");
        assert_eq!(meeting_path(&m, &now(), 1), "meetings/2026-10-16-weekly-sync.md");
        assert_eq!(meeting_path(&m, &now(), 3), "meetings/2026-10-16-weekly-sync-3.md");
        let p = record(Category::Person, "Jane wants platform", Some("Jane Doe"), "x");
        assert_eq!(entity_slug(&p), "jane-doe");
        let untitled = record(Category::Fleeting, "???", None, "x");
        assert_eq!(note_path(&untitled), "fleeting/202610160930-untitled.md");
    }

    #[test]
    fn test_accept_merge_splices_front_matter_verbatim() {
        let reply = "---\nid: 1\ntitle: Rewritten\n---\n\n# Jane Doe\n\n## Profile\n\nStaff engineer, payments.\n\n## Observations\n\n- 2026-01-01: Joined the team.\n- 2026-10-16: Wants to move to platform.\n";
        let merged = accept_merge(EXISTING, reply, PERSON_LAYOUT, "2026-10-16", &[]).unwrap();
        let original_block = split_front_matter(EXISTING).unwrap().0;
        assert!(merged.starts_with(original_block));
        assert!(merged.contains("- 2026-10-16: Wants to move to platform."));
        assert!(!merged.contains("Rewritten"));
    }

    #[test]
    fn test_accept_merge_rejects_curated_edit() {
        let reply = EXISTING.replace("Staff engineer, payments.", "Principal engineer.")
            + "- 2026-10-16: New.\n";
        assert!(accept_merge(EXISTING, &reply, PERSON_LAYOUT, "2026-10-16", &[]).is_none());
    }

    #[test]
    fn test_accept_merge_rejects_missing_entry_or_link() {
        assert!(accept_merge(EXISTING, EXISTING, PERSON_LAYOUT, "2026-10-16", &[]).is_none());
        assert!(accept_merge(EXISTING, "", PERSON_LAYOUT, "2026-10-16", &[]).is_none());

        let reply = format!("{}- 2026-10-16: New.\n", EXISTING);
        let links = vec!["[[tasks/x|X]]".to_string()];
        assert!(accept_merge(EXISTING, &reply, PERSON_LAYOUT, "2026-10-16", &links).is_none());
    }

    #[test]
    fn test_accept_merge_rejects_rewritten_history() {
        let reply = EXISTING.replace("- 2026-01-01: Joined the team.\n", "- 2026-10-16: New.\n");
        assert!(accept_merge(EXISTING, &reply, PERSON_LAYOUT, "2026-10-16", &[]).is_none());
    }

    #[test]
    fn test_local_append_adds_bullet_and_action_items() {
        let links = vec!["[[tasks/202610160930-fix-ci|Fix CI]]".to_string()];
        let doc = local_append(EXISTING, PERSON_LAYOUT, "- 2026-10-16: New.", &links);
        assert!(doc.starts_with(split_front_matter(EXISTING).unwrap().0));
        assert!(doc.contains("- 2026-01-01: Joined the team.\n- 2026-10-16: New.\n"));
        assert!(doc.ends_with("## Action Items\n\n- [[tasks/202610160930-fix-ci|Fix CI]]\n"));
    }

    #[tokio::test]
    async fn test_creates_entity_document() {
        let backend = ScriptedBackend::new();
        let store = MemoryStore::new();
        let links = [CrossReference {
            path: "tasks/202610160930-fix-ci.md".to_string(),
            title: "Fix CI".to_string(),
        }];
        let r = record(
            Category::Person,
            "Jane wants platform",
            Some("Jane Doe"),
            "Jane wants to move\nto the platform team.",
        );

        let pushed = engine(&backend, &store).upsert(&r, &links, &now()).await.unwrap();

        assert_eq!(pushed.path, "people/jane-doe.md");
        assert!(!pushed.merged);
        let doc = store.content("people/jane-doe.md").await.unwrap();
        assert!(doc.contains("person: Jane Doe"));
        assert!(doc.contains("name_slug: jane-doe"));
        assert!(doc.contains("## Profile"));
        assert!(doc.contains("## Observations\n\n- 2026-10-16: Jane wants to move to the platform team.\n"));
        assert!(doc.contains("## Action Items\n\n- [[tasks/202610160930-fix-ci|Fix CI]]\n"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_merge_uses_service_reply_when_valid() {
        let reply = format!("{}- 2026-10-16: Wants platform.\n", EXISTING);
        let backend = ScriptedBackend::new().respond_to(MERGE_PROMPT, reply.clone());
        let store = MemoryStore::with_files([("people/jane-doe.md", EXISTING)]);
        let r = record(Category::Person, "Jane update", Some("Jane Doe"), "Wants platform.");

        let pushed = engine(&backend, &store).upsert(&r, &[], &now()).await.unwrap();

        assert!(pushed.merged);
        assert_eq!(store.content("people/jane-doe.md").await.unwrap(), reply);
        assert!(backend.calls_for(MERGE_PROMPT)[0].text().contains("EXISTING DOCUMENT:"));
    }

    #[tokio::test]
    async fn test_merge_falls_back_when_service_fails() {
        let backend = ScriptedBackend::new().fail_on(MERGE_PROMPT, "overloaded");
        let store = MemoryStore::with_files([("people/jane-doe.md", EXISTING)]);
        let r = record(Category::Person, "Jane update", Some("Jane Doe"), "Wants platform.");

        engine(&backend, &store).upsert(&r, &[], &now()).await.unwrap();

        let doc = store.content("people/jane-doe.md").await.unwrap();
        assert!(doc.starts_with(split_front_matter(EXISTING).unwrap().0));
        assert!(doc.ends_with("- 2026-01-01: Joined the team.\n- 2026-10-16: Wants platform.\n"));
    }

    #[tokio::test]
    async fn test_lookup_is_substring_first_match() {
        let backend = ScriptedBackend::new().fail_on(MERGE_PROMPT, "down");
        let store = MemoryStore::with_files([("projects/2025-atlas-migration.md", "# Atlas\n")]);
        let r = record(Category::Project, "Atlas slipped", Some("Atlas"), "Kickoff slipped.");

        let pushed = engine(&backend, &store).upsert(&r, &[], &now()).await.unwrap();

        assert_eq!(pushed.path, "projects/2025-atlas-migration.md");
        assert!(pushed.merged);
        assert_eq!(
            store.content("projects/2025-atlas-migration.md").await.unwrap(),
            "# Atlas\n\n## Updates\n\n- 2026-10-16: Kickoff slipped.\n"
        );
    }

    #[tokio::test]
    async fn test_meeting_always_created() {
        let backend = ScriptedBackend::new();
        let store = MemoryStore::new();
        let r = record(Category::Meeting, "Weekly sync", None, "Discussed roadmap.");

        let pushed = engine(&backend, &store).upsert(&r, &[], &now()).await.unwrap();

        assert_eq!(pushed.path, "meetings/2026-10-16-weekly-sync.md");
        assert_eq!(
            store.content(&pushed.path).await.unwrap(),
            format!("{}\n", r.raw_text)
        );
    }

    #[tokio::test]
    async fn test_same_day_meetings_accumulate() {
        let backend = ScriptedBackend::new();
        let store = MemoryStore::new();
        let engine = engine(&backend, &store);
        let morning = record(Category::Meeting, "Weekly sync", None, "Roadmap.");
        let afternoon = record(Category::Meeting, "Weekly sync", None, "Hiring.");
        let later = Local.with_ymd_and_hms(2026, 10, 16, 16, 0, 0).unwrap();

        let first = engine.upsert(&morning, &[], &now()).await.unwrap();
        let second = engine.upsert(&afternoon, &[], &later).await.unwrap();
        let third = engine.upsert(&afternoon, &[], &later).await.unwrap();

        assert_eq!(first.path, "meetings/2026-10-16-weekly-sync.md");
        assert_eq!(second.path, "meetings/2026-10-16-weekly-sync-2.md");
        assert_eq!(third.path, "meetings/2026-10-16-weekly-sync-3.md");
        assert!(!second.merged);
        assert!(store.content(&first.path).await.unwrap().contains("Roadmap."));
        assert!(store.content(&second.path).await.unwrap().contains("Hiring."));
    }

    #[tokio::test]
    async fn test_distinct_non_latin_names_get_distinct_documents() {
        let backend = ScriptedBackend::new().fail_on(MERGE_PROMPT, "down");
        let store = MemoryStore::new();
        let engine = engine(&backend, &store);
        let li = record(Category::Person, "会议", Some("李雷"), "Met about the launch.");
        let han = record(Category::Person, "讨论", Some("韩梅梅"), "Discussed hiring.");

        let first = engine.upsert(&li, &[], &now()).await.unwrap();
        let second = engine.upsert(&han, &[], &now()).await.unwrap();

        assert_eq!(first.path, "people/李雷.md");
        assert_eq!(second.path, "people/韩梅梅.md");
        assert!(!second.merged);
        assert!(!store
            .content("people/李雷.md")
            .await
            .unwrap()
            .contains("Discussed hiring."));
    }

    #[tokio::test]
    async fn test_accented_name_does_not_match_unrelated_document() {
        let backend = ScriptedBackend::new();
        let store = MemoryStore::with_files([("people/zoltan.md", "# Zoltan
")]);
        let r = record(Category::Person, "Zoë update", Some("Zoë"), "Joined.");

        let pushed = engine(&backend, &store).upsert(&r, &[], &now()).await.unwrap();

        assert_eq!(pushed.path, "people/zoë.md");
        assert!(!pushed.merged);
        assert_eq!(store.content("people/zoltan.md").await.unwrap(), "# Zoltan\n");
    }

    #[tokio::test]
    async fn test_existing_catch_all_path_is_conflict() {
        let backend = ScriptedBackend::new();
        let store = MemoryStore::with_files([("fleeting/202610160930-idea.md", "old")]);
        let r = record(Category::Fleeting, "Idea", None, "x");

        let err = engine(&backend, &store).upsert(&r, &[], &now()).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.content("fleeting/202610160930-idea.md").await.unwrap(), "old");
    }
}
