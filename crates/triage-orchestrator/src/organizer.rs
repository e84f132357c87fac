//! The organizer: entry point for processing tickets.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};
use triage_embeddings::{compose_ticket_text, truncate_head, EmbeddingModel};
use triage_storage::Storage;
use triage_tags::{Canonicalizer, RuleSet, TagInferencer};
use triage_themes::{ReprocessOptions, ReprocessSummary, Theme, ThemeClusterer, TitleIndex};
use triage_types::ticket::validate_key_part;
use triage_types::{
    BatchItem, BatchReport, OrganizationResult, OrganizerConfig, ProjectStats, SimilarityLink,
    TagSuggestion, ThemeAssignment, Ticket, MAX_K,
};
use triage_vector::{Neighbor, SimilarityEngine, VectorError};
use ulid::Ulid;

use crate::context::ProjectContext;
use crate::error::OrganizerError;
use crate::retry::RetryPolicy;

type EmbedResult = Result<Vec<f32>, OrganizerError>;

/// Organizes tickets of any number of projects over one storage handle.
///
/// Configuration is validated once here and never re-read. Project state
/// is opened lazily on first use and kept for the organizer's lifetime.
pub struct Organizer {
    config: OrganizerConfig,
    storage: Arc<Storage>,
    embedder: Arc<dyn EmbeddingModel>,
    retry: RetryPolicy,
    projects: DashMap<String, Arc<ProjectContext>>,
}

impl Organizer {
    pub fn new(
        config: OrganizerConfig,
        storage: Arc<Storage>,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, OrganizerError> {
        config.validate().map_err(OrganizerError::Config)?;

        let info = embedder.info();
        if info.dimension != config.model.dimension {
            return Err(OrganizerError::Config(format!(
                "model {} produces {} dimensions, config expects {}",
                info.name, info.dimension, config.model.dimension
            )));
        }
        if let Some(expected) = &config.model.model_version {
            if *expected != info.version {
                return Err(OrganizerError::Config(format!(
                    "model version {} does not match configured {}",
                    info.version, expected
                )));
            }
        }
        // Fail on a bad pattern now rather than on the first ticket
        RuleSet::compile(&config.rules, &Canonicalizer::new(&config.tags.synonyms))?;

        info!(
            model = %info.name,
            version = %info.version,
            dimension = info.dimension,
            rules = config.rules.len(),
            "Organizer ready"
        );
        Ok(Self {
            retry: RetryPolicy::from(&config.batch),
            config,
            storage,
            embedder,
            projects: DashMap::new(),
        })
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// Version string stamped on every vector this organizer writes.
    pub fn model_version(&self) -> &str {
        &self.embedder.info().version
    }

    /// The project's context, opened on first use.
    pub fn project(&self, project_key: &str) -> Result<Arc<ProjectContext>, OrganizerError> {
        validate_key_part("project_key", project_key)?;
        if let Some(ctx) = self.projects.get(project_key) {
            return Ok(ctx.value().clone());
        }
        let ctx = Arc::new(ProjectContext::new(
            self.storage.clone(),
            project_key,
            self.config.model.dimension,
            self.model_version(),
            &self.config,
        )?);
        Ok(self
            .projects
            .entry(project_key.to_string())
            .or_insert(ctx)
            .value()
            .clone())
    }

    // --- Single ticket ---

    /// Embed, store, place and describe one ticket.
    ///
    /// Re-processing an unchanged ticket rewrites nothing and returns the
    /// same result.
    #[instrument(skip(self, ticket), fields(project = %ticket.project_key, ticket = %ticket.id))]
    pub async fn process_ticket(&self, ticket: Ticket) -> Result<OrganizationResult, OrganizerError> {
        ticket.validate()?;
        let ctx = self.project(&ticket.project_key)?;
        let values = self.embed_one(self.ticket_text(&ticket)).await?;

        let _guard = ctx.lock().await;
        let mut titles = TitleIndex::load(ctx.vectors())?;
        self.apply_with_retry(&ctx, &ticket, values, &mut titles)
            .await?;
        let result = self.describe(&ctx, &ticket.id)?;

        info!(
            links = result.similar_links.len(),
            theme = result.theme_assignment.as_ref().map(|t| t.theme_id.as_str()),
            tags = result.tag_suggestions.len(),
            "Processed ticket"
        );
        Ok(result)
    }

    // --- Batch ---

    /// Process many tickets, isolating failures per ticket.
    ///
    /// Embedding runs in bounded parallel chunks. Each project's tickets are
    /// then stored and joined to themes in input order under the project
    /// lock, followed by exactly one full reprocess for that project. Items
    /// come back in input order.
    #[instrument(skip_all, fields(tickets = tickets.len()))]
    pub async fn process_batch(&self, tickets: Vec<Ticket>) -> BatchReport {
        let run_id = Ulid::new().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Batch started");

        let mut items: Vec<Option<BatchItem>> = (0..tickets.len()).map(|_| None).collect();
        let mut by_project: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, ticket) in tickets.iter().enumerate() {
            match ticket.validate() {
                Ok(()) => by_project
                    .entry(ticket.project_key.clone())
                    .or_default()
                    .push(i),
                Err(e) => items[i] = Some(failed_item(ticket, &e.into())),
            }
        }

        for (project, indices) in &by_project {
            self.process_project_batch(project, &tickets, indices, &mut items)
                .await;
        }

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            items: items.into_iter().flatten().collect(),
        };
        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }

    async fn process_project_batch(
        &self,
        project: &str,
        tickets: &[Ticket],
        indices: &[usize],
        items: &mut [Option<BatchItem>],
    ) {
        let ctx = match self.project(project) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(project, error = %e, "Cannot open project");
                for &i in indices {
                    items[i] = Some(failed_item(&tickets[i], &e));
                }
                return;
            }
        };

        let embeddings = self.embed_all(tickets, indices).await;

        let _guard = ctx.lock().await;
        // One scan of the project's titles serves every assignment below
        let mut titles = match TitleIndex::load(ctx.vectors()) {
            Ok(titles) => titles,
            Err(e) => {
                let e = OrganizerError::from(e);
                error!(project, error = %e, "Cannot read ticket titles");
                for &i in indices {
                    items[i] = Some(failed_item(&tickets[i], &e));
                }
                return;
            }
        };
        let mut applied = Vec::with_capacity(indices.len());
        for (&i, embedding) in indices.iter().zip(embeddings) {
            let ticket = &tickets[i];
            let outcome = match embedding {
                Ok(values) => self
                    .apply_with_retry(&ctx, ticket, values, &mut titles)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => applied.push(i),
                Err(e) => {
                    warn!(ticket = %ticket.id, class = ?e.class(), error = %e, "Ticket failed");
                    items[i] = Some(failed_item(ticket, &e));
                }
            }
        }

        if applied.is_empty() {
            debug!(project, "Nothing applied, skipping reprocess");
            return;
        }

        let clusterer = ThemeClusterer::new(ctx.vectors(), ctx.themes(), &self.config.themes);
        if let Err(e) = clusterer.reprocess(&ReprocessOptions::default()) {
            let e = OrganizerError::from(e);
            error!(project, class = ?e.class(), error = %e, "Batch reprocess failed");
            for &i in &applied {
                items[i] = Some(failed_item(&tickets[i], &e));
            }
            return;
        }

        for i in applied {
            let ticket = &tickets[i];
            items[i] = Some(match self.describe(&ctx, &ticket.id) {
                Ok(result) => BatchItem::organized(result),
                Err(e) => failed_item(ticket, &e),
            });
        }
    }

    // --- Queries and maintenance ---

    /// Similar tickets for a stored ticket. `k` defaults to the configured
    /// value and is capped at [`MAX_K`]; `min_score` defaults likewise.
    pub fn find_similar(
        &self,
        project_key: &str,
        ticket_id: &str,
        k: Option<usize>,
        min_score: Option<f32>,
    ) -> Result<Vec<SimilarityLink>, OrganizerError> {
        let ctx = self.project(project_key)?;
        let k = k.unwrap_or(self.config.similarity.k).min(MAX_K);
        let min_score = min_score.unwrap_or(self.config.similarity.min_score);
        Ok(SimilarityEngine::new(ctx.vectors()).find_similar(ticket_id, k, min_score)?)
    }

    /// Stored tickets similar to free text, such as a draft that has not
    /// been filed yet. The text is cleaned and embedded like a ticket title;
    /// nothing is stored. Defaults and caps match [`Self::find_similar`].
    #[instrument(skip(self, text), fields(project = %project_key))]
    pub async fn find_similar_text(
        &self,
        project_key: &str,
        text: &str,
        k: Option<usize>,
        min_score: Option<f32>,
    ) -> Result<Vec<Neighbor>, OrganizerError> {
        let ctx = self.project(project_key)?;
        let k = k.unwrap_or(self.config.similarity.k).min(MAX_K);
        let min_score = min_score.unwrap_or(self.config.similarity.min_score);

        let values = self.embed_one(self.prepare_text(text, "")).await?;
        let neighbors = SimilarityEngine::new(ctx.vectors()).neighbors_of_vector(
            &values,
            k,
            min_score,
            &HashSet::new(),
        )?;
        debug!(neighbors = neighbors.len(), "Text query complete");
        Ok(neighbors)
    }

    pub fn infer_tags(
        &self,
        project_key: &str,
        ticket_id: &str,
    ) -> Result<Vec<TagSuggestion>, OrganizerError> {
        let ctx = self.project(project_key)?;
        Ok(self.inferencer(&ctx).infer_tags(ticket_id)?)
    }

    pub fn themes(&self, project_key: &str) -> Result<Vec<Theme>, OrganizerError> {
        Ok(self.project(project_key)?.themes().list_themes()?)
    }

    /// Rebuild every theme of the project from the stored vectors.
    #[instrument(skip(self, options))]
    pub async fn reprocess_project(
        &self,
        project_key: &str,
        options: ReprocessOptions,
    ) -> Result<ReprocessSummary, OrganizerError> {
        let ctx = self.project(project_key)?;
        let _guard = ctx.lock().await;
        let clusterer = ThemeClusterer::new(ctx.vectors(), ctx.themes(), &self.config.themes);
        Ok(clusterer.reprocess(&options)?)
    }

    /// Remove a ticket's vector, doc and theme membership. Returns false
    /// when the ticket was not stored.
    #[instrument(skip(self))]
    pub async fn delete_ticket(
        &self,
        project_key: &str,
        ticket_id: &str,
    ) -> Result<bool, OrganizerError> {
        let ctx = self.project(project_key)?;
        let _guard = ctx.lock().await;
        let deleted = ctx.vectors().delete(ticket_id)?;
        info!(deleted, "Delete requested");
        Ok(deleted)
    }

    pub fn project_stats(&self, project_key: &str) -> Result<ProjectStats, OrganizerError> {
        let ctx = self.project(project_key)?;
        let ticket_count = ctx.vectors().len()?;
        let members = ctx.themes().membership_count()?;
        Ok(ProjectStats {
            project_key: project_key.to_string(),
            ticket_count,
            theme_count: ctx.themes().theme_count()?,
            noise_count: ticket_count.saturating_sub(members),
            model_version: self.model_version().to_string(),
        })
    }

    // --- Pipeline steps ---

    fn ticket_text(&self, ticket: &Ticket) -> String {
        self.prepare_text(&ticket.title, &ticket.body)
    }

    fn prepare_text(&self, title: &str, body: &str) -> String {
        let text = compose_ticket_text(title, body);
        truncate_head(&text, self.config.model.max_input_chars).to_string()
    }

    async fn embed_one(&self, text: String) -> EmbedResult {
        let embedder = self.embedder.clone();
        self.retry
            .run("embed", move || {
                let embedder = embedder.clone();
                let text = text.clone();
                async move {
                    let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
                        .await
                        .map_err(|e| OrganizerError::Task(e.to_string()))??;
                    Ok::<_, OrganizerError>(embedding.into_values())
                }
            })
            .await
    }

    /// Embed one chunk with a single batch call; if that fails, embed its
    /// texts one at a time so one bad ticket does not sink the chunk.
    async fn embed_chunk(&self, texts: Vec<String>) -> Vec<EmbedResult> {
        let embedder = self.embedder.clone();
        let batch_texts = texts.clone();
        let batch = self
            .retry
            .run("embed_batch", move || {
                let embedder = embedder.clone();
                let texts = batch_texts.clone();
                async move {
                    let embeddings = tokio::task::spawn_blocking(move || embedder.embed_texts(&texts))
                        .await
                        .map_err(|e| OrganizerError::Task(e.to_string()))??;
                    Ok::<_, OrganizerError>(embeddings)
                }
            })
            .await;

        match batch {
            Ok(embeddings) if embeddings.len() == texts.len() => embeddings
                .into_iter()
                .map(|e| Ok(e.into_values()))
                .collect(),
            outcome => {
                if let Err(e) = &outcome {
                    warn!(size = texts.len(), error = %e, "Batch embedding failed, falling back to single texts");
                }
                let mut results = Vec::with_capacity(texts.len());
                for text in texts {
                    results.push(self.embed_one(text).await);
                }
                results
            }
        }
    }

    /// Embeddings for `indices`, in the same order.
    async fn embed_all(&self, tickets: &[Ticket], indices: &[usize]) -> Vec<EmbedResult> {
        let texts: Vec<String> = indices
            .iter()
            .map(|&i| self.ticket_text(&tickets[i]))
            .collect();
        let chunks: Vec<Vec<String>> = texts
            .chunks(self.config.batch.embed_batch_size.max(1))
            .map(<[String]>::to_vec)
            .collect();
        debug!(texts = texts.len(), chunks = chunks.len(), "Embedding batch");

        let mut results: Vec<(usize, Vec<EmbedResult>)> = stream::iter(chunks.into_iter().enumerate())
            .map(|(n, chunk)| async move { (n, self.embed_chunk(chunk).await) })
            .buffer_unordered(self.config.batch.embed_concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(n, _)| *n);
        results.into_iter().flat_map(|(_, r)| r).collect()
    }

    /// Store the vector and doc, then place the ticket in a theme.
    /// Caller holds the project lock; `titles` mirrors the stored docs.
    fn apply(
        &self,
        ctx: &ProjectContext,
        ticket: &Ticket,
        values: Vec<f32>,
        titles: &mut TitleIndex,
    ) -> Result<Option<ThemeAssignment>, OrganizerError> {
        let vectors = ctx.vectors();
        let previous = vectors.get(&ticket.id)?;
        let outcome = vectors.upsert_ticket(ticket, values)?;
        titles.upsert(&ticket.id, &ticket.title);
        let record = vectors
            .get(&ticket.id)?
            .ok_or_else(|| VectorError::NotEmbedded(ticket.id.clone()))?;

        let clusterer = ThemeClusterer::new(vectors, ctx.themes(), &self.config.themes);
        let assignment = clusterer.assign(&record, previous.as_ref(), titles)?;
        debug!(
            ticket = %ticket.id,
            ?outcome,
            theme = assignment.as_ref().map(|a| a.theme_id.as_str()),
            "Applied ticket"
        );
        Ok(assignment)
    }

    async fn apply_with_retry(
        &self,
        ctx: &ProjectContext,
        ticket: &Ticket,
        values: Vec<f32>,
        titles: &mut TitleIndex,
    ) -> Result<Option<ThemeAssignment>, OrganizerError> {
        self.retry
            .run("apply", || {
                std::future::ready(self.apply(ctx, ticket, values.clone(), titles))
            })
            .await
    }

    fn inferencer<'a>(&'a self, ctx: &'a ProjectContext) -> TagInferencer<'a> {
        TagInferencer::new(ctx.vectors(), ctx.themes(), &self.config.tags, ctx.rules())
            .with_neighbor_min_score(self.config.similarity.min_score)
    }

    /// Read-only view of a stored ticket: links, theme, tags, epic and
    /// components.
    fn describe(
        &self,
        ctx: &ProjectContext,
        ticket_id: &str,
    ) -> Result<OrganizationResult, OrganizerError> {
        let similar_links = SimilarityEngine::new(ctx.vectors()).find_similar(
            ticket_id,
            self.config.similarity.k,
            self.config.similarity.min_score,
        )?;
        let theme_assignment = ctx.themes().assignment_for(ticket_id)?;
        let inference = self.inferencer(ctx).infer(ticket_id)?;

        Ok(OrganizationResult {
            ticket_id: ticket_id.to_string(),
            project_key: ctx.key().to_string(),
            similar_links,
            theme_assignment,
            tag_suggestions: inference.tags,
            epic_suggestion: inference.epic,
            component_suggestions: inference.components,
        })
    }
}

fn failed_item(ticket: &Ticket, err: &OrganizerError) -> BatchItem {
    BatchItem::failed(&ticket.id, &ticket.project_key, err.class(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use triage_embeddings::HashingEmbedder;
    use triage_types::{ContentRule, ErrorClass};

    fn organizer_with(config: OrganizerConfig) -> (Organizer, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let embedder = Arc::new(HashingEmbedder::new(config.model.dimension).unwrap());
        let organizer = Organizer::new(config, storage, embedder).unwrap();
        (organizer, temp)
    }

    fn organizer() -> (Organizer, TempDir) {
        organizer_with(OrganizerConfig::default())
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let embedder = Arc::new(HashingEmbedder::new(128).unwrap());
        let result = Organizer::new(OrganizerConfig::default(), storage, embedder);
        assert!(matches!(result, Err(OrganizerError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_rule_pattern() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let embedder = Arc::new(HashingEmbedder::new(384).unwrap());
        let config = OrganizerConfig {
            rules: vec![ContentRule {
                project: None,
                label: "crash".to_string(),
                patterns: vec!["(".to_string()],
                confidence: 0.9,
            }],
            ..OrganizerConfig::default()
        };
        let err = Organizer::new(config, storage, embedder).err().unwrap();
        assert_eq!(err.class(), ErrorClass::Input);
    }

    #[tokio::test]
    async fn test_paraphrase_is_linked() {
        let (organizer, _temp) = organizer();
        organizer
            .process_ticket(Ticket::new("AUTH-1", "AUTH", "Login fails after password reset"))
            .await
            .unwrap();
        let result = organizer
            .process_ticket(Ticket::new(
                "AUTH-2",
                "AUTH",
                "Password reset leads to login failure",
            ))
            .await
            .unwrap();

        assert_eq!(result.similar_links.len(), 1);
        assert_eq!(result.similar_links[0].target, "AUTH-1");
        assert!(result.similar_links[0].score > 0.5);

        let links = organizer.find_similar("AUTH", "AUTH-1", None, None).unwrap();
        assert_eq!(links[0].target, "AUTH-2");
    }

    #[tokio::test]
    async fn test_find_similar_text_matches_stored_tickets() {
        let (organizer, _temp) = organizer();
        for (id, title) in [
            ("PAY-1", "Payment timeout during checkout"),
            ("PAY-2", "UI color contrast too low"),
        ] {
            organizer
                .process_ticket(Ticket::new(id, "PAY", title))
                .await
                .unwrap();
        }

        let hits = organizer
            .find_similar_text("PAY", "<p>Checkout **payment** timeout</p>", None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ticket_id, "PAY-1");
        assert!(hits[0].score > 0.5);

        // Querying stores nothing
        assert_eq!(organizer.project_stats("PAY").unwrap().ticket_count, 2);

        let err = organizer
            .find_similar_text("PAY", " <br/> ", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Input);
    }

    #[tokio::test]
    async fn test_reprocessing_same_ticket_is_stable() {
        let (organizer, _temp) = organizer();
        let ticket = Ticket::new("PAY-1", "PAY", "Payment timeout during checkout");
        let first = organizer.process_ticket(ticket.clone()).await.unwrap();
        let second = organizer.process_ticket(ticket).await.unwrap();
        assert_eq!(first.theme_assignment, second.theme_assignment);
        assert_eq!(organizer.project_stats("PAY").unwrap().ticket_count, 1);
    }

    #[tokio::test]
    async fn test_empty_ticket_is_input_error() {
        let (organizer, _temp) = organizer();
        let err = organizer
            .process_ticket(Ticket::new("PAY-1", "PAY", "   "))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Input);
        assert_eq!(organizer.project_stats("PAY").unwrap().ticket_count, 0);
    }

    #[tokio::test]
    async fn test_delete_removes_links_and_membership() {
        let (organizer, _temp) = organizer();
        for (id, title) in [
            ("PAY-1", "Payment timeout during checkout"),
            ("PAY-2", "Checkout payment fails with timeout"),
        ] {
            organizer
                .process_ticket(Ticket::new(id, "PAY", title))
                .await
                .unwrap();
        }
        assert!(organizer.delete_ticket("PAY", "PAY-2").await.unwrap());
        assert!(!organizer.delete_ticket("PAY", "PAY-2").await.unwrap());

        let links = organizer.find_similar("PAY", "PAY-1", None, None).unwrap();
        assert!(links.is_empty());
        let themes = organizer.themes("PAY").unwrap();
        assert!(themes.iter().all(|t| !t.member_ids.contains("PAY-2")));

        let stats = organizer.project_stats("PAY").unwrap();
        assert_eq!(stats.ticket_count, 1);
        assert_eq!(stats.model_version, "hashing-v1-d384");
    }

    #[tokio::test]
    async fn test_batch_reports_invalid_tickets_in_order() {
        let (organizer, _temp) = organizer();
        let tickets = vec![
            Ticket::new("PAY-1", "PAY", "Payment timeout during checkout"),
            Ticket::new("", "PAY", "No id"),
            Ticket::new("OPS-1", "OPS", "Disk full on build agent"),
        ];
        let report = organizer.process_batch(tickets).await;

        let ids: Vec<_> = report.items.iter().map(|i| i.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["PAY-1", "", "OPS-1"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.items[1].is_failed());
        assert_eq!(report.run_id.len(), 26);
    }

    #[tokio::test]
    async fn test_content_rules_are_project_scoped() {
        let config = OrganizerConfig {
            rules: vec![ContentRule {
                project: Some("PAY".to_string()),
                label: "Crash".to_string(),
                patterns: vec![r"\bcrash".to_string()],
                confidence: 0.9,
            }],
            ..OrganizerConfig::default()
        };
        let (organizer, _temp) = organizer_with(config);

        let pay = organizer
            .process_ticket(Ticket::new("PAY-1", "PAY", "Checkout crashes"))
            .await
            .unwrap();
        assert_eq!(pay.tag_suggestions.len(), 1);
        assert_eq!(pay.tag_suggestions[0].label, "crash");

        let ops = organizer
            .process_ticket(Ticket::new("OPS-1", "OPS", "Agent crashes"))
            .await
            .unwrap();
        assert!(ops.tag_suggestions.is_empty());
    }
}
