//! Theme clustering: incremental assignment and full reprocess.
//!
//! Incremental mode places one ticket against the current theme centroids.
//! Full reprocess rebuilds a project's themes from scratch:
//!
//! 1. Greedy centroid pass over tickets in id order
//! 2. Merge centroid pairs at or above the join threshold, best pair first
//! 3. Split clusters whose cohesion is below the minimum, recursively
//! 4. Drop undersized clusters (and, in small projects, loose singletons)
//!    to noise
//!
//! Every step breaks ties by position, and positions follow sorted ticket
//! ids, so the same population always yields the same partition.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use triage_storage::StorageBatch;
use triage_types::{ThemeAssignment, ThemeConfig};
use triage_vector::{VectorError, VectorRecord, VectorStore};

use crate::error::ThemeError;
use crate::labeling::{ThemeLabeler, TitleIndex};
use crate::similarity::{
    calculate_centroid, cohesion, cosine_similarity, merge_centroids, running_mean_add,
    running_mean_remove,
};
use crate::storage::ThemeStore;
use crate::types::{theme_id_for, Membership, Theme};

/// Cancellation and time limit for a full reprocess.
#[derive(Debug, Clone, Default)]
pub struct ReprocessOptions {
    pub cancel: CancellationToken,
    /// Measured from the start of the run
    pub deadline: Option<Duration>,
}

impl ReprocessOptions {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn check(&self, started: Instant) -> Result<(), ThemeError> {
        if self.cancel.is_cancelled() {
            return Err(ThemeError::Cancelled);
        }
        if self.deadline.is_some_and(|d| started.elapsed() >= d) {
            return Err(ThemeError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// What a full reprocess produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReprocessSummary {
    pub tickets: usize,
    pub themes: usize,
    pub noise: usize,
    pub merges: usize,
    pub splits: usize,
}

/// Working cluster: member positions (ascending) and their mean.
#[derive(Debug, Clone)]
struct Cluster {
    members: Vec<usize>,
    centroid: Vec<f32>,
}

/// Clusters one project's tickets into themes.
pub struct ThemeClusterer<'a> {
    vectors: &'a VectorStore,
    themes: &'a ThemeStore,
    config: &'a ThemeConfig,
    labeler: ThemeLabeler,
}

impl<'a> ThemeClusterer<'a> {
    pub fn new(vectors: &'a VectorStore, themes: &'a ThemeStore, config: &'a ThemeConfig) -> Self {
        Self {
            vectors,
            themes,
            config,
            labeler: ThemeLabeler::new(config.label_terms),
        }
    }

    /// Place one freshly stored ticket.
    ///
    /// `previous` is the ticket's vector before this upsert, if any. When the
    /// ticket already has a theme and its vector did not change, the current
    /// assignment is returned untouched. Returns None when the ticket is held
    /// as noise. `titles` must already hold the ticket's stored title; it
    /// supplies the labels of the theme the ticket lands in.
    #[instrument(skip_all, fields(project = %self.vectors.project(), ticket = %record.ticket_id))]
    pub fn assign(
        &self,
        record: &VectorRecord,
        previous: Option<&VectorRecord>,
        titles: &TitleIndex,
    ) -> Result<Option<ThemeAssignment>, ThemeError> {
        let mut batch = StorageBatch::new();
        let mut themes = self.themes.list_themes()?;

        if let Some(membership) = self.themes.get_membership(&record.ticket_id)? {
            let changed = previous.is_some_and(|p| !p.same_content(record));
            if !changed {
                return self.themes.assignment_for(&record.ticket_id);
            }
            let old_values = previous.map(|p| p.values.as_slice()).unwrap_or_default();
            self.leave_theme(&mut batch, &mut themes, &membership, old_values)?;
        }

        let active = self.vectors.model_version();
        let best = themes
            .iter()
            .enumerate()
            .filter(|(_, t)| t.model_version == active)
            .map(|(i, t)| (i, cosine_similarity(&record.values, &t.centroid)))
            .fold(None::<(usize, f32)>, |best, (i, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((i, score)),
            });
        let population = self.vectors.len()?;

        let (theme, joined) = match best {
            Some((i, score)) if score >= self.config.join_threshold => {
                let mut theme = themes.swap_remove(i);
                running_mean_add(&mut theme.centroid, theme.len(), &record.values);
                theme.member_ids.insert(record.ticket_id.clone());
                theme.updated_at = Utc::now();
                (theme, true)
            }
            Some((_, score))
                if population < self.config.small_population
                    && score >= self.config.noise_threshold =>
            {
                debug!(score, population, "Held as noise");
                self.themes.stage_membership_removal(&mut batch, &record.ticket_id);
                self.themes.commit(batch)?;
                return Ok(None);
            }
            _ => {
                let now = Utc::now();
                let theme = Theme {
                    theme_id: unique_theme_id(&record.ticket_id, &themes),
                    project_key: self.vectors.project().to_string(),
                    label: String::new(),
                    keywords: Vec::new(),
                    centroid: record.values.clone(),
                    member_ids: BTreeSet::from([record.ticket_id.clone()]),
                    model_version: active.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                (theme, false)
            }
        };

        let theme = self.relabel(theme, titles);
        let similarity = cosine_similarity(&record.values, &theme.centroid).max(0.0);
        let membership = Membership {
            ticket_id: record.ticket_id.clone(),
            theme_id: theme.theme_id.clone(),
            similarity,
            assigned_at: Utc::now(),
        };
        self.themes.stage_theme(&mut batch, &theme)?;
        self.themes.stage_membership(&mut batch, &membership)?;
        self.themes.commit(batch)?;

        debug!(theme = %theme.theme_id, joined, similarity, "Assigned ticket");
        Ok(Some(ThemeAssignment {
            theme_id: theme.theme_id,
            label: theme.label,
            similarity,
        }))
    }

    /// Take a ticket out of its current theme ahead of re-placing it.
    fn leave_theme(
        &self,
        batch: &mut StorageBatch,
        themes: &mut Vec<Theme>,
        membership: &Membership,
        old_values: &[f32],
    ) -> Result<(), ThemeError> {
        let position = themes
            .iter()
            .position(|t| t.theme_id == membership.theme_id)
            .ok_or_else(|| {
                ThemeError::Corrupt(format!(
                    "ticket {} points at missing theme {}",
                    membership.ticket_id, membership.theme_id
                ))
            })?;

        let theme = &mut themes[position];
        let count = theme.len();
        theme.member_ids.remove(&membership.ticket_id);
        if theme.is_empty() || !running_mean_remove(&mut theme.centroid, count, old_values) {
            self.themes.stage_theme_removal(batch, &membership.theme_id);
            themes.remove(position);
        } else {
            theme.updated_at = Utc::now();
            self.themes.stage_theme(batch, theme)?;
        }
        self.themes.stage_membership_removal(batch, &membership.ticket_id);
        debug!(theme = %membership.theme_id, "Left previous theme");
        Ok(())
    }

    fn relabel(&self, mut theme: Theme, titles: &TitleIndex) -> Theme {
        let label = self.labeler.label(
            theme.member_ids.iter().filter_map(|id| titles.title(id)),
            titles.frequencies(),
        );
        theme.label = label.label;
        theme.keywords = label.keywords;
        theme
    }

    /// Rebuild every theme of the project and commit them in one write.
    ///
    /// Cancellation and the deadline are checked between assignments; on
    /// either, nothing is written and the previous themes stay in place.
    /// Refuses to run while vectors from another model version remain.
    #[instrument(skip_all, fields(project = %self.vectors.project()))]
    pub fn reprocess(&self, options: &ReprocessOptions) -> Result<ReprocessSummary, ThemeError> {
        let started = Instant::now();
        options.check(started)?;

        if let Some(stale_id) = self.vectors.stale_ticket_ids()?.into_iter().next() {
            let found = self
                .vectors
                .get(&stale_id)?
                .map(|r| r.model_version)
                .unwrap_or_default();
            return Err(VectorError::ModelVersionMismatch {
                ticket_id: stale_id,
                expected: self.vectors.model_version().to_string(),
                found,
            }
            .into());
        }

        let mut records = self.vectors.all_vectors().collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.ticket_id.cmp(&b.ticket_id));
        let points: Vec<&[f32]> = records.iter().map(|r| r.values.as_slice()).collect();
        let check = || options.check(started);

        let order: Vec<usize> = (0..points.len()).collect();
        let mut clusters = greedy_pass(&points, &order, self.config.join_threshold, &check)?;
        let merges = merge_pass(&mut clusters, self.config.join_threshold, &check)?;

        let mut splits = 0;
        let mut split_clusters = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            splits += split_cluster(
                &points,
                cluster,
                self.config.min_cohesion,
                self.config.max_split_depth,
                0,
                &mut split_clusters,
                &check,
            )?;
        }
        split_clusters.sort_by_key(|c| c.members[0]);

        let kept = self.drop_noise(split_clusters, points.len());
        options.check(started)?;

        let (themes, memberships) = self.build_themes(&records, &kept)?;
        let summary = ReprocessSummary {
            tickets: records.len(),
            themes: themes.len(),
            noise: records.len() - memberships.len(),
            merges,
            splits,
        };

        options.check(started)?;
        self.themes.replace_all(&themes, &memberships)?;

        info!(
            tickets = summary.tickets,
            themes = summary.themes,
            noise = summary.noise,
            merges,
            splits,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reprocess committed"
        );
        Ok(summary)
    }

    /// Undersized clusters always become noise. In a small project a
    /// singleton that loosely matches another cluster is held as noise too,
    /// the same rule incremental assignment applies.
    fn drop_noise(&self, clusters: Vec<Cluster>, population: usize) -> Vec<Cluster> {
        let small = population < self.config.small_population;
        let loose: Vec<bool> = clusters
            .iter()
            .enumerate()
            .map(|(i, cluster)| {
                small
                    && cluster.members.len() == 1
                    && clusters.iter().enumerate().any(|(j, other)| {
                        i != j
                            && cosine_similarity(&cluster.centroid, &other.centroid)
                                >= self.config.noise_threshold
                    })
            })
            .collect();

        clusters
            .into_iter()
            .zip(loose)
            .filter(|(cluster, loose)| {
                !loose && cluster.members.len() >= self.config.min_theme_size
            })
            .map(|(cluster, _)| cluster)
            .collect()
    }

    fn build_themes(
        &self,
        records: &[VectorRecord],
        clusters: &[Cluster],
    ) -> Result<(Vec<Theme>, Vec<Membership>), ThemeError> {
        let titles = TitleIndex::load(self.vectors)?;
        let now = Utc::now();

        let mut themes = Vec::with_capacity(clusters.len());
        let mut memberships = Vec::new();
        for cluster in clusters {
            let members: Vec<&VectorRecord> =
                cluster.members.iter().map(|&i| &records[i]).collect();
            let theme_id = theme_id_for(&members[0].ticket_id);
            let label = self.labeler.label(
                members.iter().filter_map(|r| titles.title(&r.ticket_id)),
                titles.frequencies(),
            );

            for record in &members {
                memberships.push(Membership {
                    ticket_id: record.ticket_id.clone(),
                    theme_id: theme_id.clone(),
                    similarity: cosine_similarity(&record.values, &cluster.centroid).max(0.0),
                    assigned_at: now,
                });
            }
            themes.push(Theme {
                theme_id,
                project_key: self.vectors.project().to_string(),
                label: label.label,
                keywords: label.keywords,
                centroid: cluster.centroid.clone(),
                member_ids: members.iter().map(|r| r.ticket_id.clone()).collect(),
                model_version: self.vectors.model_version().to_string(),
                created_at: now,
                updated_at: now,
            });
        }
        Ok((themes, memberships))
    }
}

/// `thm-{ticket}`, suffixed with `-2`, `-3`, ... if an existing theme
/// already holds that id.
fn unique_theme_id(ticket_id: &str, themes: &[Theme]) -> String {
    let base = theme_id_for(ticket_id);
    let taken = |id: &str| themes.iter().any(|t| t.theme_id == id);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|id| !taken(id))
        .unwrap_or(base)
}

/// Assign each point, in `order`, to the nearest cluster centroid at or
/// above `threshold`, else seed a new cluster. Ties go to the older cluster.
fn greedy_pass(
    points: &[&[f32]],
    order: &[usize],
    threshold: f32,
    check: &dyn Fn() -> Result<(), ThemeError>,
) -> Result<Vec<Cluster>, ThemeError> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for &idx in order {
        check()?;
        let point = points[idx];
        let mut best: Option<(usize, f32)> = None;
        for (c, cluster) in clusters.iter().enumerate() {
            let score = cosine_similarity(point, &cluster.centroid);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((c, score));
            }
        }

        match best {
            Some((c, score)) if score >= threshold => {
                let cluster = &mut clusters[c];
                running_mean_add(&mut cluster.centroid, cluster.members.len(), point);
                cluster.members.push(idx);
            }
            _ => clusters.push(Cluster {
                members: vec![idx],
                centroid: point.to_vec(),
            }),
        }
    }
    Ok(clusters)
}

/// Repeatedly merge the most similar centroid pair at or above `threshold`.
/// Returns the number of merges.
fn merge_pass(
    clusters: &mut Vec<Cluster>,
    threshold: f32,
    check: &dyn Fn() -> Result<(), ThemeError>,
) -> Result<usize, ThemeError> {
    let mut merges = 0;
    loop {
        check()?;
        let mut best: Option<(usize, usize, f32)> = None;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let score = cosine_similarity(&clusters[i].centroid, &clusters[j].centroid);
                if score >= threshold && best.map_or(true, |(_, _, top)| score > top) {
                    best = Some((i, j, score));
                }
            }
        }
        let Some((i, j, score)) = best else {
            return Ok(merges);
        };

        let absorbed = clusters.remove(j);
        let target = &mut clusters[i];
        target.centroid = merge_centroids(
            &target.centroid,
            target.members.len(),
            &absorbed.centroid,
            absorbed.members.len(),
        );
        target.members.extend(absorbed.members);
        target.members.sort_unstable();
        merges += 1;
        debug!(into = i, from = j, score, "Merged clusters");
    }
}

/// Bisect `cluster` while its cohesion is below `min_cohesion`, up to
/// `max_depth` levels. The two least similar members seed the halves and
/// every member goes to the nearer seed. Pushes the resulting clusters to
/// `out` and returns the number of splits made.
fn split_cluster(
    points: &[&[f32]],
    cluster: Cluster,
    min_cohesion: f32,
    max_depth: usize,
    depth: usize,
    out: &mut Vec<Cluster>,
    check: &dyn Fn() -> Result<(), ThemeError>,
) -> Result<usize, ThemeError> {
    check()?;
    let vectors: Vec<&[f32]> = cluster.members.iter().map(|&i| points[i]).collect();
    if vectors.len() < 2 || depth >= max_depth || cohesion(&vectors) >= min_cohesion {
        out.push(cluster);
        return Ok(0);
    }

    let mut seeds = (0, 1, f32::INFINITY);
    for a in 0..vectors.len() {
        for b in (a + 1)..vectors.len() {
            let score = cosine_similarity(vectors[a], vectors[b]);
            if score < seeds.2 {
                seeds = (a, b, score);
            }
        }
    }

    let (mut left, mut right) = (Vec::new(), Vec::new());
    for (pos, &member) in cluster.members.iter().enumerate() {
        let to_left = cosine_similarity(vectors[pos], vectors[seeds.0]);
        let to_right = cosine_similarity(vectors[pos], vectors[seeds.1]);
        if pos == seeds.1 || (pos != seeds.0 && to_right > to_left) {
            right.push(member);
        } else {
            left.push(member);
        }
    }

    let mut splits = 1;
    for members in [left, right] {
        let member_vectors: Vec<&[f32]> = members.iter().map(|&i| points[i]).collect();
        let half = Cluster {
            centroid: calculate_centroid(&member_vectors),
            members,
        };
        splits += split_cluster(points, half, min_cohesion, max_depth, depth + 1, out, check)?;
    }
    Ok(splits)
}
