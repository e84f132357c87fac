//! Theme storage operations.
//!
//! Themes live in the `themes` column family under `theme:{project}:{id}`;
//! the ticket -> theme index lives in `memberships` under
//! `member:{project}:{ticket}`. Every multi-record change goes through one
//! [`StorageBatch`], so a theme and its memberships never disagree on disk.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use triage_storage::column_families::{CF_MEMBERSHIPS, CF_THEMES};
use triage_storage::{MembershipKey, Storage, StorageBatch, StorageError, ThemeKey};
use triage_types::ThemeAssignment;
use triage_vector::{DeleteCascade, VectorRecord};

use crate::error::ThemeError;
use crate::similarity::running_mean_remove;
use crate::types::{Membership, Theme};

/// Theme storage for one project.
pub struct ThemeStore {
    storage: Arc<Storage>,
    project: String,
}

impl ThemeStore {
    /// Create a theme store for `project` over shared storage.
    pub fn new(storage: Arc<Storage>, project: impl Into<String>) -> Self {
        Self {
            storage,
            project: project.into(),
        }
    }

    /// Project key all reads and writes are scoped to.
    pub fn project(&self) -> &str {
        &self.project
    }

    // --- Reads ---

    /// Get a theme by ID.
    #[instrument(skip(self), fields(project = %self.project))]
    pub fn get_theme(&self, theme_id: &str) -> Result<Option<Theme>, ThemeError> {
        let key = ThemeKey::new(&self.project, theme_id).to_bytes();
        match self.storage.get(CF_THEMES, &key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All themes of the project, ordered by theme id.
    ///
    /// Fails on the first record that does not decode.
    pub fn list_themes(&self) -> Result<Vec<Theme>, ThemeError> {
        let prefix = ThemeKey::project_prefix(&self.project);
        self.storage
            .prefix_iterator(CF_THEMES, &prefix)?
            .into_iter()
            .map(|(_, value)| Ok(serde_json::from_slice(&value)?))
            .collect()
    }

    /// The ticket's membership record, or None when it is noise or not
    /// stored.
    pub fn get_membership(&self, ticket_id: &str) -> Result<Option<Membership>, ThemeError> {
        let key = MembershipKey::new(&self.project, ticket_id).to_bytes();
        match self.storage.get(CF_MEMBERSHIPS, &key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The ticket's current theme, or None when it is noise.
    ///
    /// A membership pointing at a missing theme is reported as corruption.
    pub fn assignment_for(&self, ticket_id: &str) -> Result<Option<ThemeAssignment>, ThemeError> {
        let Some(membership) = self.get_membership(ticket_id)? else {
            return Ok(None);
        };
        let theme = self.get_theme(&membership.theme_id)?.ok_or_else(|| {
            ThemeError::Corrupt(format!(
                "ticket {} points at missing theme {}",
                ticket_id, membership.theme_id
            ))
        })?;
        Ok(Some(ThemeAssignment {
            theme_id: theme.theme_id,
            label: theme.label,
            similarity: membership.similarity,
        }))
    }

    /// Number of themes in the project.
    pub fn theme_count(&self) -> Result<usize, ThemeError> {
        Ok(self
            .storage
            .count_prefix(CF_THEMES, &ThemeKey::project_prefix(&self.project))?)
    }

    /// Number of tickets that belong to some theme.
    pub fn membership_count(&self) -> Result<usize, ThemeError> {
        Ok(self
            .storage
            .count_prefix(CF_MEMBERSHIPS, &MembershipKey::project_prefix(&self.project))?)
    }

    // --- Staged writes ---
    //
    // Nothing below touches disk until the batch is passed to `commit`.

    /// Stage a put of `theme`, replacing any stored theme with the same id.
    pub fn stage_theme(&self, batch: &mut StorageBatch, theme: &Theme) -> Result<(), ThemeError> {
        batch.put(
            CF_THEMES,
            ThemeKey::new(&self.project, &theme.theme_id).to_bytes(),
            serde_json::to_vec(theme)?,
        );
        Ok(())
    }

    /// Stage deletion of a theme. Its memberships are left to the caller.
    pub fn stage_theme_removal(&self, batch: &mut StorageBatch, theme_id: &str) {
        batch.delete(CF_THEMES, ThemeKey::new(&self.project, theme_id).to_bytes());
    }

    /// Stage a put of the ticket -> theme index entry.
    pub fn stage_membership(
        &self,
        batch: &mut StorageBatch,
        membership: &Membership,
    ) -> Result<(), ThemeError> {
        batch.put(
            CF_MEMBERSHIPS,
            MembershipKey::new(&self.project, &membership.ticket_id).to_bytes(),
            serde_json::to_vec(membership)?,
        );
        Ok(())
    }

    /// Stage deletion of the ticket's membership, leaving it as noise.
    pub fn stage_membership_removal(&self, batch: &mut StorageBatch, ticket_id: &str) {
        batch.delete(
            CF_MEMBERSHIPS,
            MembershipKey::new(&self.project, ticket_id).to_bytes(),
        );
    }

    /// Write a staged batch atomically. An empty batch is a no-op.
    pub fn commit(&self, batch: StorageBatch) -> Result<(), ThemeError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.storage.write(batch)?;
        Ok(())
    }

    /// Replace every theme and membership of the project in one write.
    ///
    /// Existing keys are deleted by key alone, so unreadable old records do
    /// not block the replacement.
    #[instrument(skip(self, themes, memberships), fields(project = %self.project))]
    pub fn replace_all(
        &self,
        themes: &[Theme],
        memberships: &[Membership],
    ) -> Result<(), ThemeError> {
        let mut batch = StorageBatch::new();
        for (key, _) in self
            .storage
            .prefix_iterator(CF_THEMES, &ThemeKey::project_prefix(&self.project))?
        {
            batch.delete(CF_THEMES, key);
        }
        for (key, _) in self
            .storage
            .prefix_iterator(CF_MEMBERSHIPS, &MembershipKey::project_prefix(&self.project))?
        {
            batch.delete(CF_MEMBERSHIPS, key);
        }
        for theme in themes {
            self.stage_theme(&mut batch, theme)?;
        }
        for membership in memberships {
            self.stage_membership(&mut batch, membership)?;
        }
        self.storage.write(batch)?;

        info!(
            themes = themes.len(),
            memberships = memberships.len(),
            "Replaced project themes"
        );
        Ok(())
    }
}

impl DeleteCascade for ThemeStore {
    /// Drop the ticket from its theme: the centroid loses its contribution
    /// and a theme left without members is removed.
    fn on_delete(
        &self,
        record: &VectorRecord,
        batch: &mut StorageBatch,
    ) -> Result<(), StorageError> {
        let member_key = MembershipKey::new(&self.project, &record.ticket_id).to_bytes();
        let Some(bytes) = self.storage.get(CF_MEMBERSHIPS, &member_key)? else {
            return Ok(());
        };
        let membership: Membership = serde_json::from_slice(&bytes)?;
        batch.delete(CF_MEMBERSHIPS, member_key);

        let theme_key = ThemeKey::new(&self.project, &membership.theme_id).to_bytes();
        let Some(bytes) = self.storage.get(CF_THEMES, &theme_key)? else {
            return Ok(());
        };
        let mut theme: Theme = serde_json::from_slice(&bytes)?;

        let count = theme.len();
        theme.member_ids.remove(&record.ticket_id);
        if theme.is_empty() || !running_mean_remove(&mut theme.centroid, count, &record.values) {
            batch.delete(CF_THEMES, theme_key);
            debug!(theme = %theme.theme_id, "Removed empty theme");
        } else {
            theme.updated_at = Utc::now();
            batch.put(CF_THEMES, theme_key, serde_json::to_vec(&theme)?);
            debug!(theme = %theme.theme_id, remaining = theme.len(), "Removed theme member");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use tempfile::TempDir;
    use triage_types::Ticket;
    use triage_vector::VectorStore;

    fn create_storage() -> (Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        (storage, temp_dir)
    }

    fn theme(id: &str, members: &[&str], centroid: Vec<f32>) -> Theme {
        Theme {
            theme_id: id.to_string(),
            project_key: "PAY".to_string(),
            label: "payment timeout".to_string(),
            keywords: vec!["payment".to_string(), "timeout".to_string()],
            centroid,
            member_ids: members.iter().map(|m| m.to_string()).collect(),
            model_version: "v1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn membership(ticket: &str, theme_id: &str) -> Membership {
        Membership {
            ticket_id: ticket.to_string(),
            theme_id: theme_id.to_string(),
            similarity: 0.9,
            assigned_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_read_back() {
        let (storage, _temp) = create_storage();
        let store = ThemeStore::new(storage, "PAY");
        let t = theme("thm-PAY-1", &["PAY-1"], vec![1.0, 0.0]);

        let mut batch = StorageBatch::new();
        store.stage_theme(&mut batch, &t).unwrap();
        store
            .stage_membership(&mut batch, &membership("PAY-1", "thm-PAY-1"))
            .unwrap();
        store.commit(batch).unwrap();

        assert_eq!(store.get_theme("thm-PAY-1").unwrap(), Some(t));
        let assignment = store.assignment_for("PAY-1").unwrap().unwrap();
        assert_eq!(assignment.theme_id, "thm-PAY-1");
        assert_eq!(assignment.label, "payment timeout");
        assert!(store.assignment_for("PAY-2").unwrap().is_none());
    }

    #[test]
    fn test_dangling_membership_is_corrupt() {
        let (storage, _temp) = create_storage();
        let store = ThemeStore::new(storage, "PAY");
        let mut batch = StorageBatch::new();
        store
            .stage_membership(&mut batch, &membership("PAY-1", "thm-gone"))
            .unwrap();
        store.commit(batch).unwrap();

        assert!(matches!(
            store.assignment_for("PAY-1"),
            Err(ThemeError::Corrupt(_))
        ));
    }

    #[test]
    fn test_replace_all_is_scoped_to_project() {
        let (storage, _temp) = create_storage();
        let pay = ThemeStore::new(storage.clone(), "PAY");
        let ops = ThemeStore::new(storage.clone(), "OPS");

        pay.replace_all(
            &[theme("thm-PAY-1", &["PAY-1"], vec![1.0, 0.0])],
            &[membership("PAY-1", "thm-PAY-1")],
        )
        .unwrap();
        ops.replace_all(
            &[theme("thm-OPS-1", &["OPS-1"], vec![0.0, 1.0])],
            &[membership("OPS-1", "thm-OPS-1")],
        )
        .unwrap();

        pay.replace_all(&[theme("thm-PAY-2", &["PAY-2"], vec![1.0, 0.0])], &[])
            .unwrap();

        let ids: Vec<_> = pay
            .list_themes()
            .unwrap()
            .into_iter()
            .map(|t| t.theme_id)
            .collect();
        assert_eq!(ids, vec!["thm-PAY-2"]);
        assert_eq!(pay.membership_count().unwrap(), 0);
        assert_eq!(ops.theme_count().unwrap(), 1);
        assert_eq!(ops.membership_count().unwrap(), 1);
    }

    #[test]
    fn test_replace_all_clears_unreadable_records() {
        let (storage, _temp) = create_storage();
        storage
            .put(CF_THEMES, b"theme:PAY:thm-bad", b"not json")
            .unwrap();
        let store = ThemeStore::new(storage, "PAY");
        assert!(matches!(store.list_themes(), Err(ThemeError::Corrupt(_))));

        store.replace_all(&[], &[]).unwrap();
        assert!(store.list_themes().unwrap().is_empty());
    }

    #[test]
    fn test_delete_cascade_updates_centroid_and_drops_empty_theme() {
        let (storage, _temp) = create_storage();
        let themes = Arc::new(ThemeStore::new(storage.clone(), "PAY"));
        let vectors = VectorStore::new(storage, "PAY", 2, "v1")
            .unwrap()
            .with_cascade(themes.clone());

        let seeded = [
            ("PAY-1", vec![1.0, 0.0]),
            ("PAY-2", vec![0.0, 1.0]),
            ("PAY-3", vec![0.0, 1.0]),
        ];
        for (id, v) in seeded {
            vectors
                .upsert_ticket(&Ticket::new(id, "PAY", "Payment timeout"), v)
                .unwrap();
        }
        themes
            .replace_all(
                &[
                    theme("thm-PAY-1", &["PAY-1", "PAY-2"], vec![0.5, 0.5]),
                    theme("thm-PAY-3", &["PAY-3"], vec![0.0, 1.0]),
                ],
                &[
                    membership("PAY-1", "thm-PAY-1"),
                    membership("PAY-2", "thm-PAY-1"),
                    membership("PAY-3", "thm-PAY-3"),
                ],
            )
            .unwrap();

        assert!(vectors.delete("PAY-1").unwrap());
        let remaining = themes.get_theme("thm-PAY-1").unwrap().unwrap();
        assert_eq!(remaining.member_ids, BTreeSet::from(["PAY-2".to_string()]));
        assert!((remaining.centroid[0] - 0.0).abs() < 1e-6);
        assert!((remaining.centroid[1] - 1.0).abs() < 1e-6);
        assert!(themes.get_membership("PAY-1").unwrap().is_none());

        assert!(vectors.delete("PAY-3").unwrap());
        assert!(themes.get_theme("thm-PAY-3").unwrap().is_none());
        assert_eq!(themes.theme_count().unwrap(), 1);
    }
}
