//! Parent epic suggestion from similar tickets.

use std::collections::BTreeMap;

use triage_types::EpicSuggestion;
use triage_vector::TicketDoc;

/// Suggest the parent epic shared by the most similar neighbors.
///
/// Each neighbor votes for its parent with its similarity score. The best
/// epic wins by summed score (ties go to the smaller key) and its
/// confidence is that sum over the summed scores of all neighbors that have
/// a parent. Returns None when no neighbor has a parent.
pub fn suggest_epic(neighbors: &[(TicketDoc, f32)]) -> Option<EpicSuggestion> {
    let mut votes: BTreeMap<&str, (f32, usize)> = BTreeMap::new();
    let mut total = 0.0f32;
    for (doc, score) in neighbors {
        if let Some(parent) = doc.parent_key.as_deref() {
            let entry = votes.entry(parent).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
            total += score;
        }
    }

    let (epic_key, weight, count) = votes.into_iter().fold(
        None::<(&str, f32, usize)>,
        |best, (key, (weight, count))| match best {
            Some((_, top, _)) if top >= weight => best,
            _ => Some((key, weight, count)),
        },
    )?;

    let confidence = if total > 0.0 { weight / total } else { 0.0 };
    Some(EpicSuggestion {
        epic_key: epic_key.to_string(),
        confidence,
        reasoning: format!(
            "{}/{} similar tickets belong to this epic. Confidence: {:.2}",
            count,
            neighbors.len(),
            confidence
        ),
    })
}
