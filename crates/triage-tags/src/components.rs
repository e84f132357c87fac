//! Component suggestions from similar tickets.

use std::collections::{BTreeMap, BTreeSet};

use triage_types::ComponentSuggestion;
use triage_vector::TicketDoc;

/// Components of the most similar neighbors, best first.
///
/// Each neighbor votes for every component it carries with its similarity
/// score. Components in `existing` (compared case-insensitively) are never
/// suggested. Confidence is a component's summed score over the summed
/// scores of all neighbors that carry any component. Ties go to the smaller
/// name and at most `limit` suggestions are returned.
pub fn suggest_components(
    neighbors: &[(TicketDoc, f32)],
    existing: &[String],
    limit: usize,
) -> Vec<ComponentSuggestion> {
    let existing: BTreeSet<String> = existing.iter().map(|c| c.trim().to_lowercase()).collect();

    let mut votes: BTreeMap<&str, f32> = BTreeMap::new();
    let mut total = 0.0f32;
    for (doc, score) in neighbors {
        let carried: BTreeSet<&str> = doc
            .components
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if carried.is_empty() {
            continue;
        }
        total += score;
        for component in carried {
            if !existing.contains(&component.to_lowercase()) {
                *votes.entry(component).or_insert(0.0) += score;
            }
        }
    }
    if total <= 0.0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&str, f32)> = votes.into_iter().collect();
    ranked.sort_by(|(a, a_weight), (b, b_weight)| b_weight.total_cmp(a_weight).then_with(|| a.cmp(b)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(component, weight)| ComponentSuggestion {
            component: component.to_string(),
            confidence: weight / total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn doc(id: &str, components: &[&str]) -> TicketDoc {
        TicketDoc {
            ticket_id: id.to_string(),
            project_key: "PAY".to_string(),
            title: "t".to_string(),
            body: String::new(),
            labels: Vec::new(),
            components: components.iter().map(|c| c.to_string()).collect(),
            parent_key: None,
            updated_at: Utc::now(),
        }
    }

    fn names(suggestions: &[ComponentSuggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.component.as_str()).collect()
    }

    #[test]
    fn test_weighted_top_two() {
        let neighbors = vec![
            (doc("PAY-2", &["Checkout", "API"]), 0.9),
            (doc("PAY-3", &["Checkout"]), 0.8),
            (doc("PAY-4", &["Billing"]), 0.7),
            (doc("PAY-5", &[]), 0.6),
        ];
        let out = suggest_components(&neighbors, &[], 2);
        assert_eq!(names(&out), vec!["Checkout", "API"]);
        assert!((out[0].confidence - 1.7 / 2.4).abs() < 1e-5);
        assert!((out[1].confidence - 0.9 / 2.4).abs() < 1e-5);
    }

    #[test]
    fn test_existing_components_suppressed() {
        let neighbors = vec![
            (doc("PAY-2", &["Checkout", "API"]), 0.9),
            (doc("PAY-3", &["Checkout"]), 0.8),
        ];
        let out = suggest_components(&neighbors, &["checkout".to_string()], 2);
        assert_eq!(names(&out), vec!["API"]);
    }

    #[test]
    fn test_ties_go_to_smaller_name_and_limit() {
        let neighbors = vec![(doc("PAY-2", &["Web", "Api", "Db"]), 0.5)];
        assert_eq!(names(&suggest_components(&neighbors, &[], 2)), vec!["Api", "Db"]);
        assert!(suggest_components(&neighbors, &[], 0).is_empty());
    }

    #[test]
    fn test_no_components() {
        assert!(suggest_components(&[(doc("PAY-2", &[]), 0.9)], &[], 2).is_empty());
        assert!(suggest_components(&[], &[], 2).is_empty());
    }
}
