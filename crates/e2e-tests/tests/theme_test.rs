//! Theme E2E tests: payment cluster, idempotent reprocess, labels.

use pretty_assertions::assert_eq;

use e2e_tests::{backlog, ids, partition, payment_tickets, theme_snapshot, TestHarness};
use triage_orchestrator::ReprocessOptions;

#[tokio::test]
async fn test_payment_tickets_form_one_theme() {
    let harness = TestHarness::new();
    let organizer = harness.organizer();
    for t in payment_tickets() {
        organizer.process_ticket(t).await.unwrap();
    }

    organizer
        .reprocess_project("PAY", ReprocessOptions::default())
        .await
        .unwrap();
    let themes = organizer.themes("PAY").unwrap();

    let payments = themes
        .iter()
        .find(|t| t.member_ids.contains("PAY-1"))
        .unwrap();
    assert_eq!(payments.theme_id, "thm-PAY-1");
    assert_eq!(
        payments.member_ids.iter().cloned().collect::<Vec<_>>(),
        ids(&["PAY-1", "PAY-2", "PAY-3"])
    );
    assert_eq!(payments.label, "checkout payment timeout");

    // The UI ticket is either noise or alone
    match themes.iter().find(|t| t.member_ids.contains("PAY-4")) {
        Some(ui) => assert_eq!(ui.len(), 1),
        None => assert_eq!(organizer.project_stats("PAY").unwrap().noise_count, 1),
    }
}

#[tokio::test]
async fn test_reprocess_twice_yields_same_partition() {
    let harness = TestHarness::new();
    let organizer = harness.organizer();
    let report = organizer.process_batch(backlog()).await;
    assert_eq!(report.failed(), 0);

    let first = organizer.themes("BL").unwrap();
    let summary = organizer
        .reprocess_project("BL", ReprocessOptions::default())
        .await
        .unwrap();
    let second = organizer.themes("BL").unwrap();

    assert_eq!(theme_snapshot(&first), theme_snapshot(&second));
    assert_eq!(summary.tickets, 10);
    assert_eq!(summary.themes, second.len());
}

#[tokio::test]
async fn test_backlog_partition() {
    let harness = TestHarness::new();
    let organizer = harness.organizer();
    organizer.process_batch(backlog()).await;

    let themes = organizer.themes("BL").unwrap();
    assert_eq!(
        partition(&themes),
        vec![
            ids(&["BL-01", "BL-03", "BL-06"]),
            ids(&["BL-02", "BL-05", "BL-08"]),
            ids(&["BL-09", "BL-10"]),
        ]
    );

    // The two loose dark mode tickets are held back as noise
    let stats = organizer.project_stats("BL").unwrap();
    assert_eq!(stats.ticket_count, 10);
    assert_eq!(stats.theme_count, 3);
    assert_eq!(stats.noise_count, 2);
}

#[tokio::test]
async fn test_every_ticket_in_at_most_one_theme() {
    let harness = TestHarness::new();
    let organizer = harness.organizer();
    organizer.process_batch(backlog()).await;

    let themes = organizer.themes("BL").unwrap();
    let mut seen = std::collections::BTreeSet::new();
    for theme in &themes {
        for member in &theme.member_ids {
            assert!(seen.insert(member.clone()), "{member} is in two themes");
        }
    }
}
