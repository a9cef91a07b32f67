//! # Text Output
//!
//! Plain-text renderings of the registry for the terminal. JSON mode
//! bypasses this module entirely.

use chrono::{DateTime, Utc};
use dossier_core::labels::{entity_type_label, status_marker};
use dossier_core::{
    Deliverable, EdgeLine, Entity, EntityDetail, UsageReport, UsageStats, UsageWindows,
};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Longest description shown on a grid card.
const CARD_DESCRIPTION_CHARS: usize = 96;

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

fn icon_prefix(entity: &Entity) -> String {
    entity
        .icon
        .as_deref()
        .map(|icon| format!("{} ", icon))
        .unwrap_or_default()
}

// =============================================================================
// ENTITY LIST
// =============================================================================

/// One card per entity: name, type, status, description and focus.
pub fn entity_grid(entities: &[&Entity]) -> String {
    if entities.is_empty() {
        return "No entities match.\n".to_string();
    }
    let mut out = String::new();
    for entity in entities {
        let _ = writeln!(
            out,
            "{}{}  [{}] {} {}",
            icon_prefix(entity),
            entity.name,
            entity_type_label(entity.entity_type),
            status_marker(entity.status),
            entity.status
        );
        if let Some(description) = entity.description.as_deref() {
            let _ = writeln!(out, "  {}", truncate(description, CARD_DESCRIPTION_CHARS));
        }
        if !entity.tracking_focus.is_empty() {
            let _ = writeln!(out, "  Focus: {}", entity.tracking_focus.join(", "));
        }
        let _ = writeln!(
            out,
            "  {} · {} relationships\n",
            entity.slug,
            entity.relationship_count()
        );
    }
    out
}

/// One line per entity.
pub fn entity_list(entities: &[&Entity]) -> String {
    if entities.is_empty() {
        return "No entities match.\n".to_string();
    }
    let width = entities
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for entity in entities {
        let _ = writeln!(
            out,
            "{:>4}  {} {:<width$}  {:<18} {:>3} rel",
            entity.id.0,
            status_marker(entity.status),
            entity.name,
            entity_type_label(entity.entity_type),
            entity.relationship_count(),
            width = width
        );
    }
    out
}

// =============================================================================
// DETAIL
// =============================================================================

fn edge_line(out: &mut String, arrow: &str, edge: &EdgeLine) {
    let _ = write!(out, "  {} {}  (#{})", arrow, edge.sentence(), edge.id);
    if let Some(description) = edge.description.as_deref() {
        let _ = write!(out, " - {}", description);
    }
    out.push('\n');
}

/// Full detail panel for one entity.
pub fn entity_detail(detail: &EntityDetail) -> String {
    let entity = &detail.entity;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}{}  [{}] {} {}",
        icon_prefix(entity),
        entity.name,
        detail.type_label,
        status_marker(entity.status),
        entity.status
    );
    if let Some(full_name) = entity.full_name.as_deref().filter(|_| detail.show_full_name) {
        let _ = writeln!(out, "{}", full_name);
    }
    let _ = writeln!(out, "id {} · slug {}", entity.id, entity.slug);

    if let Some(description) = entity.description.as_deref() {
        let _ = writeln!(out, "\n{}", description);
    }

    let heading = if detail.critical_guardrails {
        "Agent instructions (CRITICAL)"
    } else {
        "Agent instructions"
    };
    let _ = writeln!(out, "\n{}:\n  {}", heading, entity.agent_instructions);

    if let Some(notes) = entity.financial_notes.as_deref() {
        let _ = writeln!(out, "\nFinancial notes:\n  {}", notes);
    }

    if !entity.tracking_focus.is_empty() {
        let _ = writeln!(out, "\nTracking focus:");
        for item in &entity.tracking_focus {
            let _ = writeln!(out, "  - {}", item);
        }
    }

    if !entity.key_people.is_empty() {
        let _ = writeln!(out, "\nKey people:");
        for person in &entity.key_people {
            let _ = write!(out, "  - {}, {}", person.name, person.role);
            if let Some(notes) = person.notes.as_deref() {
                let _ = write!(out, " ({})", notes);
            }
            out.push('\n');
        }
    }

    let _ = writeln!(out, "\nRelationships:");
    if detail.is_isolated() {
        let _ = writeln!(out, "  none");
    }
    for edge in &detail.outgoing {
        edge_line(&mut out, "→", edge);
    }
    for edge in &detail.incoming {
        edge_line(&mut out, "←", edge);
    }

    if detail.deliverable_total > 0 {
        let _ = writeln!(
            out,
            "\nDeliverables ({} of {}):",
            detail.deliverables.len(),
            detail.deliverable_total
        );
        for item in &detail.deliverables {
            let _ = writeln!(out, "  {}", deliverable_line(item));
        }
        let _ = writeln!(out, "  View all: /deliverables?{}", detail.view_all_query);
    }

    let _ = writeln!(
        out,
        "\nCreated {} · Updated {}",
        detail.created_label, detail.updated_label
    );
    out
}

// =============================================================================
// DELIVERABLES
// =============================================================================

fn deliverable_line(item: &Deliverable) -> String {
    format!(
        "{} {}  [{}] {} · {} · {}",
        item.deliverable_type.icon(),
        item.name,
        item.deliverable_type.label(),
        item.status.label(),
        item.agent_id,
        item.created_at.format("%b %-d, %Y")
    )
}

/// The filtered feed with its count label.
pub fn deliverables(items: &[&Deliverable], count_label: &str) -> String {
    let mut out = format!("{}\n", count_label);
    for item in items {
        let _ = writeln!(out, "  {}", deliverable_line(item));
        if let Some(label) = item.project_label.as_deref() {
            let _ = writeln!(out, "      {}", label);
        }
    }
    out
}

// =============================================================================
// AGENTS
// =============================================================================

fn stats_line(window: &str, stats: &UsageStats) -> String {
    format!(
        "  {:<6} {:>4} sessions  {:>10} tokens  ${}",
        window, stats.sessions, stats.total_tokens, stats.cost_usd
    )
}

fn windows_block(out: &mut String, agent: &str, windows: &UsageWindows) {
    let _ = writeln!(out, "{}", agent);
    let _ = writeln!(out, "{}", stats_line("day", &windows.day));
    let _ = writeln!(out, "{}", stats_line("week", &windows.week));
    let _ = writeln!(out, "{}", stats_line("month", &windows.month));
}

pub fn usage(report: &UsageReport) -> String {
    let mut out = String::new();
    match report {
        UsageReport::Agent(usage) => windows_block(&mut out, &usage.agent, &usage.windows),
        UsageReport::All(all) if all.is_empty() => {
            out.push_str("No usage recorded in the last 30 days.\n");
        }
        UsageReport::All(all) => {
            for (agent, windows) in all {
                windows_block(&mut out, agent, windows);
            }
        }
    }
    out
}

pub fn heartbeats(beats: &BTreeMap<String, DateTime<Utc>>) -> String {
    if beats.is_empty() {
        return "No heartbeats recorded.\n".to_string();
    }
    let mut out = String::new();
    for (agent, at) in beats {
        let _ = writeln!(out, "{:<24} {}", agent, at.to_rfc3339());
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use dossier_core::{
        DeliverableCatalog, EntityBoard, EntityDraft, RelationshipDraft, RelationshipType,
        StorageBackend, UsageRow,
    };

    fn board_with_edge() -> EntityBoard {
        let mut board = EntityBoard::new(StorageBackend::in_memory(), DeliverableCatalog::default());
        let mut jane = EntityDraft::create();
        jane.set_name("Jane Barnett");
        jane.agent_instructions = "CRITICAL: never email directly.".to_string();
        let jane = board.save(&jane).unwrap();

        let mut acme = EntityDraft::create();
        acme.set_name("Acme");
        acme.entity_type = Some(dossier_core::EntityType::OperatingCompany);
        acme.agent_instructions = "Public filings only.".to_string();
        acme.description = "Widgets and more widgets.".to_string();
        let acme = board.save(&acme).unwrap();

        let mut edge = RelationshipDraft::new(jane);
        edge.target = Some(acme);
        edge.relationship_type = RelationshipType::BoardMemberOf;
        board.add_relationship(&edge).unwrap();
        board
    }

    #[test]
    fn detail_shows_edges_from_both_ends() {
        let board = board_with_edge();
        let jane = board.find_by_key("jane-barnett").unwrap().id;
        let acme = board.find_by_key("acme").unwrap().id;

        let jane_text = entity_detail(&board.detail(jane).unwrap());
        assert!(jane_text.contains("→ is board member of Acme"));
        assert!(jane_text.contains("Agent instructions (CRITICAL)"));

        let acme_text = entity_detail(&board.detail(acme).unwrap());
        assert!(acme_text.contains("← Jane Barnett is board member of"));
        assert!(!acme_text.contains("(CRITICAL)"));
    }

    #[test]
    fn grid_and_list_layouts() {
        let mut board = board_with_edge();
        let visible = board.visible();
        let grid = entity_grid(&visible);
        assert!(grid.contains("Acme  [OPERATING CO]"));
        assert!(grid.contains("Widgets and more widgets."));
        assert!(grid.contains("acme · 1 relationships"));

        let list = entity_list(&visible);
        assert_eq!(list.lines().count(), 2);
        assert!(!list.contains("Widgets"));
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(entity_list(&[]), "No entities match.\n");
        assert_eq!(entity_grid(&[]), "No entities match.\n");
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(200);
        let cut = truncate(&long, CARD_DESCRIPTION_CHARS);
        assert_eq!(cut.chars().count(), CARD_DESCRIPTION_CHARS);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn usage_lines_show_dollars() {
        let now = Utc::now();
        let rows = vec![UsageRow {
            agent: "scout".to_string(),
            results: r#"{"tokens_in":100,"tokens_out":50}"#.to_string(),
            api_cost_micros: 1_265_000,
            created_at: now,
        }];
        let report = UsageReport::Agent(dossier_core::usage::rollup_agent("scout", &rows, now));
        let text = usage(&report);
        assert!(text.starts_with("scout\n"));
        assert!(text.contains("150 tokens  $1.27"));
        assert_eq!(
            usage(&UsageReport::All(BTreeMap::new())),
            "No usage recorded in the last 30 days.\n"
        );
    }
}
