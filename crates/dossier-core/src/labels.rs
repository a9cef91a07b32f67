//! # Display Labels
//!
//! Human-facing labels for entity types, relationship types and statuses,
//! plus the detector that flags critical agent guardrails.

use crate::{EntityStatus, EntityType, RelationshipType};
use regex::Regex;
use std::sync::LazyLock;

/// Whole-word `CRITICAL` or `DO NOT`, any case.
static CRITICAL_GUARDRAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCRITICAL\b|\bDO NOT\b").expect("valid critical guardrail regex")
});

/// Badge label for an entity type.
#[must_use]
pub const fn entity_type_label(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Person => "PERSON",
        EntityType::FamilyOffice => "FAMILY OFFICE",
        EntityType::OperatingCompany => "OPERATING CO",
        EntityType::InvestmentVehicle => "INVESTMENT",
        EntityType::VentureFund => "VENTURE FUND",
        EntityType::Nonprofit => "NONPROFIT",
        EntityType::RealEstate => "REAL ESTATE",
        EntityType::PublicCompany => "PUBLIC CO",
        EntityType::Philanthropic => "PHILANTHROPIC",
    }
}

/// Verb phrase for an edge, read as "source <label> target".
#[must_use]
pub const fn relationship_label(relationship_type: RelationshipType) -> &'static str {
    match relationship_type {
        RelationshipType::ParentOf => "is parent of",
        RelationshipType::SubsidiaryOf => "is subsidiary of",
        RelationshipType::HoldsPositionIn => "holds position in",
        RelationshipType::Operates => "operates",
        RelationshipType::BoardMemberOf => "is board member of",
        RelationshipType::AffiliatedWith => "is affiliated with",
        RelationshipType::StakeholderIn => "is stakeholder in",
        RelationshipType::PhilanthropicTo => "philanthropic engagement with",
    }
}

/// Single-glyph status marker for terminal output.
#[must_use]
pub const fn status_marker(status: EntityStatus) -> &'static str {
    match status {
        EntityStatus::Active => "●",
        EntityStatus::Watch => "◐",
        EntityStatus::Inactive => "○",
    }
}

/// True when the guardrail text must be rendered with the critical accent.
#[must_use]
pub fn needs_critical_accent(instructions: &str) -> bool {
    CRITICAL_GUARDRAIL.is_match(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_member_label() {
        assert_eq!(
            relationship_label(RelationshipType::BoardMemberOf),
            "is board member of"
        );
    }

    #[test]
    fn critical_accent_matches_whole_words() {
        assert!(needs_critical_accent("CRITICAL: never email the LPs"));
        assert!(needs_critical_accent("Do not contact directly."));
        assert!(!needs_critical_accent("Uncritical summary is fine"));
        assert!(!needs_critical_accent("donot"));
        assert!(!needs_critical_accent(""));
    }

    #[test]
    fn every_type_has_a_label() {
        for t in EntityType::ALL {
            assert!(!entity_type_label(t).is_empty());
        }
    }
}
