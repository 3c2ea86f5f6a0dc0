//! Domain event types.

use serde::{Deserialize, Serialize};

use crate::cashflow::EntityKind;

/// Domain events the write path emits after committing a mutation that
/// affects computed performance.
///
/// These events represent facts about source-data changes. The engine maps
/// them to cache invalidations; it never recomputes eagerly in response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Cash-flow activity entries were created, updated, or deleted.
    ActivitiesChanged {
        entity_id: String,
        entity_kind: EntityKind,
    },

    /// Valuation records were created, updated, or deleted.
    ValuationsChanged {
        entity_id: String,
        entity_kind: EntityKind,
    },
}

impl DomainEvent {
    /// Creates an ActivitiesChanged event.
    pub fn activities_changed(entity_id: String, entity_kind: EntityKind) -> Self {
        Self::ActivitiesChanged {
            entity_id,
            entity_kind,
        }
    }

    /// Creates a ValuationsChanged event.
    pub fn valuations_changed(entity_id: String, entity_kind: EntityKind) -> Self {
        Self::ValuationsChanged {
            entity_id,
            entity_kind,
        }
    }

    /// The entity the event concerns.
    pub fn entity(&self) -> (&str, EntityKind) {
        match self {
            DomainEvent::ActivitiesChanged {
                entity_id,
                entity_kind,
            }
            | DomainEvent::ValuationsChanged {
                entity_id,
                entity_kind,
            } => (entity_id, *entity_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_event_serialization() {
        let event = DomainEvent::activities_changed("fund-1".to_string(), EntityKind::Fund);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("activities_changed"));

        let deserialized: DomainEvent = serde_json::from_str(&json).unwrap();
        match deserialized {
            DomainEvent::ActivitiesChanged {
                entity_id,
                entity_kind,
            } => {
                assert_eq!(entity_id, "fund-1");
                assert_eq!(entity_kind, EntityKind::Fund);
            }
            _ => panic!("Expected ActivitiesChanged"),
        }
    }

    #[test]
    fn test_entity_accessor() {
        let event = DomainEvent::valuations_changed("port-1".to_string(), EntityKind::Portfolio);
        assert_eq!(event.entity(), ("port-1", EntityKind::Portfolio));
    }
}
