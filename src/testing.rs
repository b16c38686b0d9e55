//! Fixture entities shared by unit tests

use chrono::{DateTime, Utc};

use crate::models::{Entity, EntityHandle, EntityId, FieldValue, JoinRecord};

macro_rules! labelled_entity {
    ($name:ident, $type_name:literal, $trackable:literal) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            pub id: i64,
            pub name: String,
        }

        impl $name {
            pub fn new(id: i64, name: &str) -> Self {
                Self {
                    id,
                    name: name.to_string(),
                }
            }
        }

        impl Entity for $name {
            fn entity_type(&self) -> &str {
                $type_name
            }

            fn id(&self) -> EntityId {
                EntityId::Int(self.id)
            }

            fn label(&self) -> Option<String> {
                Some(self.name.clone())
            }

            fn is_trackable(&self) -> bool {
                $trackable
            }
        }
    };
}

labelled_entity!(Person, "Person", true);
labelled_entity!(Role, "Role", true);
labelled_entity!(Manager, "Manager", false);
labelled_entity!(Tag, "Tag", false);

/// Entity without a label
#[derive(Debug, Clone)]
pub struct Gadget {
    pub id: i64,
}

impl Entity for Gadget {
    fn entity_type(&self) -> &str {
        "Gadget"
    }

    fn id(&self) -> EntityId {
        EntityId::Int(self.id)
    }
}

/// Join record granting a role to a person
#[derive(Debug, Clone)]
pub struct UserRole {
    pub owner: EntityHandle,
    pub target: EntityHandle,
    pub granted_at: DateTime<Utc>,
}

impl UserRole {
    pub fn new(owner: EntityHandle, target: EntityHandle, granted_at: DateTime<Utc>) -> Self {
        Self {
            owner,
            target,
            granted_at,
        }
    }
}

impl Entity for UserRole {
    fn entity_type(&self) -> &str {
        "UserRole"
    }

    fn id(&self) -> EntityId {
        EntityId::Text(format!("{}-{}", self.owner.id(), self.target.id()))
    }

    fn as_join_record(&self) -> Option<&dyn JoinRecord> {
        Some(self)
    }
}

impl JoinRecord for UserRole {
    fn owner(&self) -> EntityHandle {
        self.owner.clone()
    }

    fn target(&self) -> EntityHandle {
        self.target.clone()
    }

    fn relationship_type(&self) -> &str {
        "role"
    }

    fn reverse_relationship_type(&self) -> &str {
        "user"
    }

    fn extra_attributes(&self) -> Vec<(String, FieldValue)> {
        vec![("grantedAt".to_string(), self.granted_at.into())]
    }
}
