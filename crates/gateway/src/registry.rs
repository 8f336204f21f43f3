use std::{collections::HashMap, fmt};

/// One of the two occupant positions of a session, in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::First),
            1 => Some(Self::Second),
            _ => None,
        }
    }

    /// 1-based number shown to people.
    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// What a live connection is to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connected but has not sent an intent frame yet (or left).
    Unassigned,
    Monitor,
    Occupant(Slot),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => f.write_str("unassigned"),
            Self::Monitor => f.write_str("monitor"),
            Self::Occupant(slot) => write!(f, "occupant@{}", slot.number()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("role {role} is already held by {holder}")]
    RoleTaken { role: Role, holder: String },
    #[error("connection {conn_id} already holds role {role}")]
    AlreadyAssigned { conn_id: String, role: Role },
}

/// Two-way map between live connections and the roles they hold.
///
/// Each role is held by at most one connection and each connection holds
/// at most one role.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// conn_id → role
    by_conn: HashMap<String, Role>,
    /// role → conn_id (reverse lookup for exclusivity)
    by_role: HashMap<Role, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `conn_id` a role. Assigning [`Role::Unassigned`] releases it.
    pub fn assign(&mut self, conn_id: &str, role: Role) -> Result<(), AssignError> {
        if role == Role::Unassigned {
            self.release(conn_id);
            return Ok(());
        }
        if let Some(holder) = self.by_role.get(&role) {
            if holder == conn_id {
                return Ok(());
            }
            return Err(AssignError::RoleTaken {
                role,
                holder: holder.clone(),
            });
        }
        if let Some(&current) = self.by_conn.get(conn_id) {
            return Err(AssignError::AlreadyAssigned {
                conn_id: conn_id.to_string(),
                role: current,
            });
        }
        self.by_conn.insert(conn_id.to_string(), role);
        self.by_role.insert(role, conn_id.to_string());
        Ok(())
    }

    pub fn role_of(&self, conn_id: &str) -> Role {
        self.by_conn
            .get(conn_id)
            .copied()
            .unwrap_or(Role::Unassigned)
    }

    /// Drop whatever role `conn_id` holds. Safe to call repeatedly; only the
    /// first call returns the role.
    pub fn release(&mut self, conn_id: &str) -> Option<Role> {
        let role = self.by_conn.remove(conn_id)?;
        self.by_role.remove(&role);
        Some(role)
    }

    pub fn count(&self) -> usize {
        self.by_conn.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_connection_is_unassigned() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.role_of("nobody"), Role::Unassigned);
    }

    #[test]
    fn assign_and_look_up_both_ways() {
        let mut registry = ConnectionRegistry::new();
        registry.assign("a", Role::Occupant(Slot::First)).unwrap();
        registry.assign("m", Role::Monitor).unwrap();

        assert_eq!(registry.role_of("a"), Role::Occupant(Slot::First));
        assert_eq!(registry.role_of("m"), Role::Monitor);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn role_is_exclusive() {
        let mut registry = ConnectionRegistry::new();
        registry.assign("a", Role::Occupant(Slot::First)).unwrap();
        assert_eq!(
            registry.assign("b", Role::Occupant(Slot::First)),
            Err(AssignError::RoleTaken {
                role: Role::Occupant(Slot::First),
                holder: "a".into(),
            })
        );
        // Re-assigning the same pair is harmless.
        registry.assign("a", Role::Occupant(Slot::First)).unwrap();
    }

    #[test]
    fn connection_holds_one_role() {
        let mut registry = ConnectionRegistry::new();
        registry.assign("a", Role::Monitor).unwrap();
        assert!(matches!(
            registry.assign("a", Role::Occupant(Slot::First)),
            Err(AssignError::AlreadyAssigned { .. })
        ));
    }

    #[test]
    fn release_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        registry.assign("a", Role::Occupant(Slot::Second)).unwrap();
        assert_eq!(registry.release("a"), Some(Role::Occupant(Slot::Second)));
        assert_eq!(registry.release("a"), None);
        assert_eq!(registry.role_of("a"), Role::Unassigned);

        // The slot can be taken again once released.
        registry.assign("b", Role::Occupant(Slot::Second)).unwrap();
    }

    #[test]
    fn assigning_unassigned_releases() {
        let mut registry = ConnectionRegistry::new();
        registry.assign("m", Role::Monitor).unwrap();
        registry.assign("m", Role::Unassigned).unwrap();
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn slot_helpers() {
        assert_eq!(Slot::from_index(0), Some(Slot::First));
        assert_eq!(Slot::from_index(2), None);
        assert_eq!(Slot::Second.number(), 2);
        assert_eq!(Role::Occupant(Slot::Second).to_string(), "occupant@2");
    }
}
