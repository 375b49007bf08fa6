use super::{User, UserRole};

/// Who is requesting a state transition. Authorization checks are pure
/// functions of the actor and the current payment state, so there are no
/// boolean admin flags threaded through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Buyer(String),
    Seller(String),
    Admin(String),
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        match user.role {
            UserRole::Buyer => Actor::Buyer(user.id.clone()),
            UserRole::Seller => Actor::Seller(user.id.clone()),
            UserRole::Admin => Actor::Admin(user.id.clone()),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Actor::Buyer(id) | Actor::Seller(id) | Actor::Admin(id) => id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin(_))
    }
}
