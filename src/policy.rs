//! policy.rs
//!
//! Правила доступа к ресурсам планетария.
//!
//! Каждая политика - чистый предикат над (действие, положение актора).
//! Политики уровня класса проверяются до поиска записи, политики уровня
//! экземпляра - после того как запись найдена. Списки политик объединяются по AND.

use std::fmt;

/// Действие над ресурсом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    Destroy,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::List,
        Action::Create,
        Action::Retrieve,
        Action::Update,
        Action::Destroy,
    ];

    pub fn is_read(self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Retrieve => "retrieve",
            Action::Update => "update",
            Action::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Кто делает запрос.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User { id: i64, is_staff: bool },
}

impl Actor {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Actor::Anonymous => None,
            Actor::User { id, .. } => Some(*id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User { .. })
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::User { is_staff: true, .. })
    }

    fn role(&self) -> Role {
        match self {
            Actor::Anonymous => Role::Anonymous,
            Actor::User { is_staff: false, .. } => Role::Member,
            Actor::User { is_staff: true, .. } => Role::Staff,
        }
    }

    /// Положение актора относительно конкретной записи. Staff важнее владения.
    fn standing(&self, owner: Option<i64>) -> Standing {
        match self {
            Actor::Anonymous => Standing::Anonymous,
            Actor::User { is_staff: true, .. } => Standing::Staff,
            Actor::User { id, .. } if owner == Some(*id) => Standing::Owner,
            Actor::User { .. } => Standing::Stranger,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Anonymous => f.write_str("anonymous"),
            Actor::User { id, is_staff: true } => write!(f, "staff#{id}"),
            Actor::User { id, is_staff: false } => write!(f, "user#{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Anonymous,
    Member,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Anonymous,
    Stranger,
    Owner,
    Staff,
}

/// Политика доступа.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Любое действие, если актор аутентифицирован.
    Authenticated,
    /// Чтение для аутентифицированных, запись запрещена всем.
    ReadOnlyIfAuthenticated,
    /// Чтение для аутентифицированных, create/update только staff, остальное запрещено.
    StaffWriteAuthenticatedRead,
    /// Экземпляр: чтение для аутентифицированных, остальное - владелец или staff.
    OwnerOrStaffInstance,
    /// Экземпляр: любое действие, включая чтение, - владелец или staff.
    OwnerOrStaffPrivate,
}

impl Policy {
    /// Проверка уровня класса. Политики экземпляра здесь ничего не ограничивают.
    pub fn has_permission(self, actor: &Actor, action: Action) -> bool {
        let role = actor.role();
        match self {
            Policy::Authenticated => role != Role::Anonymous,
            Policy::ReadOnlyIfAuthenticated => action.is_read() && role != Role::Anonymous,
            Policy::StaffWriteAuthenticatedRead => match (action, role) {
                (_, Role::Anonymous) => false,
                (Action::List | Action::Retrieve, _) => true,
                (Action::Create | Action::Update, Role::Staff) => true,
                _ => false,
            },
            Policy::OwnerOrStaffInstance | Policy::OwnerOrStaffPrivate => true,
        }
    }

    /// Проверка уровня экземпляра; `owner` - id владельца записи, если он есть.
    pub fn has_object_permission(self, actor: &Actor, action: Action, owner: Option<i64>) -> bool {
        let standing = actor.standing(owner);
        match self {
            Policy::OwnerOrStaffInstance => match (action.is_read(), standing) {
                (_, Standing::Anonymous) => false,
                (true, _) => true,
                (false, Standing::Owner | Standing::Staff) => true,
                (false, Standing::Stranger) => false,
            },
            Policy::OwnerOrStaffPrivate => matches!(standing, Standing::Owner | Standing::Staff),
            Policy::Authenticated
            | Policy::ReadOnlyIfAuthenticated
            | Policy::StaffWriteAuthenticatedRead => true,
        }
    }
}

/// Причина отказа: нет учётных данных или их недостаточно.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
}

fn deny(actor: &Actor) -> Denial {
    if actor.is_authenticated() {
        Denial::Forbidden
    } else {
        Denial::Unauthenticated
    }
}

/// Проверка уровня класса по всем политикам обработчика.
pub fn evaluate(policies: &[Policy], actor: &Actor, action: Action) -> Result<(), Denial> {
    match policies.iter().find(|policy| !policy.has_permission(actor, action)) {
        Some(policy) => {
            tracing::debug!(%actor, %action, ?policy, "class-level policy denied");
            Err(deny(actor))
        }
        None => Ok(()),
    }
}

/// Проверка уровня экземпляра. Вызывается только для уже найденной записи.
pub fn evaluate_instance(
    policies: &[Policy],
    actor: &Actor,
    action: Action,
    owner: Option<i64>,
) -> Result<(), Denial> {
    match policies
        .iter()
        .find(|policy| !policy.has_object_permission(actor, action, owner))
    {
        Some(policy) => {
            tracing::debug!(%actor, %action, ?owner, ?policy, "instance-level policy denied");
            Err(deny(actor))
        }
        None => Ok(()),
    }
}
