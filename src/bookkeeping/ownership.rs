use super::domain::{Resource, UserId};

/// The outcome of checking a requester's access to a single resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    Allow,
    NotFound,
    Forbidden,
}

/// Decide whether `requester` may act on `resource`.
///
/// Existence is checked before ownership, so a missing resource is always
/// reported as missing regardless of who asks. A resource without an owner is
/// accessible to nobody.
pub fn authorize<R: Resource>(resource: Option<&R>, requester: &UserId) -> Access {
    match resource {
        None => Access::NotFound,
        Some(resource) => match resource.owner() {
            Some(owner) if owner == requester => Access::Allow,
            _ => Access::Forbidden,
        },
    }
}
