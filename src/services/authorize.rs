use uuid::Uuid;

use super::todo_service::TodoError;

/// Ownership gate for single-resource operations.
///
/// `requester_id` must come from the authenticated session (JWT claims),
/// never from the request body.
pub fn require_owner(owner_id: Uuid, requester_id: Uuid) -> Result<(), TodoError> {
    if owner_id != requester_id {
        return Err(TodoError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_passes_stranger_fails() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        assert!(require_owner(owner, owner).is_ok());
        assert!(matches!(
            require_owner(owner, stranger),
            Err(TodoError::Forbidden)
        ));
    }
}
