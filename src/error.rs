use thiserror::Error;

/// Domain errors the repositories can raise beyond plain query failures.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A row written moments ago could not be read back.
    #[error("{entity} {id} not found after write")]
    NotFoundAfterWrite { entity: &'static str, id: i64 },

    /// The user is on hold but carries no expire duration to start from.
    #[error("user {id} has no on-hold expire duration")]
    MissingOnHoldDuration { id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_row() {
        let err = RepoError::NotFoundAfterWrite {
            entity: "user",
            id: 7,
        };
        assert_eq!(err.to_string(), "user 7 not found after write");

        let err = RepoError::MissingOnHoldDuration { id: 12 };
        assert_eq!(err.to_string(), "user 12 has no on-hold expire duration");
    }
}
