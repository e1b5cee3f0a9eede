//! HTTP handlers for the `/api/v1` surface

pub mod chats;
pub mod models;
pub mod providers;
pub mod response;
pub mod state;

use uuid::Uuid;

use agenty_core::{BusinessError, ServiceError};

/// Parse a path id, mapping garbage to a 400 business error instead of a
/// bare transport rejection.
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, ServiceError> {
    raw.parse::<Uuid>()
        .map_err(|_| BusinessError::invalid_params(format!("invalid id: {}", raw)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_uuid_parses() {
        let id = Uuid::now_v7();
        assert_eq!(parse_uuid(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn invalid_uuid_is_a_business_error() {
        let err = parse_uuid("not-a-uuid").unwrap_err();
        assert_eq!(err.business().unwrap().code, 400);
    }
}
