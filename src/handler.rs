use crate::error::HttpError;
use uuid::Uuid;

pub mod auth;
pub mod movie;
pub mod review;
pub mod users;
pub mod watchlist;

/// Validate the shape of an object-id path parameter before any lookup.
pub(crate) fn parse_object_id(raw: &str, name: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw).map_err(|_| HttpError::bad_request(format!("Invalid {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_id_parses() {
        let id = Uuid::new_v4();
        assert_eq!(parse_object_id(&id.to_string(), "id").unwrap(), id);
    }

    #[test]
    fn malformed_id_is_a_client_error() {
        let err = parse_object_id("not-a-uuid", "movieId").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid movieId");
    }
}
