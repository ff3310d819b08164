//! Opaque entity identifiers.

use uuid::Uuid;

/// Mints a fresh UUID v4 string.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_uuid_shaped() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
