pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Client-assigned placeholder id used until the server supplies a real one,
/// e.g. `temp-1712345678901` for an optimistic user message or
/// `resp-1712345678901` for an in-flight assistant reply.
pub fn temp_id(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn new_id_is_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn temp_id_has_prefix() {
        let id = temp_id("temp");
        assert!(id.starts_with("temp-"));
        let millis: i64 = id["temp-".len()..].parse().unwrap();
        assert!(millis > 0);
    }

    #[test]
    fn temp_id_resp_prefix() {
        let id = temp_id("resp");
        assert!(id.starts_with("resp-"));
    }
}
