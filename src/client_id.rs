use std::fmt;
use uuid::Uuid;

/// Identifier distinguishing a session to the broker.
///
/// Must be unique per active connection. When the caller supplies none, a
/// random v4 UUID is generated at `init()` time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new random client ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use `requested` verbatim, or generate an ID when it is empty.
    pub fn or_generate(requested: &str) -> Self {
        if requested.is_empty() {
            Self::generate()
        } else {
            Self(requested.to_owned())
        }
    }

    /// Borrow the client ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_generate_unique() {
        // ---
        let id1 = ClientId::generate();
        let id2 = ClientId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generated_format() {
        // ---
        let id = ClientId::generate();
        assert_eq!(id.as_str().len(), 36); // Standard UUID format
    }

    #[test]
    fn test_or_generate_keeps_explicit_id() {
        // ---
        let id = ClientId::or_generate("sensor-7");
        assert_eq!(id.as_str(), "sensor-7");
    }

    #[test]
    fn test_or_generate_fills_empty_id() {
        // ---
        let a = ClientId::or_generate("");
        let b = ClientId::or_generate("");
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }
}
