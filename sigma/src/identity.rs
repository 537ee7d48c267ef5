use std::{
    borrow::Cow,
    fmt::{self, Display, Write as _},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of one actor instance: its type name plus an instance key.
///
/// Identities are never mutated by storage calls; they only derive the key of
/// the backend record holding the actor's state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorIdentity {
    type_name: String,
    key: String,
}

impl ActorIdentity {
    pub fn new(type_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
        }
    }

    /// Identity with a fresh random instance key.
    pub fn random(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Uuid::new_v4().to_string())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Backend record key for this identity under the given actor type name.
    ///
    /// Each part is escaped, so distinct identities never share a key.
    pub fn record_key(&self, actor_type: &str) -> String {
        format!(
            "{}/{}:{}",
            escape(actor_type),
            escape(&self.type_name),
            escape(&self.key)
        )
    }
}

impl Display for ActorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.key)
    }
}

/// Percent-escape the separators of a record key.
fn escape(part: &str) -> Cow<'_, str> {
    if !part.contains(['/', ':', '%']) {
        return Cow::Borrowed(part);
    }

    let mut escaped = String::with_capacity(part.len() + 4);
    for c in part.chars() {
        match c {
            '/' | ':' | '%' => {
                let _ = write!(escaped, "%{:02X}", c as u8);
            }
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_includes_actor_type() {
        let id = ActorIdentity::new("Counter", "42");

        assert_eq!(id.record_key("TestStorage"), "TestStorage/Counter:42");
        assert_ne!(id.record_key("A"), id.record_key("B"));
    }

    #[test]
    fn test_separators_in_parts_do_not_collide() {
        let a = ActorIdentity::new("Order", "eu:42");
        let b = ActorIdentity::new("Order:eu", "42");
        assert_ne!(a.record_key("Store"), b.record_key("Store"));
        assert_eq!(a.record_key("Store"), "Store/Order:eu%3A42");

        let c = ActorIdentity::new("b/Order", "1");
        let d = ActorIdentity::new("Order", "1");
        assert_ne!(c.record_key("a"), d.record_key("a/b"));

        let e = ActorIdentity::new("Order", "%3A");
        let f = ActorIdentity::new("Order", ":");
        assert_ne!(e.record_key("Store"), f.record_key("Store"));
    }

    #[test]
    fn test_random_identities_differ() {
        let a = ActorIdentity::random("Counter");
        let b = ActorIdentity::random("Counter");

        assert_eq!(a.type_name(), b.type_name());
        assert_ne!(a.key(), b.key());
    }
}
