use once_cell::sync::Lazy;
use regex::Regex;

/// Two complete id tokens (e.g. `user_abc`) joined by a single underscore.
/// Ids are themselves prefixed tokens, so the pair must be extracted whole
/// rather than split naively on `_`.
static PRIVATE_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+_[A-Za-z0-9-]+)_([A-Za-z]+_[A-Za-z0-9-]+)$").unwrap());

/// Logical room resolved from the opaque wire key.
///
/// Wire format: `"global"`, `"group_<id>"`, `"private_<idA>_<idB>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    Global,
    Group(String),
    Private(String, String),
}

impl RoomKey {
    /// Classify an opaque room key by prefix. Total: malformed keys degrade
    /// to Global semantics instead of erroring, so unexpected input from
    /// navigation never crashes the session.
    pub fn resolve(raw: &str) -> RoomKey {
        if let Some(group_id) = raw.strip_prefix("group_") {
            if group_id.is_empty() {
                return RoomKey::Global;
            }
            return RoomKey::Group(group_id.to_string());
        }
        if let Some(pair) = raw.strip_prefix("private_") {
            if let Some(caps) = PRIVATE_PAIR_RE.captures(pair) {
                return RoomKey::private(&caps[1], &caps[2]);
            }
            return RoomKey::Global;
        }
        RoomKey::Global
    }

    /// Private room for a pair of users. The stored order is canonical so two
    /// clients produce the same key regardless of viewer identity.
    pub fn private(a: &str, b: &str) -> RoomKey {
        if a <= b {
            RoomKey::Private(a.to_string(), b.to_string())
        } else {
            RoomKey::Private(b.to_string(), a.to_string())
        }
    }

    /// Produce the wire key. Must stay bit-exact for interop with the
    /// server-side matcher.
    pub fn encode(&self) -> String {
        match self {
            RoomKey::Global => "global".to_string(),
            RoomKey::Group(id) => format!("group_{}", id),
            RoomKey::Private(a, b) => format!("private_{}_{}", a, b),
        }
    }

    /// The id in a private pair that is not `self_id`. `None` for non-private
    /// rooms or when `self_id` is not a participant.
    pub fn other_participant(&self, self_id: &str) -> Option<&str> {
        match self {
            RoomKey::Private(a, b) if a == self_id => Some(b),
            RoomKey::Private(a, b) if b == self_id => Some(a),
            _ => None,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, RoomKey::Private(..))
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_prefix() {
        assert_eq!(RoomKey::resolve("global"), RoomKey::Global);
        assert_eq!(
            RoomKey::resolve("group_42"),
            RoomKey::Group("42".to_string())
        );
        assert_eq!(
            RoomKey::resolve("private_user_abc_user_xyz"),
            RoomKey::Private("user_abc".to_string(), "user_xyz".to_string())
        );
    }

    #[test]
    fn private_round_trip() {
        let key = RoomKey::resolve("private_user_abc_user_xyz");
        assert_eq!(key.other_participant("user_abc"), Some("user_xyz"));
        assert_eq!(key.other_participant("user_xyz"), Some("user_abc"));
        assert_eq!(key.other_participant("user_other"), None);
        assert_eq!(key.encode(), "private_user_abc_user_xyz");
    }

    #[test]
    fn private_key_is_viewer_independent() {
        let a = RoomKey::private("user_xyz", "user_abc");
        let b = RoomKey::private("user_abc", "user_xyz");
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a, RoomKey::resolve(&a.encode()));
    }

    #[test]
    fn malformed_keys_fall_back_to_global() {
        assert_eq!(RoomKey::resolve(""), RoomKey::Global);
        assert_eq!(RoomKey::resolve("group_"), RoomKey::Global);
        assert_eq!(RoomKey::resolve("private_user_abc"), RoomKey::Global);
        assert_eq!(RoomKey::resolve("private_just-one-token"), RoomKey::Global);
        assert_eq!(RoomKey::resolve("something_else"), RoomKey::Global);
        assert_eq!(RoomKey::Global.other_participant("user_abc"), None);
    }
}
