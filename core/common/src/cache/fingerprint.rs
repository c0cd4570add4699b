// core/common/src/cache/fingerprint.rs
// Deterministic call fingerprints used as cache key components

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 12;

/// Operations named like reads skip their receiver when fingerprinting.
pub const READ_PREFIX: &str = "get_";

/// Arguments of one logical call, captured as JSON.
///
/// Named arguments live in a `BTreeMap`, so their order is always sorted by
/// name regardless of insertion order.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    receiver: Option<Value>,
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
    unserializable: bool,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle the operation runs against (connection, session, repository).
    pub fn receiver<T: Serialize>(mut self, value: T) -> Self {
        self.receiver = self.capture(value);
        self
    }

    pub fn arg<T: Serialize>(mut self, value: T) -> Self {
        if let Some(v) = self.capture(value) {
            self.positional.push(v);
        }
        self
    }

    pub fn named<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Self {
        if let Some(v) = self.capture(value) {
            self.named.insert(name.into(), v);
        }
        self
    }

    /// False when some argument could not be represented as JSON; such a
    /// call cannot be fingerprinted and must bypass the cache.
    pub fn is_cacheable(&self) -> bool {
        !self.unserializable
    }

    fn capture<T: Serialize>(&mut self, value: T) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "Cache argument is not serializable");
                self.unserializable = true;
                None
            }
        }
    }

    fn canonical(&self, op_name: &str) -> String {
        let mut positional = Vec::with_capacity(self.positional.len() + 1);
        if let Some(receiver) = &self.receiver {
            if !op_name.starts_with(READ_PREFIX) {
                positional.push(receiver.clone());
            }
        }
        positional.extend(self.positional.iter().cloned());

        format!(
            "{}|{}|{}",
            op_name,
            Value::Array(positional),
            serde_json::to_string(&self.named).unwrap_or_default()
        )
    }
}

/// Truncated SHA-256 over the operation name and its canonical arguments.
/// Collisions between distinct calls are possible but not defended against.
pub fn fingerprint(op_name: &str, args: &CallArgs, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(args.canonical(op_name).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..len.min(digest.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("nope"))
        }
    }

    #[test]
    fn test_identical_calls_match() {
        let a = CallArgs::new().arg(5).named("date", "2025-10-01");
        let b = CallArgs::new().arg(5).named("date", "2025-10-01");
        assert_eq!(
            fingerprint("fetch", &a, FINGERPRINT_LEN),
            fingerprint("fetch", &b, FINGERPRINT_LEN)
        );
        assert_eq!(fingerprint("fetch", &a, FINGERPRINT_LEN).len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_named_args_order_is_irrelevant() {
        let a = CallArgs::new().named("a", 1).named("b", 2);
        let b = CallArgs::new().named("b", 2).named("a", 1);
        assert_eq!(fingerprint("op", &a, 12), fingerprint("op", &b, 12));
    }

    #[test]
    fn test_distinct_calls_differ() {
        let five = CallArgs::new().arg(5);
        let six = CallArgs::new().arg(6);
        assert_ne!(fingerprint("fetch", &five, 12), fingerprint("fetch", &six, 12));
        assert_ne!(fingerprint("fetch", &five, 12), fingerprint("other", &five, 12));
    }

    #[test]
    fn test_receiver_skipped_for_reads() {
        let a = CallArgs::new().receiver("conn-1").arg(10);
        let b = CallArgs::new().receiver("conn-2").arg(10);
        assert_eq!(
            fingerprint("get_treatment", &a, 12),
            fingerprint("get_treatment", &b, 12)
        );
        assert_ne!(
            fingerprint("update_treatment", &a, 12),
            fingerprint("update_treatment", &b, 12)
        );
    }

    #[test]
    fn test_unserializable_argument() {
        let args = CallArgs::new().arg(1).arg(Unserializable);
        assert!(!args.is_cacheable());
        assert!(CallArgs::new().arg(1).is_cacheable());
    }
}
