//! Atomic check-and-act scripts
//!
//! The release and renew halves of the protocol must compare the stored token
//! and act in one atomic step at the store. The two operations are fixed; a
//! wire backend that supports server-side scripting runs the Lua body, while
//! [`MemoryStore`](crate::MemoryStore) interprets the variant natively.

/// Check-and-delete: keys = [lock key], args = [owner token].
const CHECK_AND_DELETE_SRC: &str = r#"
local key = KEYS[1]
local target = ARGV[1]
local held = redis.call("GET", key)

if (not held or held ~= target) then
    return 0
else
    return redis.call("DEL", key)
end
"#;

/// Check-and-refresh: keys = [lock key], args = [owner token, ttl seconds].
const CHECK_AND_REFRESH_SRC: &str = r#"
local key = KEYS[1]
local target = ARGV[1]
local duration = ARGV[2]
local held = redis.call("GET", key)

if (not held or held ~= target) then
    return 0
else
    return redis.call("EXPIRE", key, duration)
end
"#;

/// The two scripted operations the lock protocol performs.
///
/// Both return 1 when the caller held the lease and the action was taken,
/// and 0 when the stored value was absent or owned by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicScript {
    /// Delete the key iff it still holds the caller's token.
    CheckAndDelete,
    /// Reset the key's TTL iff it still holds the caller's token.
    CheckAndRefresh,
}

impl AtomicScript {
    /// The script body, for backends that execute scripts server-side.
    pub fn source(self) -> &'static str {
        match self {
            AtomicScript::CheckAndDelete => CHECK_AND_DELETE_SRC,
            AtomicScript::CheckAndRefresh => CHECK_AND_REFRESH_SRC,
        }
    }

    /// Number of arguments the script expects after the key.
    pub fn arity(self) -> usize {
        match self {
            AtomicScript::CheckAndDelete => 1,
            AtomicScript::CheckAndRefresh => 2,
        }
    }
}
