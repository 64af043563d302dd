//! Owner-token generation
//!
//! A lock instance proves ownership of a lease by storing an opaque token at
//! the lock key and presenting the same token on release and renew. The token
//! couples the process id with the id of the current execution context, so
//! two workers in the same process still get distinct tokens. Uniqueness is
//! best-effort, not cryptographic.

/// Build the owner token for the calling execution context.
///
/// Inside a tokio task the tokio task id is used; on a plain thread the
/// thread id stands in. Call once at lock construction and reuse the result
/// for every subsequent store operation of that instance.
pub fn owner_token() -> String {
    let pid = std::process::id();
    match tokio::task::try_id() {
        Some(task_id) => format!("{pid}_{task_id}"),
        None => format!("{pid}_{:?}", std::thread::current().id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_carries_process_id() {
        let token = owner_token();
        let pid = std::process::id().to_string();
        assert!(token.starts_with(&pid));
        assert!(token.contains('_'));
    }

    #[tokio::test]
    async fn test_tokens_differ_across_tasks() {
        let a = tokio::spawn(async { owner_token() }).await.unwrap();
        let b = tokio::spawn(async { owner_token() }).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_token_stable_within_task() {
        let (a, b) = tokio::spawn(async { (owner_token(), owner_token()) })
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
