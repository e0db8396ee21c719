use std::sync::Arc;

use tokio::sync::watch;

/// The signed-in state shared by every client component.
///
/// Cloning shares the same token; subscribers are woken whenever it is set
/// or cleared.
#[derive(Debug, Clone)]
pub struct SessionContext {
    token: Arc<watch::Sender<Option<String>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        let (token, _) = watch::channel(None);
        Self {
            token: Arc::new(token),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.token.send_replace(Some(token.into()));
    }

    pub fn clear(&self) {
        self.token.send_replace(None);
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Receiver that observes every later token change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_token() {
        let session = SessionContext::new();
        let other = session.clone();

        session.set_token("abc");
        assert_eq!(other.token().as_deref(), Some("abc"));

        other.clear();
        assert!(!session.is_signed_in());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let session = SessionContext::new();
        let mut changes = session.subscribe();

        session.set_token("first");
        changes.changed().await.expect("sender alive");
        assert_eq!(changes.borrow_and_update().as_deref(), Some("first"));

        session.clear();
        changes.changed().await.expect("sender alive");
        assert_eq!(*changes.borrow_and_update(), None);
    }
}
