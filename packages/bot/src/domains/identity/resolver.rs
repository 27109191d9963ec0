//! Identity and ticket resolution.
//!
//! Entering a drawing requires a resolvable external identity: either one
//! already on file, or one resolved now from a supplied profile link. A
//! failed resolution mutates nothing, neither the stored mapping nor the
//! entry pool.

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::common::{ChatIdentity, ExternalIdentity};
use crate::domains::drawing::{DrawingError, DrawingMachine};
use crate::kernel::BotDeps;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no profile on file for {0}; include your profile link")]
    NoProfileOnFile(ChatIdentity),

    #[error("profile resolution failed: {0}")]
    ResolutionFailed(String),

    #[error(transparent)]
    Drawing(#[from] DrawingError),

    #[error("storage error: {0}")]
    Store(anyhow::Error),
}

impl ResolveError {
    pub fn is_user_error(&self) -> bool {
        match self {
            ResolveError::NoProfileOnFile(_) => true,
            ResolveError::ResolutionFailed(_) => true,
            ResolveError::Drawing(e) => e.is_user_error(),
            ResolveError::Store(_) => false,
        }
    }
}

/// Resolve a chat identity to its external identity and enter it into the
/// channel's drawing with its ticket weight.
///
/// Resolution and the mapping upsert run outside the machine lock so slow
/// profile lookups never block the channel's other operations.
pub async fn resolve_and_enter(
    machine: &Mutex<DrawingMachine>,
    deps: &BotDeps,
    chat_identity: &ChatIdentity,
    profile_link: Option<&str>,
    is_privileged: bool,
) -> Result<ExternalIdentity, ResolveError> {
    let external = match profile_link {
        Some(link) => {
            let external = deps.resolver.resolve(link).await.map_err(|e| {
                warn!(identity = %chat_identity, link, "profile resolution failed: {e}");
                ResolveError::ResolutionFailed(e.to_string())
            })?;

            deps.identities
                .upsert_user(chat_identity, &external)
                .await
                .map_err(ResolveError::Store)?;

            debug!(identity = %chat_identity, external = %external, "identity mapping upserted");
            external
        }
        None => deps
            .identities
            .find_user(chat_identity)
            .await
            .map_err(ResolveError::Store)?
            .ok_or_else(|| ResolveError::NoProfileOnFile(chat_identity.clone()))?,
    };

    let weight = if is_privileged {
        deps.ticket_multiplier
    } else {
        1
    };

    machine.lock().await.enter(chat_identity, weight).await?;

    Ok(external)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::common::Channel;
    use crate::domains::drawing::BaseDrawingStore;
    use crate::kernel::{
        MemoryStore, MockChatTransport, MockProfileResolver, MockRoomTransport,
    };

    fn deps_with(
        store: Arc<MemoryStore>,
        resolver: Arc<MockProfileResolver>,
    ) -> BotDeps {
        BotDeps::new(
            Arc::clone(&store) as Arc<dyn BaseDrawingStore>,
            store,
            Arc::new(MockChatTransport::new()),
            Arc::new(MockRoomTransport::new()),
            resolver,
            3,
            Duration::from_secs(30),
            ExternalIdentity::from("main"),
            ExternalIdentity::from("bot"),
        )
    }

    async fn open_machine(store: Arc<MemoryStore>) -> Mutex<DrawingMachine> {
        let mut machine = DrawingMachine::restore(
            Channel::from("#demo"),
            store,
            Arc::new(MockChatTransport::new()),
            Duration::from_secs(30),
        )
        .await
        .unwrap();
        machine.open().await.unwrap();
        Mutex::new(machine)
    }

    #[tokio::test]
    async fn first_use_without_link_reports_no_profile() {
        let store = Arc::new(MemoryStore::new());
        let deps = deps_with(Arc::clone(&store), Arc::new(MockProfileResolver::new()));
        let machine = open_machine(store).await;

        let err = resolve_and_enter(
            &machine,
            &deps,
            &ChatIdentity::from("alice"),
            None,
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ResolveError::NoProfileOnFile(_)));
        assert!(machine.lock().await.pool().is_empty());
    }

    #[tokio::test]
    async fn failed_resolution_mutates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let deps = deps_with(Arc::clone(&store), Arc::new(MockProfileResolver::new()));
        let machine = open_machine(Arc::clone(&store)).await;

        let alice = ChatIdentity::from("alice");
        let err = resolve_and_enter(
            &machine,
            &deps,
            &alice,
            Some("https://example.org/bad"),
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ResolveError::ResolutionFailed(_)));
        assert!(machine.lock().await.pool().is_empty());
        assert!(deps.identities.find_user(&alice).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_resolution_upserts_and_enters() {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(
            MockProfileResolver::new()
                .with_identity("https://example.org/alice", ExternalIdentity::from("ext-a")),
        );
        let deps = deps_with(Arc::clone(&store), resolver);
        let machine = open_machine(Arc::clone(&store)).await;

        let alice = ChatIdentity::from("alice");
        let external = resolve_and_enter(
            &machine,
            &deps,
            &alice,
            Some("https://example.org/alice"),
            false,
        )
        .await
        .unwrap();

        assert_eq!(external, ExternalIdentity::from("ext-a"));
        assert_eq!(
            deps.identities.find_user(&alice).await.unwrap(),
            Some(ExternalIdentity::from("ext-a"))
        );
        assert_eq!(machine.lock().await.pool().len(), 1);
    }

    #[tokio::test]
    async fn stored_mapping_is_used_when_no_link_given() {
        let store = Arc::new(
            MemoryStore::new()
                .with_user(ChatIdentity::from("bob"), ExternalIdentity::from("ext-b")),
        );
        let deps = deps_with(Arc::clone(&store), Arc::new(MockProfileResolver::new()));
        let machine = open_machine(Arc::clone(&store)).await;

        let external = resolve_and_enter(
            &machine,
            &deps,
            &ChatIdentity::from("bob"),
            None,
            false,
        )
        .await
        .unwrap();

        assert_eq!(external, ExternalIdentity::from("ext-b"));
        assert_eq!(machine.lock().await.pool().len(), 1);
    }

    #[tokio::test]
    async fn privileged_identity_gets_multiplier_tickets() {
        let store = Arc::new(
            MemoryStore::new()
                .with_user(ChatIdentity::from("sub"), ExternalIdentity::from("ext-s")),
        );
        let deps = deps_with(Arc::clone(&store), Arc::new(MockProfileResolver::new()));
        let machine = open_machine(Arc::clone(&store)).await;

        resolve_and_enter(&machine, &deps, &ChatIdentity::from("sub"), None, true)
            .await
            .unwrap();

        assert_eq!(machine.lock().await.pool().len(), 3);
    }

    #[tokio::test]
    async fn new_link_replaces_stored_mapping() {
        let store = Arc::new(
            MemoryStore::new()
                .with_user(ChatIdentity::from("carol"), ExternalIdentity::from("old")),
        );
        let resolver = Arc::new(
            MockProfileResolver::new()
                .with_identity("https://example.org/carol", ExternalIdentity::from("new")),
        );
        let deps = deps_with(Arc::clone(&store), resolver);
        let machine = open_machine(Arc::clone(&store)).await;

        let carol = ChatIdentity::from("carol");
        resolve_and_enter(
            &machine,
            &deps,
            &carol,
            Some("https://example.org/carol"),
            false,
        )
        .await
        .unwrap();

        assert_eq!(
            deps.identities.find_user(&carol).await.unwrap(),
            Some(ExternalIdentity::from("new"))
        );
    }
}
