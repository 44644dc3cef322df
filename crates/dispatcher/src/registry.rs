//! HandlerRegistry - prefix routing table
//!
//! Built once through [`HandlerRegistryBuilder`] and immutable afterwards.
//! Re-registration at runtime goes through [`RegistryHandle::replace`], which
//! swaps a whole new snapshot in; dispatches that already took a snapshot keep
//! using the old one.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use contracts::split_prefix;

use crate::error::HandlerError;

/// Future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Message handler: full decoded message in, success or failure out
pub type MessageHandler = Arc<dyn Fn(String) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`MessageHandler`]
pub fn handler_fn<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |message| Box::pin(f(message)))
}

/// Builder for [`HandlerRegistry`]
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    keyed: HashMap<String, MessageHandler>,
    default: Option<MessageHandler>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under an exact `prefix`; a later registration of the
    /// same prefix replaces the earlier one
    pub fn register(mut self, prefix: impl Into<String>, handler: MessageHandler) -> Self {
        self.keyed.insert(prefix.into(), handler);
        self
    }

    /// Set the handler used when no prefix matches
    pub fn set_default(mut self, handler: MessageHandler) -> Self {
        self.default = Some(handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            keyed: self.keyed,
            default: self.default,
        }
    }
}

/// Immutable prefix -> handler table with an optional default
pub struct HandlerRegistry {
    keyed: HashMap<String, MessageHandler>,
    default: Option<MessageHandler>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// Empty registry; every message is unroutable
    pub fn empty() -> Self {
        HandlerRegistryBuilder::new().build()
    }

    /// Resolve the handler for `message`
    ///
    /// Exact match on the prefix first, then the default handler. `None`
    /// means the message is unroutable.
    pub fn resolve(&self, message: &[u8]) -> Option<&MessageHandler> {
        std::str::from_utf8(split_prefix(message))
            .ok()
            .and_then(|prefix| self.keyed.get(prefix))
            .or(self.default.as_ref())
    }

    /// Registered prefixes
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.keyed.keys().map(String::as_str)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<_> = self.prefixes().collect();
        prefixes.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("prefixes", &prefixes)
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// Shared, swappable registry snapshot
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<HandlerRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<HandlerRegistry> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Atomically install a new registry, returning the previous snapshot
    pub fn replace(&self, registry: HandlerRegistry) -> Arc<HandlerRegistry> {
        let next = Arc::new(registry);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> MessageHandler {
        handler_fn(move |message| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{tag}:{message}"));
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_keyed_match_gets_full_message() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::builder()
            .register("PING", recording("ping", log.clone()))
            .build();

        let handler = registry.resolve(b"PING 123").unwrap();
        handler("PING 123".to_string()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["ping:PING 123"]);
    }

    #[test]
    fn test_exact_match_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::builder()
            .register("PING", recording("ping", log))
            .build();

        assert!(registry.resolve(b"PINGER 1").is_none());
        assert!(registry.resolve(b"PIN").is_none());
        assert!(registry.resolve(b"PING").is_some());
        assert!(registry.resolve(b"PING\tx").is_some());
    }

    #[tokio::test]
    async fn test_miss_falls_back_to_default() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::builder()
            .register("PING", recording("ping", log.clone()))
            .set_default(recording("default", log.clone()))
            .build();

        let handler = registry.resolve(b"customCommand arg").unwrap();
        handler("customCommand arg".to_string()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["default:customCommand arg"]);
    }

    #[test]
    fn test_no_default_is_unroutable() {
        let registry = HandlerRegistry::empty();
        assert!(registry.resolve(b"anything").is_none());
        assert!(registry.resolve(b"").is_none());
    }

    #[test]
    fn test_invalid_utf8_prefix_uses_default() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::builder()
            .set_default(recording("default", log))
            .build();
        assert!(registry.resolve(&[0xff, 0xfe, b' ', b'x']).is_some());
    }

    #[test]
    fn test_replace_swaps_snapshot() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = RegistryHandle::new(HandlerRegistry::empty());
        let before = handle.snapshot();

        let previous = handle.replace(
            HandlerRegistry::builder()
                .register("STATUS", recording("status", log))
                .build(),
        );

        assert!(Arc::ptr_eq(&before, &previous));
        assert!(before.resolve(b"STATUS ok").is_none());
        assert!(handle.snapshot().resolve(b"STATUS ok").is_some());
    }
}
