//! Mock catalog and transport factory
//!
//! For detection tests without serial hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use contracts::{ContractError, DeviceCatalog, Transport, TransportError, TransportFactory};
use tracing::debug;

/// Catalog that returns scripted port lists, one per round
///
/// Once the script runs out the fallback list is returned every round.
#[derive(Debug, Default)]
pub struct MockCatalog {
    rounds: Mutex<VecDeque<Result<Vec<String>, String>>>,
    fallback: Vec<String>,
    calls: AtomicU64,
}

impl MockCatalog {
    /// Catalog that always lists `ports`
    pub fn fixed<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fallback: ports.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Queue the port list for the next unscripted round
    pub fn then<I, S>(self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Ok(ports.into_iter().map(Into::into).collect()));
        self
    }

    /// Queue an enumeration failure
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Number of `enumerate_ports` calls
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, round: Result<Vec<String>, String>) {
        match self.rounds.lock() {
            Ok(mut rounds) => rounds.push_back(round),
            Err(poisoned) => poisoned.into_inner().push_back(round),
        }
    }
}

impl DeviceCatalog for MockCatalog {
    fn enumerate_ports(&self) -> Result<Vec<String>, ContractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.rounds.lock() {
            Ok(mut rounds) => rounds.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        match next {
            Some(Ok(ports)) => Ok(ports),
            Some(Err(message)) => Err(ContractError::enumeration(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

enum Prepared<T> {
    Ready(T),
    Fail(String),
}

/// Factory handing out prepared transports by identifier
///
/// Each `open` consumes the next prepared entry for that identifier; an
/// identifier with nothing prepared fails to open.
pub struct MockFactory<T> {
    prepared: Mutex<HashMap<String, VecDeque<Prepared<T>>>>,
    opens: AtomicU64,
}

impl<T> Default for MockFactory<T> {
    fn default() -> Self {
        Self {
            prepared: Mutex::new(HashMap::new()),
            opens: AtomicU64::new(0),
        }
    }
}

impl<T> MockFactory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare `transport` for the next open of `id`
    pub fn insert(&self, id: impl Into<String>, transport: T) {
        self.prepare(id.into(), Prepared::Ready(transport));
    }

    /// Make the next open of `id` fail
    pub fn fail_next(&self, id: impl Into<String>, message: impl Into<String>) {
        self.prepare(id.into(), Prepared::Fail(message.into()));
    }

    /// Number of `open` calls
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    fn prepare(&self, id: String, entry: Prepared<T>) {
        let mut prepared = match self.prepared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        prepared.entry(id).or_default().push_back(entry);
    }

    fn take(&self, id: &str) -> Option<Prepared<T>> {
        let mut prepared = match self.prepared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        prepared.get_mut(id).and_then(VecDeque::pop_front)
    }
}

impl<T> TransportFactory for MockFactory<T>
where
    T: Transport + Sync + 'static,
{
    type Transport = T;

    async fn open(&self, id: &str) -> Result<T, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.take(id) {
            Some(Prepared::Ready(transport)) => {
                debug!(port = %id, "mock transport opened");
                Ok(transport)
            }
            Some(Prepared::Fail(message)) => Err(TransportError::open(id, message)),
            None => Err(TransportError::open(id, "no such device")),
        }
    }
}
