//! The Occupant value and its identity semantics.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

/// A room's address within this service: a node-part name plus the domain
/// it belongs to (e.g. `room@conference.example.org` splits into
/// `name = "room"`, `domain = "conference.example.org"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomAddress {
    pub name: String,
    pub domain: String,
}

impl RoomAddress {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }

    /// True iff this room belongs to the named service domain.
    ///
    /// Most room-lifecycle events are filtered by this check; the
    /// nickname-kick event deliberately is not (see `event_sink`).
    pub fn belongs_to(&self, service_domain: &str) -> bool {
        self.domain == service_domain
    }
}

/// A cancellable handle to a liveness probe scheduled against an occupant.
///
/// The probe itself (the timer, the ping/pong round trip) is owned by the
/// idle-ping scheduler, which is out of scope for this registry. The
/// registry's only obligation is: when an occupant is deleted, cancel
/// whatever handle it was carrying. Cancellation is best-effort; an
/// in-flight probe may still complete after cancellation, and callers must
/// tolerate a response for an already-removed occupant.
pub trait PingHandle: Send + Sync + fmt::Debug {
    fn cancel(&self);
}

struct OccupantInner {
    room: String,
    nickname: String,
    real_address: String,
    last_active_millis: AtomicI64,
    last_ping_request_millis: AtomicI64,
    pending_ping: Mutex<Option<Arc<dyn PingHandle>>>,
}

/// One `(room, nickname, real address)` tuple present in the cluster, plus
/// local-only activity bookkeeping.
///
/// Equality and hashing consider only the three identity fields. The
/// local-only fields live behind interior mutability so that every index
/// entry referring to the same identity (there may be several, one per
/// index) observes the same mutable state: the idiomatic substitute, in a
/// language without reference-identity collections, for "the Occupant value
/// must be stored by value in both indices and located by its identity
/// triple."
#[derive(Clone)]
pub struct Occupant(Arc<OccupantInner>);

impl Occupant {
    pub fn new(room: impl Into<String>, nickname: impl Into<String>, real_address: impl Into<String>) -> Self {
        Self(Arc::new(OccupantInner {
            room: room.into(),
            nickname: nickname.into(),
            real_address: real_address.into(),
            last_active_millis: AtomicI64::new(0),
            last_ping_request_millis: AtomicI64::new(0),
            pending_ping: Mutex::new(None),
        }))
    }

    pub fn room(&self) -> &str {
        &self.0.room
    }

    pub fn nickname(&self) -> &str {
        &self.0.nickname
    }

    pub fn real_address(&self) -> &str {
        &self.0.real_address
    }

    /// Milliseconds since the Unix epoch, or `None` if never recorded.
    pub fn last_active_millis(&self) -> Option<i64> {
        match self.0.last_active_millis.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    /// Record activity now. Uses `Relaxed` ordering: idle detection doesn't
    /// need strict consistency with concurrent readers, only eventual
    /// visibility.
    pub fn touch_activity(&self, now_millis: i64) {
        self.0.last_active_millis.store(now_millis, Ordering::Relaxed);
    }

    /// Milliseconds since the Unix epoch of the last liveness probe issued
    /// locally, or `None` if never recorded.
    pub fn last_ping_request_millis(&self) -> Option<i64> {
        match self.0.last_ping_request_millis.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn record_ping_request(&self, now_millis: i64) {
        self.0
            .last_ping_request_millis
            .store(now_millis, Ordering::Relaxed);
    }

    pub fn set_pending_ping(&self, handle: Arc<dyn PingHandle>) {
        *self.0.pending_ping.lock() = Some(handle);
    }

    /// Cancel and clear any pending ping handle. Called from the store's
    /// delete phase; a no-op if none was pending.
    pub(crate) fn cancel_pending_ping(&self) {
        if let Some(handle) = self.0.pending_ping.lock().take() {
            handle.cancel();
        }
    }

    /// Build a wire-safe identity-only record for broadcast.
    pub fn record(&self) -> OccupantRecord {
        OccupantRecord {
            room: self.0.room.clone(),
            nickname: self.0.nickname.clone(),
            real_address: self.0.real_address.clone(),
        }
    }
}

impl fmt::Debug for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Occupant")
            .field("room", &self.0.room)
            .field("nickname", &self.0.nickname)
            .field("real_address", &self.0.real_address)
            .finish()
    }
}

impl PartialEq for Occupant {
    fn eq(&self, other: &Self) -> bool {
        self.0.room == other.0.room
            && self.0.nickname == other.0.nickname
            && self.0.real_address == other.0.real_address
    }
}

impl Eq for Occupant {}

impl Hash for Occupant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.room.hash(state);
        self.0.nickname.hash(state);
        self.0.real_address.hash(state);
    }
}

/// A plain identity triple, the only shape ever put on the wire. Never
/// carries the local-only fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccupantRecord {
    pub room: String,
    pub nickname: String,
    pub real_address: String,
}

impl OccupantRecord {
    pub fn new(room: impl Into<String>, nickname: impl Into<String>, real_address: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            nickname: nickname.into(),
            real_address: real_address.into(),
        }
    }

    pub fn into_occupant(self) -> Occupant {
        Occupant::new(self.room, self.nickname, self.real_address)
    }
}

impl From<&Occupant> for OccupantRecord {
    fn from(o: &Occupant) -> Self {
        o.record()
    }
}
