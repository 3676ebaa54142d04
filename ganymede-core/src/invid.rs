// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invariant object identifiers.
//!
//! Every object in the directory database is identified by an [`Invid`], a pair of an object type
//! code and an object number. Invids are immutable and compare structurally, which makes them
//! usable as persistent object pointers between server, wire and client.
//!
//! Since bulk queries create very large numbers of identical Invids, an [`InvidAllocator`] can be
//! registered to canonicalise them: with an allocator in place two structurally equal Invids
//! handed out by the factory methods share the same allocation.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use thiserror::Error;
use tracing::trace;

use crate::pool::ReleaseQueue;

/// Size of the binary representation of an Invid.
///
/// The type code is written as a big-endian `i16` followed by the object number as a big-endian
/// `i32`.
pub const INVID_LEN: usize = 6;

static ALLOCATOR: RwLock<Option<Arc<dyn InvidAllocator>>> = RwLock::new(None);

static CREATED: AtomicUsize = AtomicUsize::new(0);

static REUSED: AtomicUsize = AtomicUsize::new(0);

/// Pooling strategy used to canonicalise structurally equal Invids.
pub trait InvidAllocator: Send + Sync {
    /// Returns the pooled instance which is structurally equal to `invid`, if there is one.
    fn find_invid(&self, invid: &Invid) -> Option<Invid>;

    /// Places `invid` in the pool so that later lookups can return it.
    fn store_invid(&self, invid: &Invid);

    /// Returns the canonical instance for `invid`, storing `invid` itself when no equal instance
    /// is pooled yet.
    fn intern(&self, invid: &Invid) -> Invid {
        match self.find_invid(invid) {
            Some(found) => found,
            None => {
                self.store_invid(invid);
                invid.clone()
            }
        }
    }
}

pub(crate) struct InvidInner {
    type_id: i16,
    num: i32,
    interned: AtomicBool,
    // Queues of every pool this instance was stored in.
    release: Mutex<Vec<Weak<ReleaseQueue>>>,
}

impl Drop for InvidInner {
    fn drop(&mut self) {
        let hash = hash_code(self.type_id, self.num);
        let queues = self.release.get_mut().unwrap_or_else(PoisonError::into_inner);
        for queue in queues.iter().filter_map(Weak::upgrade) {
            queue.push(hash);
        }
    }
}

/// Immutable object identifier made of an object type code and an object number.
#[derive(Clone)]
pub struct Invid(Arc<InvidInner>);

impl Invid {
    /// Returns an Invid for the given object type and number.
    ///
    /// If an allocator was registered with [`Invid::set_allocator`] the returned Invid is the
    /// canonical pooled instance.
    pub fn new(type_id: i16, num: i32) -> Self {
        InvidFactory::global().create(type_id, num)
    }

    /// Parses an Invid from its `type:num` string form, for example `5:134`.
    pub fn parse(value: &str) -> Result<Self, InvidError> {
        InvidFactory::global().parse(value)
    }

    /// Reads an Invid from its binary representation.
    pub fn read(bytes: &[u8]) -> Result<Self, InvidError> {
        InvidFactory::global().read(bytes)
    }

    /// Returns the canonical pooled instance for this Invid.
    ///
    /// Calling `intern` on an already interned Invid or when no allocator is registered returns
    /// the Invid itself.
    pub fn intern(&self) -> Self {
        InvidFactory::global().intern(self)
    }

    /// Registers the process-wide allocator used by [`Invid::new`] and friends.
    pub fn set_allocator(allocator: Arc<dyn InvidAllocator>) {
        let mut slot = ALLOCATOR.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(allocator);
    }

    /// Removes the process-wide allocator, Invids are not pooled anymore afterwards.
    pub fn clear_allocator() {
        let mut slot = ALLOCATOR.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Returns true if a process-wide allocator is registered.
    pub fn has_allocator() -> bool {
        ALLOCATOR
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Diagnostic counters of created and reused Invids.
    pub fn counters() -> InvidCounters {
        InvidCounters {
            created: CREATED.load(Ordering::Relaxed),
            reused: REUSED.load(Ordering::Relaxed),
        }
    }

    fn unpooled(type_id: i16, num: i32) -> Self {
        Self(Arc::new(InvidInner {
            type_id,
            num,
            interned: AtomicBool::new(false),
            release: Mutex::new(Vec::new()),
        }))
    }

    /// Object type code.
    pub fn type_id(&self) -> i16 {
        self.0.type_id
    }

    /// Object number within its type.
    pub fn num(&self) -> i32 {
        self.0.num
    }

    /// Returns true if this instance was placed in an allocator pool.
    pub fn is_interned(&self) -> bool {
        self.0.interned.load(Ordering::Acquire)
    }

    /// Returns true if both handles point at the very same instance.
    pub fn ptr_eq(&self, other: &Invid) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Hash code used to place Invids in pool buckets.
    ///
    /// Object numbers are allocated incrementally from zero, so the type code is shifted to the
    /// upper bits to keep Invids of different types from colliding at the low end.
    pub fn hash_code(&self) -> i32 {
        hash_code(self.0.type_id, self.0.num)
    }

    /// Binary representation of this Invid.
    pub fn to_bytes(&self) -> [u8; INVID_LEN] {
        let mut bytes = [0; INVID_LEN];
        bytes[..2].copy_from_slice(&self.0.type_id.to_be_bytes());
        bytes[2..].copy_from_slice(&self.0.num.to_be_bytes());
        bytes
    }

    /// Appends the binary representation of this Invid to `buf`.
    pub fn emit(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes());
    }

    pub(crate) fn downgrade(&self) -> WeakInvid {
        WeakInvid(Arc::downgrade(&self.0))
    }

    pub(crate) fn attach_release(&self, queue: &Arc<ReleaseQueue>) {
        let mut queues = self
            .0
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Forget pools which are gone already.
        queues.retain(|attached| attached.strong_count() > 0);
        if !queues
            .iter()
            .any(|attached| std::ptr::eq(attached.as_ptr(), Arc::as_ptr(queue)))
        {
            queues.push(Arc::downgrade(queue));
        }
    }

    fn mark_interned(&self) {
        self.0.interned.store(true, Ordering::Release);
    }
}

pub(crate) fn hash_code(type_id: i16, num: i32) -> i32 {
    (i32::from(type_id) << 23) ^ num
}

/// Non-owning reference to a pooled Invid.
pub(crate) struct WeakInvid(Weak<InvidInner>);

impl WeakInvid {
    pub(crate) fn upgrade(&self) -> Option<Invid> {
        self.0.upgrade().map(Invid)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for Invid {
    fn eq(&self, other: &Self) -> bool {
        self.0.type_id == other.0.type_id && self.0.num == other.0.num
    }
}

impl Eq for Invid {}

impl Hash for Invid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.type_id.hash(state);
        self.0.num.hash(state);
    }
}

impl PartialOrd for Invid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Invid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.type_id, self.0.num).cmp(&(other.0.type_id, other.0.num))
    }
}

impl fmt::Display for Invid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.type_id, self.0.num)
    }
}

impl fmt::Debug for Invid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Invid").field(&format_args!("{}", self)).finish()
    }
}

impl FromStr for Invid {
    type Err = InvidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<&[u8]> for Invid {
    type Error = InvidError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::read(value)
    }
}

/// Snapshot of the Invid creation counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvidCounters {
    /// Number of distinct Invid instances handed out by the factories.
    pub created: usize,

    /// Number of times a pooled instance was handed out instead of a fresh one.
    pub reused: usize,
}

/// Creates Invids, canonicalising them through an optional allocator.
///
/// [`InvidFactory::global`] uses the process-wide allocator, other factories carry their own so
/// that independent pools can live side by side.
#[derive(Clone, Default)]
pub struct InvidFactory {
    allocator: Option<Arc<dyn InvidAllocator>>,
}

impl InvidFactory {
    /// Factory which never pools Invids.
    pub fn new() -> Self {
        Self { allocator: None }
    }

    /// Factory which canonicalises every Invid through `allocator`.
    pub fn with_allocator(allocator: Arc<dyn InvidAllocator>) -> Self {
        Self {
            allocator: Some(allocator),
        }
    }

    /// Factory using the process-wide allocator, if one is registered.
    pub fn global() -> Self {
        let allocator = ALLOCATOR
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self { allocator }
    }

    pub fn has_allocator(&self) -> bool {
        self.allocator.is_some()
    }

    /// Returns an Invid for the given object type and number.
    pub fn create(&self, type_id: i16, num: i32) -> Invid {
        let invid = Invid::unpooled(type_id, num);

        match self.allocator {
            Some(_) => self.intern(&invid),
            None => {
                CREATED.fetch_add(1, Ordering::Relaxed);
                invid
            }
        }
    }

    /// Returns the canonical instance for `invid`.
    pub fn intern(&self, invid: &Invid) -> Invid {
        let Some(allocator) = &self.allocator else {
            return invid.clone();
        };

        if invid.is_interned() {
            return invid.clone();
        }

        let canonical = allocator.intern(invid);
        if canonical.ptr_eq(invid) {
            invid.mark_interned();
            CREATED.fetch_add(1, Ordering::Relaxed);
        } else {
            trace!(%invid, "reusing interned invid");
            REUSED.fetch_add(1, Ordering::Relaxed);
        }

        canonical
    }

    /// Parses an Invid from its `type:num` string form.
    pub fn parse(&self, value: &str) -> Result<Invid, InvidError> {
        let Some((type_str, num_str)) = value.split_once(':') else {
            return Err(InvidError::InvalidFormat(value.to_string()));
        };

        let type_id = type_str
            .parse::<i16>()
            .map_err(|_| InvidError::InvalidNumber(value.to_string()))?;
        let num = num_str
            .parse::<i32>()
            .map_err(|_| InvidError::InvalidNumber(value.to_string()))?;

        Ok(self.create(type_id, num))
    }

    /// Reads an Invid from its binary representation.
    pub fn read(&self, bytes: &[u8]) -> Result<Invid, InvidError> {
        if bytes.len() < INVID_LEN {
            return Err(InvidError::InvalidLength(bytes.len(), INVID_LEN));
        }

        let type_id = i16::from_be_bytes([bytes[0], bytes[1]]);
        let num = i32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

        Ok(self.create(type_id, num))
    }
}

impl fmt::Debug for InvidFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvidFactory")
            .field("pooled", &self.allocator.is_some())
            .finish()
    }
}

/// Error types for `Invid` struct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvidError {
    /// Invid string is missing the `:` separator.
    #[error("invalid invid string '{0}', expected 'type:num'")]
    InvalidFormat(String),

    /// Type code or object number could not be parsed.
    #[error("invalid number in invid string '{0}'")]
    InvalidNumber(String),

    /// Binary Invid has an invalid length.
    #[error("invalid invid length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),
}
