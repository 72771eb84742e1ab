use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use array_bytes::{Dehexify, Hexify};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeAs, DisplayFromStr, SerializeAs, serde_as};
use thiserror::Error;

use crate::config::LedgerConfig;
use crate::raw::{pack_uid, unpack_uid};
use crate::EventType;

// UID combines sequence number and event type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid {
    pub seq_no: u32,
    pub event: u32,
}

impl std::fmt::Debug for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Uid(seq_no: {}, event: 0x{:08X})", self.seq_no, self.event)
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}_{:08X}", self.seq_no, self.event)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UidParseError {
    #[error("invalid Uid string length: {0}")]
    Length(usize),
    #[error("invalid Uid format, expected '_' at position 8")]
    Separator,
    #[error("invalid hex in Uid: {0}")]
    Hex(String),
}

fn parse_word(hex: &str) -> Result<u32, UidParseError> {
    <[u8; 4]>::dehexify(hex)
        .map(u32::from_be_bytes)
        .map_err(|e| UidParseError::Hex(format!("{hex}: {e:?}")))
}

impl FromStr for Uid {
    type Err = UidParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches("0x");
        if s.len() != 17 || !s.is_ascii() {
            return Err(UidParseError::Length(s.len()));
        }
        if &s[8..9] != "_" {
            return Err(UidParseError::Separator);
        }
        Ok(Uid::new(parse_word(&s[0..8])?, parse_word(&s[9..17])?))
    }
}

impl Uid {
    /// Implicit parent of every emission.
    pub const ROOT: Uid = Uid { seq_no: 0, event: 0 };

    pub fn new(seq_no: u32, event: u32) -> Self {
        Self { seq_no, event }
    }

    pub fn pack(&self) -> u64 {
        pack_uid(self.seq_no, self.event)
    }

    pub fn unpack(encoded: u64) -> Self {
        let (seq_no, event) = unpack_uid(encoded);
        Self { seq_no, event }
    }

    pub fn is_root(&self) -> bool {
        self.seq_no == 0
    }

    pub fn event_type(&self) -> EventType {
        EventType::decode(self.event)
    }
}

/// Event words as `0x`-prefixed hex in serialized ledgers.
pub struct HexWord;

impl SerializeAs<u32> for HexWord {
    fn serialize_as<S>(value: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&value.to_be_bytes().hexify_prefixed())
    }
}

impl<'de> DeserializeAs<'de, u32> for HexWord {
    fn deserialize_as<D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as DeError;

        let hex = String::deserialize(deserializer)?;
        parse_word(hex.trim_start_matches("0x")).map_err(D::Error::custom)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("seq_no {seq_no} is already committed")]
    DuplicateSeqNo { seq_no: u32 },
    #[error("parent seq_no {parent_seq_no} is not committed")]
    UnknownParent { parent_seq_no: u32 },
    #[error("seq_no {seq_no} is not in the ledger")]
    UnknownSeqNo { seq_no: u32 },
    #[error("insert queue is closed")]
    Closed,
}

#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub parent_seq_no: u32,
    #[serde_as(as = "HexWord")]
    pub event: u32,
}

impl Entry {
    pub fn event_type(&self) -> EventType {
        EventType::decode(self.event)
    }
}

/// Ordered, frozen copy of every committed entry.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub entries: BTreeMap<u32, Entry>,
}

#[derive(Default)]
struct Shard {
    entries: RwLock<HashMap<u32, Entry>>,
    // Keyed by parent seq_no.
    children: RwLock<HashMap<u32, Vec<u32>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Lineage forest rooted at seq_no 0.
///
/// Entries and the parent-to-children index are sharded by seq_no. An insert
/// holds the write lock of its own entry shard while it appends to the
/// parent's children list, so no reader sees one half without the other.
/// Lock order is always entry shard, then children shard.
pub struct Ledger {
    shards: Box<[Shard]>,
    len: AtomicUsize,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .finish()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(&LedgerConfig::default())
    }

    pub fn with_config(config: &LedgerConfig) -> Self {
        let shards = (0..config.shards.max(1)).map(|_| Shard::default()).collect();
        Self { shards, len: AtomicUsize::new(0) }
    }

    fn shard(&self, seq_no: u32) -> &Shard {
        &self.shards[seq_no as usize % self.shards.len()]
    }

    pub fn is_committed(&self, seq_no: u32) -> bool {
        seq_no == 0 || read(&self.shard(seq_no).entries).contains_key(&seq_no)
    }

    pub fn insert(&self, seq_no: u32, parent_seq_no: u32, event: u32) -> Result<(), LedgerError> {
        if seq_no == 0 {
            warn!("Rejected insert of the root seq_no");
            return Err(LedgerError::DuplicateSeqNo { seq_no });
        }
        if !self.is_committed(parent_seq_no) {
            warn!("Rejected seq_no {}: parent {} not committed", seq_no, parent_seq_no);
            return Err(LedgerError::UnknownParent { parent_seq_no });
        }

        let mut entries = write(&self.shard(seq_no).entries);
        if entries.contains_key(&seq_no) {
            warn!("Rejected duplicate seq_no {}", seq_no);
            return Err(LedgerError::DuplicateSeqNo { seq_no });
        }
        entries.insert(seq_no, Entry { parent_seq_no, event });
        write(&self.shard(parent_seq_no).children)
            .entry(parent_seq_no)
            .or_default()
            .push(seq_no);
        drop(entries);

        self.len.fetch_add(1, Ordering::Relaxed);
        debug!("Committed {} under {}", Uid::new(seq_no, event), parent_seq_no);
        Ok(())
    }

    pub fn get(&self, seq_no: u32) -> Option<Entry> {
        read(&self.shard(seq_no).entries).get(&seq_no).copied()
    }

    pub fn lookup(&self, seq_no: u32) -> Option<Uid> {
        if seq_no == 0 {
            return Some(Uid::ROOT);
        }
        self.get(seq_no).map(|entry| Uid::new(seq_no, entry.event))
    }

    fn expect_uid(&self, seq_no: u32) -> Result<Uid, LedgerError> {
        self.lookup(seq_no).ok_or(LedgerError::UnknownSeqNo { seq_no })
    }

    /// Direct children, in commit order.
    pub fn children(&self, seq_no: u32) -> Vec<u32> {
        read(&self.shard(seq_no).children)
            .get(&seq_no)
            .cloned()
            .unwrap_or_default()
    }

    /// Events with no cause other than the root.
    pub fn roots(&self) -> Vec<Uid> {
        self.children(0)
            .into_iter()
            .filter_map(|seq_no| self.lookup(seq_no))
            .collect()
    }

    /// From `seq_no` up to and including `Uid::ROOT`.
    pub fn trace_up(&self, seq_no: u32) -> Result<Vec<Uid>, LedgerError> {
        let mut trace = Vec::new();
        let mut current = seq_no;
        while current != 0 {
            let entry = self
                .get(current)
                .ok_or(LedgerError::UnknownSeqNo { seq_no: current })?;
            trace.push(Uid::new(current, entry.event));
            current = entry.parent_seq_no;
        }
        trace.push(Uid::ROOT);
        Ok(trace)
    }

    /// `trace_up` in causal order, root first.
    pub fn chain(&self, seq_no: u32) -> Result<Vec<Uid>, LedgerError> {
        let mut chain = self.trace_up(seq_no)?;
        chain.reverse();
        Ok(chain)
    }

    /// Every descendant of `seq_no`, breadth first.
    pub fn trace_down(&self, seq_no: u32) -> Result<Vec<Uid>, LedgerError> {
        self.expect_uid(seq_no)?;
        let mut found = Vec::new();
        let mut queue: VecDeque<u32> = self.children(seq_no).into();
        while let Some(next) = queue.pop_front() {
            if let Some(uid) = self.lookup(next) {
                found.push(uid);
            }
            queue.extend(self.children(next));
        }
        Ok(found)
    }

    /// Every path from `seq_no` down to a leaf. A childless node is its own
    /// single-element path.
    pub fn paths(&self, seq_no: u32) -> Result<Vec<Vec<Uid>>, LedgerError> {
        let start = self.expect_uid(seq_no)?;
        let mut paths = Vec::new();
        let mut stack = vec![vec![start]];
        while let Some(path) = stack.pop() {
            let Some(last) = path.last() else { continue };
            let children = self.children(last.seq_no);
            if children.is_empty() {
                paths.push(path);
                continue;
            }
            for child in children {
                if let Some(uid) = self.lookup(child) {
                    let mut next = path.clone();
                    next.push(uid);
                    stack.push(next);
                }
            }
        }
        Ok(paths)
    }

    pub fn leaves(&self, seq_no: u32) -> Result<Vec<Uid>, LedgerError> {
        Ok(self
            .paths(seq_no)?
            .into_iter()
            .filter_map(|path| path.last().copied())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Holds every entry shard for reading at once, so a child is never
    /// captured without its parent.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let guards: Vec<_> = self.shards.iter().map(|shard| read(&shard.entries)).collect();
        let entries = guards
            .iter()
            .flat_map(|entries| entries.iter().map(|(seq_no, entry)| (*seq_no, *entry)))
            .collect();
        LedgerSnapshot { entries }
    }

    /// Rebuild from a snapshot, parents before children. Entries that do not
    /// reach the root are reported as `UnknownParent`.
    pub fn from_snapshot(snapshot: &LedgerSnapshot, config: &LedgerConfig) -> Result<Self, LedgerError> {
        let ledger = Self::with_config(config);
        let mut by_parent: BTreeMap<u32, Vec<(u32, Entry)>> = BTreeMap::new();
        for (seq_no, entry) in &snapshot.entries {
            by_parent.entry(entry.parent_seq_no).or_default().push((*seq_no, *entry));
        }

        let mut queue = VecDeque::from([0u32]);
        while let Some(parent) = queue.pop_front() {
            for (seq_no, entry) in by_parent.remove(&parent).unwrap_or_default() {
                ledger.insert(seq_no, entry.parent_seq_no, entry.event)?;
                queue.push_back(seq_no);
            }
        }

        if let Some((parent_seq_no, _)) = by_parent.into_iter().next() {
            return Err(LedgerError::UnknownParent { parent_seq_no });
        }
        debug!("Rebuilt ledger with {} entries", ledger.len());
        Ok(ledger)
    }
}
