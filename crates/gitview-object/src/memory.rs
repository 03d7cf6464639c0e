//! An in-memory [`ObjectStore`].
//!
//! Objects are hashed the way git hashes them (`"<type> <len>\0<body>"`), with
//! a simplified body format. Commit timestamps come from a logical clock so
//! histories built in tests are deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use sha1::{Digest, Sha1};

use crate::bitmap::{Bitmap, BitmapIndex, MemoryBitmapIndex};
use crate::oid::{is_hex, HEX_LEN};
use crate::store::{MAX_PEEL_DEPTH, REF_SEARCH_PATH};
use crate::{Commit, ObjectId, ObjectStore, ObjectType, Reference, StoreError};

/// Epoch of the logical commit clock.
const CLOCK_BASE: i64 = 1_700_000_000;

/// Minimum length of an abbreviated hex object name.
const MIN_ABBREV: usize = 4;

#[derive(Debug, Clone)]
enum StoredObject {
    Blob,
    Tree,
    Commit(Commit),
    Tag { target: ObjectId },
}

impl StoredObject {
    fn object_type(&self) -> ObjectType {
        match self {
            StoredObject::Blob => ObjectType::Blob,
            StoredObject::Tree => ObjectType::Tree,
            StoredObject::Commit(_) => ObjectType::Commit,
            StoredObject::Tag { .. } => ObjectType::Tag,
        }
    }
}

/// Object store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: HashMap<ObjectId, StoredObject>,
    refs: BTreeMap<String, ObjectId>,
    bitmaps: Option<MemoryBitmapIndex>,
    clock: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Check if an object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.objects.contains_key(oid)
    }

    /// Store a blob.
    pub fn blob(&mut self, data: &[u8]) -> ObjectId {
        let oid = hash_object(ObjectType::Blob, data);
        self.objects.insert(oid, StoredObject::Blob);
        oid
    }

    /// Store a tree listing `entries` by name.
    pub fn tree(&mut self, entries: &[(&str, ObjectId)]) -> ObjectId {
        let mut body = String::new();
        for (name, oid) in entries {
            body.push_str(&format!("{name} {oid}\n"));
        }
        let oid = hash_object(ObjectType::Tree, body.as_bytes());
        self.objects.insert(oid, StoredObject::Tree);
        oid
    }

    /// Store a commit with the given parents. Each call advances the clock.
    pub fn commit(&mut self, parents: &[ObjectId], message: &str) -> ObjectId {
        self.clock += 1;
        let commit_time = CLOCK_BASE + self.clock;

        let mut body = String::new();
        for parent in parents {
            body.push_str(&format!("parent {parent}\n"));
        }
        body.push_str(&format!(
            "committer gitview <gitview@localhost> {commit_time} +0000\n\n{message}\n"
        ));

        let oid = hash_object(ObjectType::Commit, body.as_bytes());
        self.objects.insert(
            oid,
            StoredObject::Commit(Commit {
                parents: parents.to_vec(),
                commit_time,
            }),
        );
        oid
    }

    /// Store an annotated tag object pointing at `target`.
    ///
    /// Only the object is written; use [`set_ref`](Self::set_ref) to publish it.
    pub fn tag(&mut self, name: &str, target: ObjectId) -> Result<ObjectId, StoreError> {
        let target_type = self
            .objects
            .get(&target)
            .map(StoredObject::object_type)
            .ok_or(StoreError::NotFound(target))?;
        let body = format!("object {target}\ntype {target_type}\ntag {name}\n");
        let oid = hash_object(ObjectType::Tag, body.as_bytes());
        self.objects.insert(oid, StoredObject::Tag { target });
        Ok(oid)
    }

    /// Create or move a reference.
    pub fn set_ref(&mut self, name: impl Into<String>, target: ObjectId) {
        self.refs.insert(name.into(), target);
    }

    /// Delete a reference, returning its old target.
    pub fn remove_ref(&mut self, name: &str) -> Option<ObjectId> {
        self.refs.remove(name)
    }

    /// Build a bitmap index with one stored bitmap per commit a reference
    /// points at. Replaces any previous index.
    pub fn build_bitmap_index(&mut self) {
        let mut index = MemoryBitmapIndex::new(self.objects.keys().copied());
        let tips: BTreeSet<ObjectId> = self
            .refs
            .values()
            .filter_map(|oid| self.peel_to_commit(oid).ok())
            .collect();

        for tip in tips {
            let mut bitmap = Bitmap::new();
            let mut seen = HashSet::new();
            let mut stack = vec![tip];
            while let Some(oid) = stack.pop() {
                if !seen.insert(oid) {
                    continue;
                }
                if let Some(pos) = index.position(&oid) {
                    bitmap.set(pos);
                }
                if let Some(StoredObject::Commit(c)) = self.objects.get(&oid) {
                    stack.extend(c.parents.iter().copied());
                }
            }
            index.add_bitmap(tip, &bitmap);
        }

        tracing::debug!(entries = index.num_entries(), "built bitmap index");
        self.bitmaps = Some(index);
    }

    /// Forget the bitmap index; reachability falls back to graph walks.
    pub fn drop_bitmap_index(&mut self) {
        self.bitmaps = None;
    }

    fn lookup_ref(&self, name: &str) -> Option<(String, ObjectId)> {
        REF_SEARCH_PATH.iter().find_map(|prefix| {
            let full = format!("{prefix}{name}");
            self.refs.get(&full).map(|oid| (full, *oid))
        })
    }

    fn make_reference(&self, name: String, target: ObjectId) -> Reference {
        Reference {
            peeled: self.peeled_target(&target),
            name,
            target,
        }
    }

    /// Peel a tag chain; `None` if `oid` is not a tag.
    fn peeled_target(&self, oid: &ObjectId) -> Option<ObjectId> {
        let mut current = *oid;
        let mut peeled = None;
        for _ in 0..MAX_PEEL_DEPTH {
            match self.objects.get(&current) {
                Some(StoredObject::Tag { target }) => {
                    current = *target;
                    peeled = Some(current);
                }
                _ => return peeled,
            }
        }
        peeled
    }

    fn peel_to_commit(&self, oid: &ObjectId) -> Result<ObjectId, StoreError> {
        let mut current = *oid;
        for _ in 0..MAX_PEEL_DEPTH {
            match self.objects.get(&current) {
                Some(StoredObject::Commit(_)) => return Ok(current),
                Some(StoredObject::Tag { target }) => current = *target,
                Some(_) => return Err(StoreError::NotACommit(current)),
                None => return Err(StoreError::NotFound(current)),
            }
        }
        Err(StoreError::Corrupt {
            oid: *oid,
            reason: "tag chain exceeds depth limit".into(),
        })
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId, StoreError> {
        let matches: Vec<ObjectId> = self
            .objects
            .keys()
            .filter(|oid| oid.starts_with_hex(prefix))
            .copied()
            .collect();
        match matches.len() {
            0 => Err(StoreError::UnknownRevision(prefix.to_string())),
            1 => Ok(matches[0]),
            count => Err(StoreError::Ambiguous {
                prefix: prefix.to_string(),
                count,
            }),
        }
    }

    fn apply_revision_suffix(&self, oid: &ObjectId, suffix: &str) -> Result<ObjectId, StoreError> {
        let (op, count_str) = suffix.split_at(1);
        let count: usize = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| StoreError::InvalidRevision(format!("invalid suffix: {suffix}")))?
        };

        let start = self.peel_to_commit(oid)?;
        match op {
            "~" => {
                let mut current = start;
                for _ in 0..count {
                    current = *self.read_commit(&current)?.first_parent().ok_or_else(|| {
                        StoreError::InvalidRevision(format!("{oid}~{count} goes past root"))
                    })?;
                }
                Ok(current)
            }
            "^" => {
                if count == 0 {
                    return Ok(start);
                }
                self.read_commit(&start)?
                    .parents
                    .get(count - 1)
                    .copied()
                    .ok_or_else(|| {
                        StoreError::InvalidRevision(format!("{oid}^{count} has no such parent"))
                    })
            }
            _ => Err(StoreError::InvalidRevision(format!("unknown suffix: {suffix}"))),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn resolve(&self, name: &str) -> Result<ObjectId, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidRevision("empty revision".into()));
        }

        if let Some((base, suffix)) = split_revision_suffix(name) {
            let base_oid = self.resolve(base)?;
            return self.apply_revision_suffix(&base_oid, suffix);
        }

        if name.len() == HEX_LEN && is_hex(name) {
            let oid = ObjectId::from_hex(name)?;
            return if self.contains(&oid) {
                Ok(oid)
            } else {
                Err(StoreError::NotFound(oid))
            };
        }

        if let Some((_, oid)) = self.lookup_ref(name) {
            return Ok(oid);
        }

        if name.len() >= MIN_ABBREV && is_hex(name) {
            return self.resolve_prefix(name);
        }

        Err(StoreError::UnknownRevision(name.to_string()))
    }

    fn object_type(&self, oid: &ObjectId) -> Result<Option<ObjectType>, StoreError> {
        Ok(self.objects.get(oid).map(StoredObject::object_type))
    }

    fn read_commit(&self, oid: &ObjectId) -> Result<Commit, StoreError> {
        match self.objects.get(oid) {
            Some(StoredObject::Commit(c)) => Ok(c.clone()),
            Some(_) => Err(StoreError::NotACommit(*oid)),
            None => Err(StoreError::NotFound(*oid)),
        }
    }

    fn peel_tag(&self, oid: &ObjectId) -> Result<ObjectId, StoreError> {
        match self.objects.get(oid) {
            Some(StoredObject::Tag { target }) => Ok(*target),
            Some(_) => Ok(*oid),
            None => Err(StoreError::NotFound(*oid)),
        }
    }

    fn references(&self) -> Result<Vec<Reference>, StoreError> {
        Ok(self
            .refs
            .iter()
            .map(|(name, oid)| self.make_reference(name.clone(), *oid))
            .collect())
    }

    fn references_with_prefix(&self, prefix: &str) -> Result<Vec<Reference>, StoreError> {
        Ok(self
            .refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, oid)| self.make_reference(name.clone(), *oid))
            .collect())
    }

    fn find_ref(&self, name: &str) -> Result<Option<Reference>, StoreError> {
        if name.is_empty() {
            return Ok(None);
        }
        Ok(self
            .lookup_ref(name)
            .map(|(full, oid)| self.make_reference(full, oid)))
    }

    fn bitmap_index(&self) -> Option<&dyn BitmapIndex> {
        self.bitmaps.as_ref().map(|b| b as &dyn BitmapIndex)
    }
}

fn hash_object(kind: ObjectType, body: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind, body.len()).as_bytes());
    hasher.update(body);
    let digest: [u8; 20] = hasher.finalize().into();
    ObjectId::from(digest)
}

/// Split a revision string into base and a trailing `~N` / `^N` suffix.
fn split_revision_suffix(rev: &str) -> Option<(&str, &str)> {
    for (i, c) in rev.char_indices().rev() {
        if (c == '~' || c == '^') && i > 0 {
            let rest = &rev[i + 1..];
            if rest.chars().all(|c| c.is_ascii_digit()) {
                return Some((&rev[..i], &rev[i..]));
            }
        }
    }
    None
}
