use std::fmt;

use gitview_object::{ObjectId, ObjectStore, ObjectType, StoreError};

/// A resolved revision: the name it was asked for by and the object it names.
///
/// For annotated tags `id` is the tag itself and `peeled_id` the object at the
/// end of the tag chain; for everything else the two are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    pub name: String,
    pub id: ObjectId,
    pub object_type: Option<ObjectType>,
    pub peeled_id: Option<ObjectId>,
    pub peeled_type: Option<ObjectType>,
}

impl Revision {
    /// "No revision": the old side of a first-parent diff of a root commit.
    pub const NULL: Revision = Revision {
        name: String::new(),
        id: ObjectId::NULL,
        object_type: None,
        peeled_id: None,
        peeled_type: None,
    };

    /// Look up `id` in `store`, following annotated tags.
    pub fn peel(
        name: impl Into<String>,
        id: ObjectId,
        store: &dyn ObjectStore,
    ) -> Result<Self, StoreError> {
        let object_type = store.object_type(&id)?.ok_or(StoreError::NotFound(id))?;
        if object_type != ObjectType::Tag {
            return Ok(Self::peeled(name, id, object_type));
        }

        let peeled_id = store.peel_fully(&id)?;
        let peeled_type = store
            .object_type(&peeled_id)?
            .ok_or(StoreError::NotFound(peeled_id))?;
        Ok(Self {
            name: name.into(),
            id,
            object_type: Some(object_type),
            peeled_id: Some(peeled_id),
            peeled_type: Some(peeled_type),
        })
    }

    /// A revision for an object already known not to be a tag.
    pub fn peeled(name: impl Into<String>, id: ObjectId, object_type: ObjectType) -> Self {
        Self {
            name: name.into(),
            id,
            object_type: Some(object_type),
            peeled_id: Some(id),
            peeled_type: Some(object_type),
        }
    }

    /// The same objects under another name.
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// The object a history walk should start from.
    pub fn commitish(&self) -> ObjectId {
        self.peeled_id.unwrap_or(self.id)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("(null)");
        }
        write!(f, "{} ({})", self.name, &self.id.to_hex()[..7])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitview_object::MemoryStore;

    #[test]
    fn peel_non_tag() {
        let mut store = MemoryStore::new();
        let c = store.commit(&[], "root");
        let rev = Revision::peel("main", c, &store).unwrap();
        assert_eq!(rev, Revision::peeled("main", c, ObjectType::Commit));
        assert_eq!(rev.commitish(), c);
    }

    #[test]
    fn peel_tag_chain() {
        let mut store = MemoryStore::new();
        let c = store.commit(&[], "root");
        let inner = store.tag("inner", c).unwrap();
        let outer = store.tag("outer", inner).unwrap();

        let rev = Revision::peel("v1", outer, &store).unwrap();
        assert_eq!(rev.id, outer);
        assert_eq!(rev.object_type, Some(ObjectType::Tag));
        assert_eq!(rev.peeled_id, Some(c));
        assert_eq!(rev.peeled_type, Some(ObjectType::Commit));
    }

    #[test]
    fn peel_missing_object() {
        let store = MemoryStore::new();
        let missing = ObjectId::from_bytes(&[3u8; 20]).unwrap();
        assert!(matches!(
            Revision::peel("x", missing, &store),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn null_revision() {
        assert!(Revision::NULL.is_null());
        assert!(Revision::NULL.name.is_empty());
        assert_eq!(Revision::NULL.to_string(), "(null)");

        let blob = ObjectId::from_bytes(&[1u8; 20]).unwrap();
        assert!(!Revision::peeled("", blob, ObjectType::Blob).is_null());
    }

    #[test]
    fn renamed_revision_keeps_ids() {
        let id = ObjectId::from_bytes(&[0xab; 20]).unwrap();
        let rev = Revision::peeled("master", id, ObjectType::Commit);
        let renamed = rev.named("main");
        assert_eq!(renamed.name, "main");
        assert_eq!(renamed.id, rev.id);
        assert_eq!(renamed.to_string(), "main (abababa)");
    }
}
