use gitview_object::ObjectId;

/// Opaque identity of the requesting principal.
///
/// Only ever compared and hashed; what it means is up to whoever supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerKey(String);

impl ViewerKey {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The key shared by all unauthenticated viewers.
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Who is asking, about which repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    viewer: ViewerKey,
    repository: String,
}

impl Access {
    pub fn new(viewer: ViewerKey, repository: impl Into<String>) -> Self {
        Self {
            viewer,
            repository: repository.into(),
        }
    }

    pub fn viewer(&self) -> &ViewerKey {
        &self.viewer
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }
}

/// Cache key: one memoized answer per viewer, repository and object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisibilityKey {
    pub viewer: ViewerKey,
    pub repository: String,
    pub id: ObjectId,
}

impl VisibilityKey {
    pub fn new(access: &Access, id: ObjectId) -> Self {
        Self {
            viewer: access.viewer.clone(),
            repository: access.repository.clone(),
            id,
        }
    }
}
