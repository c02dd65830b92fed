use crate::error::{DataError, Result};
use std::fmt;
use std::sync::{Arc, Weak};

/// Non-owning link from a child (result set, data source, database) to the
/// object that vends it.
///
/// Upgrading after the parent has been dropped yields [`DataError::Detached`].
pub struct BackRef<T: ?Sized> {
    target: Weak<T>,
    label: &'static str,
}

impl<T: ?Sized> BackRef<T> {
    pub fn new(target: Weak<T>, label: &'static str) -> Self {
        Self { target, label }
    }

    pub fn to(target: &Arc<T>, label: &'static str) -> Self {
        Self {
            target: Arc::downgrade(target),
            label,
        }
    }

    pub fn get(&self) -> Result<Arc<T>> {
        self.target.upgrade().ok_or(DataError::Detached(self.label))
    }

    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl<T: ?Sized> Clone for BackRef<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            label: self.label,
        }
    }
}

impl<T: ?Sized> fmt::Debug for BackRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackRef")
            .field("label", &self.label)
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_after_drop() {
        let parent = Arc::new(String::from("db"));
        let link = BackRef::to(&parent, "database");
        assert_eq!(link.get().unwrap().as_str(), "db");

        drop(parent);
        assert!(!link.is_attached());
        assert_eq!(link.get().unwrap_err(), DataError::Detached("database"));
    }
}
