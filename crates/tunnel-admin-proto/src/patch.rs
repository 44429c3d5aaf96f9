//! Explicit "leave unchanged" marker for partial updates

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A section of a partial update
///
/// `Unchanged` and `Replace` with an empty value are different requests: the
/// first leaves the stored value alone, the second clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// The field was absent (or `null`) in the request
    #[default]
    Unchanged,
    /// The stored value is replaced by this one
    Replace(T),
}

impl<T> Patch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Patch::Unchanged)
    }

    pub fn as_replacement(&self) -> Option<&T> {
        match self {
            Patch::Unchanged => None,
            Patch::Replace(value) => Some(value),
        }
    }

    /// Overwrite `target` if this patch carries a replacement
    pub fn apply_to(self, target: &mut T) {
        if let Patch::Replace(value) = self {
            *target = value;
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Replace(value),
            None => Patch::Unchanged,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Unchanged => serializer.serialize_none(),
            Patch::Replace(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}
