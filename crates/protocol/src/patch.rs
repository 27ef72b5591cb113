use serde::{Serialize, Serializer};

/// A field in a partial update.
///
/// `Unset` is omitted from the body (pair it with
/// `skip_serializing_if = "Patch::is_unset"`), `Clear` is sent as `null`,
/// and `Set` carries the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Unset,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => v.serialize(s),
            Self::Unset | Self::Clear => s.serialize_none(),
        }
    }
}
