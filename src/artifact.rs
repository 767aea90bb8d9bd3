//! Presence tracking for optional map artifacts.

/// One optional slot of a map bundle.
///
/// Distinguishes a file that was found (even if its content is empty, such
/// as a `zones.json` holding `[]`) from a file that does not exist at all.
/// Downstream code matches on both cases; an absent artifact leaves the
/// stored value untouched while a present one overwrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact<T> {
    Present(T),
    Absent,
}

impl<T> Default for Artifact<T> {
    fn default() -> Self {
        Artifact::Absent
    }
}

impl<T> Artifact<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Artifact::Present(_))
    }

    pub fn as_ref(&self) -> Artifact<&T> {
        match self {
            Artifact::Present(v) => Artifact::Present(v),
            Artifact::Absent => Artifact::Absent,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Artifact::Present(v) => Some(v),
            Artifact::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Artifact<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Artifact::Present(v),
            None => Artifact::Absent,
        }
    }
}
