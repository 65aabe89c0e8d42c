//! Three-state optional props
//!
//! Plain `Option` cannot tell "use the construct's default" apart from
//! "explicitly turn this off". `Setting` keeps those two cases separate.

/// An optional prop that can be left to the default or explicitly disabled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Setting<T> {
    /// Not specified; the construct applies its default
    #[default]
    Unset,
    /// Explicitly disabled
    Absent,
    /// Explicitly set
    Set(T),
}

impl<T> Setting<T> {
    /// Resolve against a lazily computed default.
    ///
    /// `Unset` yields the default, `Absent` yields `None`, `Set` yields the
    /// value.
    pub fn resolve_or_else(self, default: impl FnOnce() -> Option<T>) -> Option<T> {
        match self {
            Setting::Unset => default(),
            Setting::Absent => None,
            Setting::Set(v) => Some(v),
        }
    }

    pub fn resolve_or(self, default: Option<T>) -> Option<T> {
        self.resolve_or_else(|| default)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Setting::Unset)
    }

    pub fn as_ref(&self) -> Setting<&T> {
        match self {
            Setting::Unset => Setting::Unset,
            Setting::Absent => Setting::Absent,
            Setting::Set(v) => Setting::Set(v),
        }
    }
}

impl<T> From<Option<T>> for Setting<T> {
    /// `Some` becomes `Set`, `None` becomes `Absent`
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Setting::Set(v),
            None => Setting::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_states() {
        assert_eq!(Setting::<u32>::Unset.resolve_or(Some(7)), Some(7));
        assert_eq!(Setting::<u32>::Absent.resolve_or(Some(7)), None);
        assert_eq!(Setting::Set(3).resolve_or(Some(7)), Some(3));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Setting::from(Some(1)), Setting::Set(1));
        assert_eq!(Setting::<u8>::from(None), Setting::Absent);
    }
}
