//! Typed names, grounded on the newtype-over-`String` identifier pattern.

use std::fmt;

macro_rules! name_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw name.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_newtype!(ShipName, "A ship's unique name.");
name_newtype!(ServiceName, "A service's unique name.");
name_newtype!(ContainerName, "A container's unique name, across the whole environment.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_allows_btreemap_lookup_by_str() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ShipName::new("s1"), 1);
        assert_eq!(map.get("s1"), Some(&1));
    }
}
