// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types.
//!
//! Every Ghost ID is a short ASCII string: a 4-byte type prefix followed
//! by a hyphenated UUID (`app-{uuid}` on the wire). IDs are stored inline
//! in a fixed buffer so they stay `Copy` and allocation-free in registry
//! keys and hot logging paths.

/// Inline capacity: 4-byte prefix + 36-byte hyphenated UUID.
pub const ID_MAX_LEN: usize = 40;

/// Generate a random ID body (hyphenated UUID v4).
pub fn random_body() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fixed-capacity inline ID storage. Always ≤ 40 ASCII bytes, `Copy`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InlineId {
    bytes: [u8; ID_MAX_LEN],
    used: u8,
}

impl InlineId {
    /// Build from a string, truncating past capacity (debug builds
    /// assert instead; wire-format IDs always fit).
    pub fn new(s: &str) -> Self {
        debug_assert!(s.len() <= ID_MAX_LEN, "ID over {} bytes: {:?}", ID_MAX_LEN, s);
        let used = s.len().min(ID_MAX_LEN);
        let mut bytes = [0u8; ID_MAX_LEN];
        bytes[..used].copy_from_slice(&s.as_bytes()[..used]);
        Self { bytes, used: used as u8 }
    }

    pub fn as_str(&self) -> &str {
        // Construction only ever copies from &str, so the active range is
        // valid UTF-8.
        std::str::from_utf8(&self.bytes[..self.used as usize]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }
}

impl std::hash::Hash for InlineId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Must agree with str::hash so Borrow<str> map lookups work.
        self.as_str().hash(state);
    }
}

impl std::borrow::Borrow<str> for InlineId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for InlineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl std::fmt::Display for InlineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for InlineId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for InlineId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() > ID_MAX_LEN {
            return Err(serde::de::Error::custom(format!(
                "ID over {} bytes: {:?}",
                ID_MAX_LEN, s
            )));
        }
        Ok(InlineId::new(&s))
    }
}

/// Define a prefixed newtype ID over [`InlineId`].
///
/// `new()` generates `{prefix}{uuid-v4}`; `from_string()` wraps an
/// existing wire ID. String-ish ergonomics (`Display`, `Deref<str>`,
/// `Borrow<str>`, comparisons against `&str`) come along.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct ConnectionId("app-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name($crate::id::InlineId);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh `{prefix}{uuid}` ID.
            pub fn new() -> Self {
                Self($crate::id::InlineId::new(&format!(
                    "{}{}",
                    Self::PREFIX,
                    $crate::id::random_body(),
                )))
            }

            /// Wrap an existing wire ID.
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self($crate::id::InlineId::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// The ID body without the type prefix.
            pub fn suffix(&self) -> &str {
                self.as_str().strip_prefix(Self::PREFIX).unwrap_or_else(|| self.as_str())
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

crate::define_id! {
    /// Identifier for an application-side connection to the daemon.
    ///
    /// Generated at connection construction; the wire form is `app-{uuid}`.
    pub struct ConnectionId("app-");
}

crate::define_id! {
    /// Unique identifier for a [`crate::SystemCommand`].
    pub struct CommandId("cmd-");
}

crate::define_id! {
    /// Identifier for a supervised process.
    ///
    /// Registrations may supply any name-like ID (e.g. `"p42"`); processes
    /// that don't choose one get a generated `app-{uuid}`.
    pub struct ProcessId("app-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
