//! Type-safe identifier wrappers.
//!
//! Reporters, stations, and mesh nodes are all named by free-form strings
//! on the wire. Each gets its own newtype so a node id can never be passed
//! where a reporter id is expected. Viewers are numbered by the hub.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_label {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(String);

        impl $name {
            /// Wrap a label.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the label text.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_label! {
    /// Identity of a connected reporter, derived from its transport origin
    /// (`address:port`, or just `address`).
    ReporterId
}

define_label! {
    /// A named group of reporters.
    StationId
}

define_label! {
    /// A node of the monitored mesh network (e.g. `sn4`, `gw`, `149`).
    NodeId
}

/// Name of the station every reporter implicitly belongs to.
pub const ALL_STATION: &str = "all";

impl StationId {
    /// The default station containing every online reporter.
    pub fn all() -> Self {
        Self::new(ALL_STATION)
    }

    /// Whether this is the default `all` station.
    pub fn is_all(&self) -> bool {
        self.0 == ALL_STATION
    }
}

/// Hub-assigned number of a connected viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewerId(pub u64);

impl core::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}
