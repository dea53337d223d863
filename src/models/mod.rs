//! Domain vocabulary for the club website API.
//!
//! The client treats resource payloads as opaque JSON; the only domain
//! knowledge it carries is the set of named collections the backend serves
//! and, for mutations, which fields a new record must supply.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named collection fetched and cached as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Members,
    Events,
    Projects,
    Gallery,
    Announcements,
    Admins,
    Config,
}

impl Resource {
    /// Every resource the client tracks, in refresh order.
    pub const ALL: [Resource; 7] = [
        Resource::Members,
        Resource::Events,
        Resource::Projects,
        Resource::Gallery,
        Resource::Announcements,
        Resource::Admins,
        Resource::Config,
    ];

    /// Cache key for this resource.
    pub fn key(&self) -> &'static str {
        match self {
            Resource::Members => "members",
            Resource::Events => "events",
            Resource::Projects => "projects",
            Resource::Gallery => "gallery",
            Resource::Announcements => "announcements",
            Resource::Admins => "admins",
            Resource::Config => "config",
        }
    }

    /// Collection endpoint path on the backend.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Members => "/api/members",
            Resource::Events => "/api/events",
            Resource::Projects => "/api/projects",
            Resource::Gallery => "/api/gallery",
            Resource::Announcements => "/api/announcements",
            Resource::Admins => "/api/admins",
            Resource::Config => "/api/config",
        }
    }

    /// Fields a create call must supply for this resource. Updates may be
    /// partial, so this is only enforced on creation.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Resource::Members => &["name", "role"],
            Resource::Events => &["title", "date"],
            Resource::Projects => &["title"],
            Resource::Gallery => &["url"],
            Resource::Announcements => &["title", "message"],
            Resource::Admins => &["username", "password"],
            Resource::Config => &[],
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
