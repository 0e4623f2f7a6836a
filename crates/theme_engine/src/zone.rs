use std::fmt;

use serde::{Deserialize, Serialize};

/// Placement region around the field center. `Ground` is the catch-all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    BackLeft,
    BackRight,
    BackCenter,
    SideLeft,
    SideRight,
    FrontLeft,
    FrontRight,
    FrontCenter,
    Misc,
    #[default]
    Ground,
}

impl Zone {
    pub const ALL: [Zone; 10] = [
        Zone::BackLeft,
        Zone::BackRight,
        Zone::BackCenter,
        Zone::SideLeft,
        Zone::SideRight,
        Zone::FrontLeft,
        Zone::FrontRight,
        Zone::FrontCenter,
        Zone::Misc,
        Zone::Ground,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Zone::BackLeft => "Back Left",
            Zone::BackRight => "Back Right",
            Zone::BackCenter => "Back Center",
            Zone::SideLeft => "Side Left",
            Zone::SideRight => "Side Right",
            Zone::FrontLeft => "Front Left",
            Zone::FrontRight => "Front Right",
            Zone::FrontCenter => "Front Center",
            Zone::Misc => "Misc",
            Zone::Ground => "Ground",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
