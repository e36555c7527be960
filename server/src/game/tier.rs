//! Ladder tiers derived from ELO.
//!
//! Bands are 400 wide and non-overlapping; a boundary value belongs to the
//! band that starts there. Tiers below master split into four divisions,
//! division 4 being the low end.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::game::types::UnknownVariant;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
    Grandmaster,
    Challenger,
}

const BAND_WIDTH: i32 = 400;
const DIVISIONS: i32 = 4;

impl Tier {
    pub const ALL: [Tier; 9] = [
        Tier::Iron,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
        Tier::Master,
        Tier::Grandmaster,
        Tier::Challenger,
    ];

    /// Lowest ELO that belongs to this tier.
    pub fn floor(self) -> i32 {
        self as i32 * BAND_WIDTH
    }

    pub fn has_divisions(self) -> bool {
        self < Tier::Master
    }

    /// Ranked currency multiplier applied when this tier is beaten.
    pub fn reward_multiplier(self) -> f64 {
        match self {
            Tier::Iron => 1.0,
            Tier::Bronze => 1.5,
            Tier::Silver => 2.0,
            Tier::Gold => 2.5,
            Tier::Platinum => 3.0,
            Tier::Diamond => 3.5,
            Tier::Master => 4.5,
            Tier::Grandmaster => 5.0,
            Tier::Challenger => 6.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Iron => "iron",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
            Tier::Master => "master",
            Tier::Grandmaster => "grandmaster",
            Tier::Challenger => "challenger",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_owned()))
    }
}

/// Maps an ELO to `(tier, division)`; division is `None` from master up.
pub fn tier_for(elo: i32) -> (Tier, Option<i32>) {
    let elo = elo.max(0);
    let tier = Tier::ALL
        .into_iter()
        .rev()
        .find(|t| elo >= t.floor())
        .unwrap_or(Tier::Iron);

    if !tier.has_divisions() {
        return (tier, None);
    }

    // 100-point steps inside the band: 4 at the bottom, 1 at the top.
    let step = BAND_WIDTH / DIVISIONS;
    let offset = (elo - tier.floor()) / step;
    (tier, Some(DIVISIONS - offset))
}
