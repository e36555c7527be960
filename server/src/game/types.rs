use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The two matchmaking pools.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Ranked,
    Casual,
}

/// How a match came to be; only `Ranked` touches the ladder.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Ranked,
    Casual,
    DirectChallenge,
}

impl QueueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Ranked => "ranked",
            QueueKind::Casual => "casual",
        }
    }
}

impl From<QueueKind> for MatchType {
    fn from(kind: QueueKind) -> Self {
        match kind {
            QueueKind::Ranked => MatchType::Ranked,
            QueueKind::Casual => MatchType::Casual,
        }
    }
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Ranked => "ranked",
            MatchType::Casual => "casual",
            MatchType::DirectChallenge => "direct_challenge",
        }
    }
}

/// Error for an unrecognised enum label coming back from storage or clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant `{}`", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for QueueKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ranked" => Ok(QueueKind::Ranked),
            "casual" => Ok(QueueKind::Casual),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

impl FromStr for MatchType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ranked" => Ok(MatchType::Ranked),
            "casual" => Ok(MatchType::Casual),
            "direct_challenge" => Ok(MatchType::DirectChallenge),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

/// What a player attempts on their turn.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Technique,
    Defend,
    Flee,
}

/// Player intent relayed to the opponent.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PvpAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub technique_id: Option<String>,
    /// Damage the client claims the action dealt.
    #[serde(default)]
    pub reported_damage: Option<i32>,
}

/// Client-reported state of its beast at the time of the action.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeastSnapshot {
    pub beast_id: i64,
    pub hp: i32,
    pub max_hp: i32,
    pub essence: i32,
    pub max_essence: i32,
    #[serde(default)]
    pub technique_ids: Vec<String>,
}
