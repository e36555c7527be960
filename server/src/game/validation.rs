//! Structural checks applied to client-reported actions before they are
//! relayed or trusted for adjudication. Combat resolution lives elsewhere;
//! this only decides whether a report is plausible.

use crate::{
    config::Settings,
    error::{PvpError, PvpResult},
    game::types::{ActionKind, BeastSnapshot, PvpAction},
};

#[derive(Debug, Clone, Copy)]
pub struct ValidationRules {
    pub min_technique_essence: i32,
    pub damage_tolerance: i32,
}

impl From<&Settings> for ValidationRules {
    fn from(s: &Settings) -> Self {
        ValidationRules {
            min_technique_essence: s.min_technique_essence,
            damage_tolerance: s.damage_tolerance,
        }
    }
}

/// `|server_computed - reported| <= tolerance`
pub fn damage_within_tolerance(server_computed: i32, reported: i32, tolerance: i32) -> bool {
    (i64::from(server_computed) - i64::from(reported)).abs() <= i64::from(tolerance)
}

/// Range and ownership checks on a reported beast state.
pub fn validate_snapshot(snapshot: &BeastSnapshot, expected_beast_id: i64) -> PvpResult<()> {
    if snapshot.beast_id != expected_beast_id {
        return Err(PvpError::invalid_action("beast does not match this match"));
    }
    if snapshot.max_hp <= 0 || snapshot.hp < 0 || snapshot.hp > snapshot.max_hp {
        return Err(PvpError::invalid_action("hp out of range"));
    }
    if snapshot.max_essence < 0 || snapshot.essence < 0 || snapshot.essence > snapshot.max_essence
    {
        return Err(PvpError::invalid_action("essence out of range"));
    }
    Ok(())
}

/// Full gate for one relayed action. `server_damage` is the server's own
/// figure for the action, when the caller has one; the reported damage is
/// then held to it within the tolerance.
pub fn validate_action(
    action: &PvpAction,
    snapshot: &BeastSnapshot,
    expected_beast_id: i64,
    server_damage: Option<i32>,
    rules: &ValidationRules,
) -> PvpResult<()> {
    validate_snapshot(snapshot, expected_beast_id)?;

    match action.kind {
        ActionKind::Flee => return Err(PvpError::invalid_action("cannot flee a PVP match")),
        ActionKind::Defend => {}
        ActionKind::Technique => {
            let technique = action
                .technique_id
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| PvpError::invalid_action("technique id missing"))?;
            if !snapshot.technique_ids.iter().any(|t| t == technique) {
                return Err(PvpError::invalid_action("unknown technique"));
            }
            if snapshot.essence < rules.min_technique_essence {
                return Err(PvpError::invalid_action("insufficient essence"));
            }
        }
    }

    if let (Some(server), Some(reported)) = (server_damage, action.reported_damage) {
        if !damage_within_tolerance(server, reported, rules.damage_tolerance) {
            return Err(PvpError::invalid_action("reported damage out of tolerance"));
        }
    }
    if matches!(action.reported_damage, Some(d) if d < 0) {
        return Err(PvpError::invalid_action("negative damage"));
    }

    Ok(())
}
