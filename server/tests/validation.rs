mod common;

use common::{snapshot, technique};
use pvp_server::{
    error::PvpError,
    game::{
        types::{ActionKind, PvpAction},
        validation::{damage_within_tolerance, validate_action, ValidationRules},
    },
};

const RULES: ValidationRules = ValidationRules {
    min_technique_essence: 10,
    damage_tolerance: 5,
};

fn rejected(res: Result<(), PvpError>) -> bool {
    matches!(res, Err(PvpError::InvalidAction(_)))
}

#[test]
fn known_technique_with_essence_passes() {
    assert!(validate_action(&technique("vine_lash"), &snapshot(3), 3, None, &RULES).is_ok());
}

#[test]
fn flee_is_never_allowed() {
    let flee = PvpAction {
        kind: ActionKind::Flee,
        technique_id: None,
        reported_damage: None,
    };
    assert!(rejected(validate_action(&flee, &snapshot(3), 3, None, &RULES)));
}

#[test]
fn defend_needs_no_technique() {
    let defend = PvpAction {
        kind: ActionKind::Defend,
        technique_id: None,
        reported_damage: None,
    };
    assert!(validate_action(&defend, &snapshot(3), 3, None, &RULES).is_ok());
}

#[test]
fn unknown_or_empty_technique_is_rejected() {
    assert!(rejected(validate_action(&technique("meteor"), &snapshot(3), 3, None, &RULES)));
    assert!(rejected(validate_action(&technique("  "), &snapshot(3), 3, None, &RULES)));
}

#[test]
fn low_essence_blocks_techniques() {
    let mut snap = snapshot(3);
    snap.essence = 9;
    assert!(rejected(validate_action(&technique("vine_lash"), &snap, 3, None, &RULES)));
}

#[test]
fn foreign_beast_is_rejected() {
    assert!(rejected(validate_action(&technique("vine_lash"), &snapshot(4), 3, None, &RULES)));
}

#[test]
fn hp_out_of_range_is_rejected() {
    let mut snap = snapshot(3);
    snap.hp = snap.max_hp + 1;
    assert!(rejected(validate_action(&technique("vine_lash"), &snap, 3, None, &RULES)));
}

#[test]
fn damage_tolerance_is_inclusive() {
    assert!(damage_within_tolerance(20, 25, 5));
    assert!(damage_within_tolerance(20, 15, 5));
    assert!(!damage_within_tolerance(20, 26, 5));

    let mut action = technique("vine_lash");
    action.reported_damage = Some(40);
    assert!(rejected(validate_action(&action, &snapshot(3), 3, Some(30), &RULES)));
    action.reported_damage = Some(33);
    assert!(validate_action(&action, &snapshot(3), 3, Some(30), &RULES).is_ok());
    // without a server figure only the sign is checked
    action.reported_damage = Some(400);
    assert!(validate_action(&action, &snapshot(3), 3, None, &RULES).is_ok());
}

#[test]
fn damage_figures_from_the_wire_are_ignored() {
    let action: PvpAction = serde_json::from_str(
        r#"{"type":"technique","techniqueId":"vine_lash","reportedDamage":5,"serverDamage":900}"#,
    )
    .unwrap();
    assert_eq!(action.reported_damage, Some(5));
    assert!(validate_action(&action, &snapshot(3), 3, Some(5), &RULES).is_ok());
}
