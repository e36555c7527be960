mod common;

use actix_web::ResponseError;
use chrono::{Duration, Utc};
use common::{drain, harness, harness_with, season, snapshot, technique};
use pvp_server::{
    config::Settings,
    db::store::PvpStore,
    error::PvpError,
    game::types::{ActionKind, PvpAction, QueueKind},
    protocol::ServerMsg,
};

#[tokio::test]
async fn match_creation_notifies_both_players() {
    let h = harness();
    let (_, mut rx1) = h.state.notifier.register(1);
    let (_, mut rx2) = h.state.notifier.register(2);

    let m = h.matched(1, 2, QueueKind::Casual).await;

    for (rx, opponent) in [(&mut rx1, 2), (&mut rx2, 1)] {
        let msgs = drain(rx);
        assert!(msgs.iter().any(|msg| matches!(
            msg,
            ServerMsg::MatchFound { match_id, opponent: o } if *match_id == m.id && o.player_id == opponent
        )));
        assert!(msgs
            .iter()
            .any(|msg| matches!(msg, ServerMsg::MatchStart { match_id, .. } if *match_id == m.id)));
    }
}

#[tokio::test]
async fn finishing_twice_settles_once() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Ranked).await;

    let done = h.state.matches.finish_match(m.id, 1, 60).await.unwrap();
    assert_eq!(done.winner_id, Some(1));
    assert_eq!(done.loser_id, Some(2));
    assert_eq!(done.duration_seconds, Some(60));
    assert!(done.is_finished());
    assert_eq!(h.store.ranking_writes(), 1);
    let currency = h.store.player_currency(1);

    let again = h.state.matches.finish_match(m.id, 2, 10).await;
    assert!(matches!(again, Err(PvpError::AlreadyFinished)));
    assert_eq!(h.store.ranking_writes(), 1);
    assert_eq!(h.store.player_currency(1), currency);

    let stored = h.store.get_match(m.id).await.unwrap().unwrap();
    assert_eq!(stored.winner_id, Some(1));
}

#[tokio::test]
async fn ranked_finish_moves_both_ratings() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Ranked).await;
    let done = h.state.matches.finish_match(m.id, 2, 30).await.unwrap();

    assert_eq!(done.elo_change_of(2), Some(16));
    assert_eq!(done.elo_change_of(1), Some(-16));

    let winner = h.state.rankings.ranking(2, 1).await.unwrap().unwrap();
    let loser = h.state.rankings.ranking(1, 1).await.unwrap().unwrap();
    assert_eq!((winner.elo, winner.wins, winner.win_streak), (1016, 1, 1));
    assert_eq!((loser.elo, loser.losses, loser.win_streak), (984, 1, 0));
}

#[tokio::test]
async fn casual_finish_leaves_ratings_alone() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Casual).await;
    let done = h.state.matches.finish_match(m.id, 1, 30).await.unwrap();

    assert_eq!(done.elo_change_player1, None);
    assert_eq!(done.elo_change_player2, None);
    assert_eq!(h.store.ranking_writes(), 0);
    assert!(h.state.rankings.ranking(1, 1).await.unwrap().is_none());

    let won = h.store.player_currency(1);
    assert!((40..=80).contains(&won));
    assert_eq!(h.store.player_currency(2), won * 30 / 100);
}

#[tokio::test]
async fn rewards_credit_currency_and_beast_experience() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Ranked).await;
    h.state.matches.finish_match(m.id, 1, 30).await.unwrap();

    // equal levels
    let winner_beast = m.beast_of(1).unwrap();
    let loser_beast = m.beast_of(2).unwrap();
    assert_eq!(h.store.beast_experience(winner_beast), 50);
    assert_eq!(h.store.beast_experience(loser_beast), 25);
}

#[tokio::test]
async fn finish_rejects_bad_input() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Casual).await;

    let outsider = h.state.matches.finish_match(m.id, 3, 10).await;
    assert!(matches!(outsider, Err(PvpError::InvalidWinner)));

    let negative = h.state.matches.finish_match(m.id, 1, -1).await;
    assert!(matches!(negative, Err(PvpError::InvalidRequest(_))));

    let missing = h.state.matches.finish_match(9999, 1, 10).await;
    assert!(matches!(missing, Err(PvpError::MatchNotFound)));

    let reporter = h.state.matches.finish_reported_by(3, m.id, 1, 10).await;
    assert!(matches!(reporter, Err(PvpError::NotAParticipant)));

    assert!(!h.store.get_match(m.id).await.unwrap().unwrap().is_finished());
}

#[tokio::test]
async fn finish_pushes_personal_results() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Ranked).await;
    let (_, mut rx1) = h.state.notifier.register(1);
    let (_, mut rx2) = h.state.notifier.register(2);

    h.state.matches.finish_match(m.id, 1, 30).await.unwrap();

    let state_of = |msgs: Vec<ServerMsg>| {
        msgs.into_iter().find_map(|msg| match msg {
            ServerMsg::MatchState {
                elo_change,
                rewards,
                finished,
                ..
            } => Some((elo_change, rewards, finished)),
            _ => None,
        })
    };
    let (elo1, rewards1, finished) = state_of(drain(&mut rx1)).unwrap();
    let (elo2, rewards2, _) = state_of(drain(&mut rx2)).unwrap();
    assert!(finished);
    assert_eq!((elo1, elo2), (Some(16), Some(-16)));
    // loser sat at 1000: silver pays 2x
    assert_eq!(rewards1.currency, 200);
    assert_eq!(rewards2.currency, 60);
}

#[tokio::test]
async fn relay_forwards_valid_actions_to_the_opponent() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Casual).await;
    let (_, mut rx2) = h.state.notifier.register(2);

    let beast = m.beast_of(1).unwrap();
    h.state
        .matches
        .relay_action(m.id, 1, technique("vine_lash"), &snapshot(beast), None)
        .await
        .unwrap();

    let forwarded = drain(&mut rx2);
    assert!(matches!(
        forwarded.as_slice(),
        [ServerMsg::MatchAction { from_player: 1, .. }]
    ));
    let stored = h.state.matches.get_match(m.id, 2).await.unwrap();
    assert_eq!(stored.action_log.len(), 1);
    assert_eq!(stored.action_log[0].player_id, 1);
}

#[tokio::test]
async fn relay_rejections() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Casual).await;
    let beast = m.beast_of(1).unwrap();

    let flee = PvpAction {
        kind: ActionKind::Flee,
        technique_id: None,
        reported_damage: None,
    };
    let res = h
        .state
        .matches
        .relay_action(m.id, 1, flee, &snapshot(beast), None)
        .await;
    assert!(matches!(res, Err(PvpError::InvalidAction(_))));

    let res = h
        .state
        .matches
        .relay_action(m.id, 3, technique("vine_lash"), &snapshot(beast), None)
        .await;
    assert!(matches!(res, Err(PvpError::NotAParticipant)));

    let mut inflated = technique("vine_lash");
    inflated.reported_damage = Some(50);
    let res = h
        .state
        .matches
        .relay_action(m.id, 1, inflated, &snapshot(beast), Some(30))
        .await;
    assert!(matches!(res, Err(PvpError::InvalidAction(_))));

    let res = h
        .state
        .matches
        .relay_action(777, 1, technique("vine_lash"), &snapshot(beast), None)
        .await;
    assert!(matches!(res, Err(PvpError::NotAParticipant)));

    h.state.matches.finish_match(m.id, 2, 5).await.unwrap();
    let res = h
        .state
        .matches
        .relay_action(m.id, 1, technique("vine_lash"), &snapshot(beast), None)
        .await;
    assert!(matches!(res, Err(PvpError::AlreadyFinished)));

    let stored = h.store.get_match(m.id).await.unwrap().unwrap();
    assert!(stored.action_log.is_empty());
}

#[tokio::test]
async fn only_participants_can_read_a_match() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Casual).await;
    assert!(h.state.matches.get_match(m.id, 1).await.is_ok());
    assert!(matches!(
        h.state.matches.get_match(m.id, 3).await,
        Err(PvpError::NotAParticipant)
    ));
    assert_eq!(h.state.matches.history(2).await.unwrap().len(), 1);
    assert!(h.state.matches.history(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn outsiders_cannot_tell_missing_matches_from_foreign_ones() {
    let h = harness();
    let m = h.matched(1, 2, QueueKind::Casual).await;

    let foreign = h.state.matches.get_match(m.id, 3).await.unwrap_err();
    let missing = h.state.matches.get_match(m.id + 1000, 3).await.unwrap_err();
    assert_eq!(foreign.to_string(), missing.to_string());
    assert_eq!(foreign.status_code(), missing.status_code());

    let reported = h.state.matches.finish_reported_by(3, m.id + 1000, 3, 10).await;
    assert!(matches!(reported, Err(PvpError::NotAParticipant)));
}

#[tokio::test]
async fn ranked_result_lands_in_the_running_season() {
    let h = harness_with(Settings {
        season_cache_ttl: 0,
        ..Settings::default()
    });
    let m = h.matched(1, 2, QueueKind::Ranked).await;
    assert_eq!(m.season_number, 1);

    // season 1 runs out while the fight is on
    let mut old = season(1, 0);
    old.start_date = Utc::now() - Duration::days(31);
    old.end_date = Utc::now() - Duration::seconds(1);
    h.store.insert_season(old);

    let done = h.state.matches.finish_match(m.id, 2, 42).await.unwrap();
    assert_eq!(done.elo_change_of(2), Some(16));
    assert_eq!(h.state.seasons.current_number().await.unwrap(), 2);

    let now = h.store.ranking(2, 2).await.unwrap().unwrap();
    assert_eq!((now.elo, now.wins), (1016, 1));
    let loser = h.store.ranking(1, 2).await.unwrap().unwrap();
    assert_eq!((loser.elo, loser.losses), (984, 1));

    // the closed ladder and its payout table stay as they were
    let before = h.store.ranking(2, 1).await.unwrap().unwrap();
    assert_eq!((before.elo, before.wins), (1000, 0));
    let table = h.state.seasons.season_rewards(1).await.unwrap();
    let order: Vec<_> = table.iter().map(|r| (r.rank, r.player_id)).collect();
    assert_eq!(order, vec![(1, 1), (2, 2)]);
    let ladder = h.state.rankings.leaderboard(1, 10).await.unwrap();
    assert_eq!(ladder[0].player_id, 1);
}
