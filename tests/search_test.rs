//! Integration tests: searches against a scripted engine.

mod common;

use futures::StreamExt;
use std::time::Duration;
use uci_client::{Position, Score, ScoreValue, SearchRequest, SessionState, UciError};

const HANDSHAKE: &str = include_str!("fixtures/handshake.txt");
const SEARCH_DEPTH: &str = include_str!("fixtures/search_depth.txt");
const SEARCH_STOP: &str = include_str!("fixtures/search_stop.txt");
const SEARCH_PONDER: &str = include_str!("fixtures/search_ponder.txt");
const SEARCH_TRUNCATED: &str = include_str!("fixtures/search_truncated.txt");
const QUIT: &str = include_str!("fixtures/quit.txt");

#[tokio::test]
async fn test_depth_search_streams_infos_then_best_move() {
    let (mut session, engine) = common::replay(&[HANDSHAKE, SEARCH_DEPTH, QUIT]);
    session.handshake().await.unwrap();

    let mut search = session.go(SearchRequest::depth(3)).await.unwrap();
    assert_eq!(session.state(), SessionState::BusySearching);

    let mut infos = Vec::new();
    while let Some(info) = search.next_info().await {
        infos.push(info);
    }
    // The malformed `info depth bogus` line is not delivered
    assert_eq!(infos.len(), 4);
    assert_eq!(
        infos[0].string.as_deref(),
        Some("NNUE evaluation using nn-5af11540bbfe.nnue enabled")
    );
    let depths: Vec<Option<u32>> = infos[1..].iter().map(|i| i.depth).collect();
    assert_eq!(depths, vec![Some(1), Some(2), Some(3)]);

    let last = &infos[3];
    assert_eq!(
        last.score,
        Some(Score {
            value: ScoreValue::Centipawns(51),
            lower_bound: false,
            upper_bound: true,
        })
    );
    assert_eq!(last.time, Some(Duration::from_millis(2)));
    assert_eq!(
        last.pv.as_deref(),
        Some(&["g1f3".to_string(), "b8c6".to_string(), "f1c4".to_string()][..])
    );

    let best = search.best_move().await.unwrap();
    // The result resolves only after the session is idle again
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(best.best, "g1f3");
    assert_eq!(best.ponder.as_deref(), Some("b8c6"));

    session.quit().await.unwrap();
    let replay = engine.await.unwrap().unwrap();
    assert!(replay.trailing.is_empty(), "unexpected {:?}", replay.trailing);
}

#[tokio::test]
async fn test_best_move_only_consumer() {
    let (mut session, engine) = common::replay(&[HANDSHAKE, SEARCH_DEPTH, QUIT]);
    session.handshake().await.unwrap();

    let best = session
        .go(SearchRequest::depth(3))
        .await
        .unwrap()
        .best_move()
        .await
        .unwrap();
    assert_eq!(best.best, "g1f3");
    assert_eq!(session.state(), SessionState::Idle);

    session.quit().await.unwrap();
    engine.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (mut session, engine) = common::replay(&[HANDSHAKE, SEARCH_STOP, QUIT]);
    session.handshake().await.unwrap();

    let (control, mut infos, best_move) = session
        .go(SearchRequest::infinite())
        .await
        .unwrap()
        .into_parts();

    let first = infos.next().await.unwrap();
    assert_eq!(first.depth, Some(1));

    // Only the first stop reaches the engine; a second one would break the script
    control.stop().await.unwrap();
    control.stop().await.unwrap();

    // Reports sent between stop and bestmove are still delivered
    let rest: Vec<_> = infos.collect().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].depth, Some(2));

    let best = best_move.await.unwrap();
    assert_eq!(best.best, "e2e4");
    assert_eq!(best.ponder.as_deref(), Some("e7e5"));

    // After bestmove, stop is a no-op
    assert!(control.is_finished());
    control.stop().await.unwrap();
    drop(control);

    session.quit().await.unwrap();
    let replay = engine.await.unwrap().unwrap();
    assert!(replay.trailing.is_empty(), "unexpected {:?}", replay.trailing);
}

#[tokio::test]
async fn test_ponder_hit_once() {
    let (mut session, engine) = common::replay(&[HANDSHAKE, SEARCH_PONDER, QUIT]);
    session.handshake().await.unwrap();

    let request = SearchRequest {
        ponder: true,
        white_time: Some(Duration::from_secs(60)),
        black_time: Some(Duration::from_secs(60)),
        white_increment: Some(Duration::from_secs(1)),
        black_increment: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let mut search = session.go(request).await.unwrap();

    assert_eq!(search.next_info().await.unwrap().depth, Some(1));
    search.ponder_hit().await.unwrap();
    assert!(matches!(
        search.ponder_hit().await,
        Err(UciError::ProtocolViolation { command: "ponderhit", .. })
    ));

    let (infos, best) = search.finish().await;
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].score, Some(Score::mate(3)));
    let best = best.unwrap();
    assert_eq!(best.best, "e7e5");
    assert_eq!(best.ponder, None);

    session.quit().await.unwrap();
    let replay = engine.await.unwrap().unwrap();
    assert!(replay.trailing.is_empty(), "unexpected {:?}", replay.trailing);
}

#[tokio::test]
async fn test_idle_commands_rejected_while_searching() {
    let (mut session, engine) = common::replay(&[HANDSHAKE, SEARCH_STOP, QUIT]);
    session.handshake().await.unwrap();

    let search = session.go(SearchRequest::infinite()).await.unwrap();
    assert!(matches!(
        session.position(Position::StartPos, Vec::<String>::new()).await,
        Err(UciError::ProtocolViolation { command: "position", .. })
    ));
    assert!(matches!(
        session.go(SearchRequest::depth(1)).await,
        Err(UciError::ProtocolViolation { command: "go", .. })
    ));
    assert!(matches!(
        session.is_ready().await,
        Err(UciError::ProtocolViolation { command: "isready", .. })
    ));

    search.stop().await.unwrap();
    let (infos, best) = search.finish().await;
    assert_eq!(infos.len(), 2);
    assert_eq!(best.unwrap().best, "e2e4");

    session.quit().await.unwrap();
    engine.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_engine_exit_mid_search() {
    let (mut session, engine) = common::replay(&[HANDSHAKE, SEARCH_TRUNCATED]);
    session.handshake().await.unwrap();

    let search = session
        .go(SearchRequest::move_time(Duration::from_secs(1)))
        .await
        .unwrap();
    let (infos, best) = search.finish().await;
    assert_eq!(infos.len(), 2);

    match best {
        Err(UciError::SearchFailure {
            infos_delivered,
            cause,
        }) => {
            assert_eq!(infos_delivered, 2);
            assert!(matches!(
                *cause,
                UciError::UnexpectedEndOfStream { awaiting: "bestmove", .. }
            ));
        }
        other => panic!("expected a search failure, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Idle);

    drop(session);
    engine.await.unwrap().unwrap();
}
