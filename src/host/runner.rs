use super::{Advanced, HostGame, HostSnapshot, PodiumHandoff, TimerToken, TICK};
use crate::protocol::ServerEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

/// Actions from the host's screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Go to the next question (or the podium) after a reveal
    Advance,
    Cancel,
}

#[derive(Debug)]
pub enum HostOutcome {
    Podium(PodiumHandoff),
    Cancelled,
    /// The host left without cancelling; nothing was sent to the room
    Abandoned,
}

/// Drive a [`HostGame`] until it finishes, is cancelled, or the host leaves.
///
/// The game owns its inbound subscription and its timer for the lifetime of
/// this call. Dropping the command sender is treated as leaving the screen:
/// the pending timer and the subscription are released without emitting
/// anything.
///
/// After every step the game's [`HostSnapshot`] is published on `status`
/// when it changed.
pub async fn run_host_game(
    mut game: HostGame,
    mut events: broadcast::Receiver<ServerEvent>,
    mut commands: mpsc::Receiver<HostCommand>,
    status: watch::Sender<HostSnapshot>,
) -> HostOutcome {
    let mut armed: Option<(TimerToken, Instant)> = None;
    let mut events_open = true;

    loop {
        publish(&game, &status);

        // Re-arm only when the game armed a new token; a changed or cleared
        // token drops the old deadline.
        armed = match (game.armed_timer(), armed) {
            (Some(token), Some((current, deadline))) if token == current => {
                Some((current, deadline))
            }
            (Some(token), _) => Some((token, Instant::now() + TICK)),
            (None, _) => None,
        };

        let deadline = armed.map(|(_, deadline)| deadline);
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = timer => {
                if let Some((token, _)) = armed.take() {
                    game.on_timer(token);
                }
            }

            event = events.recv(), if events_open => {
                match event {
                    Ok(event) => game.on_server_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Host missed {} real-time events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Real-time channel closed; reveals now rely on the timer");
                        events_open = false;
                    }
                }
            }

            command = commands.recv() => {
                match command {
                    Some(HostCommand::Advance) => match game.advance() {
                        Ok(Advanced::Finished(handoff)) => {
                            publish(&game, &status);
                            return HostOutcome::Podium(handoff);
                        }
                        Ok(Advanced::Question(_)) => {}
                        Err(e) => tracing::warn!("Ignoring advance: {}", e),
                    },
                    Some(HostCommand::Cancel) => {
                        game.cancel();
                        publish(&game, &status);
                        return HostOutcome::Cancelled;
                    }
                    None => {
                        tracing::info!("Host left room {}", game.room());
                        return HostOutcome::Abandoned;
                    }
                }
            }
        }
    }
}

fn publish(game: &HostGame, status: &watch::Sender<HostSnapshot>) {
    let snapshot = game.snapshot();
    status.send_if_modified(|current| {
        if *current == snapshot {
            return false;
        }
        *current = snapshot;
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RoomLink;
    use crate::host::Phase;
    use crate::protocol::ClientEvent;
    use crate::types::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn one_question_game(players: usize, time: u32) -> (HostGame, RoomLink, mpsc::UnboundedReceiver<ClientEvent>) {
        let mut question = Question::single("Q0");
        question.time_limit = time;
        let mut quiz = Quiz::new("Runner");
        quiz.questions = vec![question];

        let roster = (0..players).map(|i| Player::from_name(format!("P{}", i))).collect();
        let (link, rx) = RoomLink::new();
        let game = HostGame::new(RoomCode::new("424242"), Arc::new(quiz), roster, link.clone())
            .unwrap();
        (game, link, rx)
    }

    fn spawn_runner(
        game: HostGame,
        link: &RoomLink,
        commands: mpsc::Receiver<HostCommand>,
    ) -> (tokio::task::JoinHandle<HostOutcome>, watch::Receiver<HostSnapshot>) {
        let (status, status_rx) = watch::channel(game.snapshot());
        let task = tokio::spawn(run_host_game(game, link.subscribe(), commands, status));
        (task, status_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_emits_nothing() {
        let (game, link, mut rx) = one_question_game(1, 20);
        let (tx, commands) = mpsc::channel(4);
        let (task, _status) = spawn_runner(game, &link, commands);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(tx);

        assert!(matches!(task.await.unwrap(), HostOutcome::Abandoned));
        // Long after leaving, no countdown or question may be sent
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_question() {
        let (game, link, mut rx) = one_question_game(3, 20);
        let (tx, commands) = mpsc::channel(4);
        let (task, _status) = spawn_runner(game, &link, commands);

        assert!(matches!(rx.recv().await, Some(ClientEvent::SendQuestion(_))));
        tx.send(HostCommand::Cancel).await.unwrap();

        assert!(matches!(task.await.unwrap(), HostOutcome::Cancelled));
        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::CancelGame(RoomCode::new("424242")))
        );
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_takes_three_seconds() {
        let (game, link, mut rx) = one_question_game(1, 20);
        let (_tx, commands) = mpsc::channel(4);
        let started = Instant::now();
        let (_task, _status) = spawn_runner(game, &link, commands);

        assert!(matches!(rx.recv().await, Some(ClientEvent::SendQuestion(_))));
        assert_eq!(started.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_before_reveal_is_ignored() {
        let (game, link, mut rx) = one_question_game(1, 5);
        let (tx, commands) = mpsc::channel(4);
        let (task, status) = spawn_runner(game, &link, commands);

        assert!(matches!(rx.recv().await, Some(ClientEvent::SendQuestion(_))));
        tx.send(HostCommand::Advance).await.unwrap();

        // Timeout reveal still happens after the full window
        let opened = Instant::now();
        assert!(matches!(rx.recv().await, Some(ClientEvent::ShowResults(_))));
        assert_eq!(opened.elapsed().as_secs(), 5);
        assert_eq!(status.borrow().phase, Phase::Revealing { index: 0 });

        tx.send(HostCommand::Advance).await.unwrap();
        assert!(matches!(task.await.unwrap(), HostOutcome::Podium(_)));
        assert_eq!(status.borrow().phase, Phase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_tracks_countdown_answers_and_stats() {
        let (game, link, mut rx) = one_question_game(2, 20);
        let (_tx, commands) = mpsc::channel(4);
        let (_task, mut status) = spawn_runner(game, &link, commands);

        assert_eq!(status.borrow_and_update().phase, Phase::PreCountdown(3));
        status.changed().await.unwrap();
        assert_eq!(status.borrow_and_update().phase, Phase::PreCountdown(2));

        assert!(matches!(rx.recv().await, Some(ClientEvent::SendQuestion(_))));
        {
            let snap = status.borrow_and_update();
            assert_eq!(snap.clock(), "20");
            assert_eq!(snap.progress().as_deref(), Some("1 / 1"));
            assert_eq!(snap.question.as_ref().unwrap().prompt, "Q0");
        }

        link.deliver(ServerEvent::PlayerAnswered);
        link.deliver(ServerEvent::UpdateStats(vec![1, 0, 0, 0]));
        status.changed().await.unwrap();
        while status.borrow().tally != [1, 0, 0, 0] {
            status.changed().await.unwrap();
        }
        let snap = status.borrow_and_update().clone();
        assert_eq!(snap.answers_count, 1);
        assert_eq!(snap.roster_size, 2);
        assert_eq!(snap.bars(), [100, 0, 0, 0]);
    }
}
