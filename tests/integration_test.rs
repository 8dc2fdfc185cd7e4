use cyraquiz::channel::RoomLink;
use cyraquiz::host::{run_host_game, HostCommand, HostGame, HostOutcome, Phase};
use cyraquiz::lobby::HostLobby;
use cyraquiz::player::{join_room, JoinForm, JoinOutcome, PlayerController, PlayerState, JOIN_GRACE};
use cyraquiz::podium::await_final_results;
use cyraquiz::protocol::{ClientEvent, JoinedPlayer, QuestionView, ServerEvent, SubmittedAnswer};
use cyraquiz::types::{AnswerResult, Player, Question, Quiz, RoomCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

fn two_question_quiz() -> Quiz {
    let mut q0 = Question::single("¿Capital de Perú?");
    q0.options = vec![
        "Quito".to_string(),
        "Lima".to_string(),
        "Bogotá".to_string(),
        "Caracas".to_string(),
    ];
    q0.answer = cyraquiz::types::CorrectAnswer::One("Lima".to_string());
    q0.time_limit = 20;

    let mut q1 = Question::true_false("El Sol es una estrella", true);
    q1.time_limit = 10;

    let mut quiz = Quiz::new("Cultura general");
    quiz.questions = vec![q0, q1];
    quiz
}

fn scored(name: &str, score: u32) -> Player {
    Player {
        score,
        ..Player::from_name(name)
    }
}

/// End-to-end host game: lobby, two questions (early reveal then timeout), podium
#[tokio::test(start_paused = true)]
async fn test_full_game_flow() {
    let (host_link, mut host_rx) = RoomLink::new();
    let (player_link, mut player_rx) = RoomLink::new();

    // 1. Host opens the room
    let mut lobby = HostLobby::open_with_code(
        RoomCode::new("246810"),
        Arc::new(two_question_quiz()),
        host_link.clone(),
    );
    assert_eq!(
        host_rx.recv().await,
        Some(ClientEvent::CreateRoom(RoomCode::new("246810")))
    );

    // 2. Ana joins; the server echoes her back
    let join_link = player_link.clone();
    let join = tokio::spawn(async move {
        let form = JoinForm {
            room_code: "246810".to_string(),
            name: "Ana".to_string(),
            avatar: "/avatars/nemo.png".to_string(),
        };
        join_room(&join_link, &form, JOIN_GRACE).await
    });
    let request = match player_rx.recv().await {
        Some(ClientEvent::JoinRoom(request)) => request,
        other => panic!("Expected join_room, got {:?}", other),
    };
    assert_eq!(request.room_code.as_str(), "246810");
    player_link.deliver(ServerEvent::PlayerJoined(JoinedPlayer::Name(
        request.player_name.clone(),
    )));
    assert_eq!(join.await.unwrap().unwrap(), JoinOutcome::Joined);

    lobby.on_server_event(&ServerEvent::PlayerJoined(JoinedPlayer::Name("Ana".into())));
    lobby.on_server_event(&ServerEvent::PlayerJoined(JoinedPlayer::Full(Player::from_name("Luis"))));
    assert_eq!(lobby.roster().len(), 2);

    // 3. Start
    let (room, quiz, roster) = lobby.start().unwrap();
    assert_eq!(host_rx.recv().await, Some(ClientEvent::StartGame(room.clone())));

    let mut ana = PlayerController::new(room.clone(), "Ana", player_link.clone());
    ana.on_server_event(&ServerEvent::GameStarted);
    assert_eq!(ana.state(), &PlayerState::Waiting);

    let game = HostGame::new(room.clone(), quiz, roster, host_link.clone()).unwrap();
    let (commands_tx, commands) = mpsc::channel(4);
    let (status_tx, status) = watch::channel(game.snapshot());
    let started = Instant::now();
    let runner = tokio::spawn(run_host_game(game, host_link.subscribe(), commands, status_tx));

    // 4. Question 0 goes out after the 3 second countdown
    let sent = match host_rx.recv().await {
        Some(ClientEvent::SendQuestion(sent)) => sent,
        other => panic!("Expected send_question, got {:?}", other),
    };
    assert_eq!(started.elapsed().as_secs(), 3);
    assert_eq!(sent.time, 20);
    assert_eq!(sent.question.prompt, "¿Capital de Perú?");

    ana.on_server_event(&ServerEvent::NewQuestion(QuestionView::from(&sent.question)));
    ana.choose(1).unwrap();
    match player_rx.recv().await {
        Some(ClientEvent::SubmitAnswer(submit)) => {
            assert_eq!(submit.player_name, "Ana");
            assert_eq!(submit.answer, SubmittedAnswer::One("Lima".to_string()));
        }
        other => panic!("Expected submit_answer, got {:?}", other),
    }

    // 5. Both players answer: reveal without waiting for the clock
    host_link.deliver(ServerEvent::PlayerAnswered);
    host_link.deliver(ServerEvent::UpdateStats(vec![0, 1, 0, 0]));
    host_link.deliver(ServerEvent::PlayerAnswered);
    assert_eq!(host_rx.recv().await, Some(ClientEvent::ShowResults(room.clone())));
    assert_eq!(started.elapsed().as_secs(), 3);
    {
        let snap = status.borrow();
        assert_eq!(snap.phase, Phase::Revealing { index: 0 });
        assert_eq!(snap.answers_count, 2);
        assert_eq!(snap.progress().as_deref(), Some("1 / 2"));
        assert_eq!(snap.correct_slots(), [false, true, false, false]);
        assert_eq!(snap.bars(), [0, 100, 0, 0]);
    }

    let result = AnswerResult {
        is_correct: true,
        points_earned: 100,
        total_score: 100,
    };
    ana.on_server_event(&ServerEvent::AnswerResult(result));
    assert_eq!(ana.state(), &PlayerState::Submitted);
    ana.on_server_event(&ServerEvent::RevealResults);
    assert_eq!(ana.state(), &PlayerState::Feedback(result));

    // 6. Next question; nobody answers so the 10 second clock reveals it
    commands_tx.send(HostCommand::Advance).await.unwrap();
    let opened = Instant::now();
    match host_rx.recv().await {
        Some(ClientEvent::SendQuestion(sent)) => {
            assert_eq!(sent.time, 10);
            assert_eq!(sent.question.options, ["Verdadero", "Falso"]);
        }
        other => panic!("Expected send_question, got {:?}", other),
    }
    assert_eq!(host_rx.recv().await, Some(ClientEvent::ShowResults(room.clone())));
    assert_eq!(opened.elapsed().as_secs(), 10);

    // 7. Advancing past the last question hands over to the podium
    commands_tx.send(HostCommand::Advance).await.unwrap();
    let handoff = match runner.await.unwrap() {
        HostOutcome::Podium(handoff) => handoff,
        other => panic!("Expected podium, got {:?}", other),
    };
    assert_eq!(handoff.room, room);
    assert_eq!(handoff.roster.len(), 2);

    let podium_link = host_link.clone();
    let podium_room = handoff.room.clone();
    let podium = tokio::spawn(async move {
        await_final_results(&podium_link, &podium_room, Duration::from_secs(10)).await
    });
    assert_eq!(host_rx.recv().await, Some(ClientEvent::GameOver(room.clone())));

    // The server reports the list already ranked
    let reported = vec![scored("Luis", 200), scored("Ana", 100)];
    host_link.deliver(ServerEvent::FinalResults(reported.clone()));
    let standings = podium.await.unwrap().expect("final results should arrive");
    assert_eq!(standings.first().unwrap().name, "Luis");
    assert_eq!(standings.first().unwrap().score, 200);
    assert_eq!(standings.second().unwrap().score, 100);
    assert_eq!(standings.rank_of("Ana"), Some(2));

    ana.on_server_event(&ServerEvent::FinalResults(reported));
    assert_eq!(ana.state(), &PlayerState::GameOver { rank: Some(2) });

    // Nothing else was sent
    assert!(host_rx.try_recv().is_err());
}

/// Host cancels mid-question; players get sent back
#[tokio::test(start_paused = true)]
async fn test_cancel_reaches_players() {
    let (host_link, mut host_rx) = RoomLink::new();
    let (player_link, _player_rx) = RoomLink::new();
    let room = RoomCode::new("135790");

    let game = HostGame::new(
        room.clone(),
        Arc::new(two_question_quiz()),
        vec![Player::from_name("Ana")],
        host_link.clone(),
    )
    .unwrap();
    let (commands_tx, commands) = mpsc::channel(4);
    let (status_tx, status) = watch::channel(game.snapshot());
    let runner = tokio::spawn(run_host_game(game, host_link.subscribe(), commands, status_tx));

    let mut ana = PlayerController::new(room.clone(), "Ana", player_link);
    ana.on_server_event(&ServerEvent::GameStarted);

    let sent = match host_rx.recv().await {
        Some(ClientEvent::SendQuestion(sent)) => sent,
        other => panic!("Expected send_question, got {:?}", other),
    };
    ana.on_server_event(&ServerEvent::NewQuestion(QuestionView::from(&sent.question)));

    commands_tx.send(HostCommand::Cancel).await.unwrap();
    assert!(matches!(runner.await.unwrap(), HostOutcome::Cancelled));
    assert_eq!(status.borrow().phase, Phase::Cancelled);
    assert_eq!(host_rx.recv().await, Some(ClientEvent::CancelGame(room)));

    ana.on_server_event(&ServerEvent::GameCancelled);
    assert_eq!(ana.state(), &PlayerState::Cancelled);
    assert!(ana.choose(0).is_err());
}

/// Events travel as newline-delimited JSON over the relay transport
#[tokio::test]
async fn test_lobby_over_relay_stream() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let (client_side, server_side) = tokio::io::duplex(4096);
    let (client_read, client_write) = tokio::io::split(client_side);
    let (server_read, mut server_write) = tokio::io::split(server_side);
    let (link, relay) = RoomLink::attach(client_read, client_write);
    let mut events = link.subscribe();

    let mut lobby = HostLobby::open_with_code(
        RoomCode::new("112233"),
        Arc::new(two_question_quiz()),
        link.clone(),
    );

    let mut frames = BufReader::new(server_read).lines();
    let frame = frames.next_line().await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["event"], "create_room");
    assert_eq!(value["data"], "112233");

    server_write
        .write_all(b"{\"event\":\"player_joined\",\"data\":\"Ana\"}\n")
        .await
        .unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(
        event,
        ServerEvent::PlayerJoined(JoinedPlayer::Name("Ana".to_string()))
    );

    assert!(lobby.on_server_event(&event));
    assert_eq!(lobby.roster()[0].name, "Ana");

    relay.shutdown();
}
