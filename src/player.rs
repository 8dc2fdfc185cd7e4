//! Player side of a live game
//!
//! Joining a room and reacting to the host's progression: answer buttons while
//! a question is open, feedback after each reveal, final rank at the end.

use crate::channel::RoomLink;
use crate::protocol::{ClientEvent, JoinRoom, QuestionView, ServerEvent, SubmitAnswer, SubmittedAnswer};
use crate::types::{AnswerResult, Player, QuestionKind, RoomCode};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// How long to wait for a rejection before assuming the join worked
pub const JOIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room code and name are required")]
    MissingFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinForm {
    pub room_code: String,
    pub name: String,
    pub avatar: String,
}

impl JoinForm {
    /// Trimmed join request, if code and name are present
    pub fn to_request(&self) -> Result<JoinRoom, JoinError> {
        let room_code = self.room_code.trim();
        let name = self.name.trim();
        if room_code.is_empty() || name.is_empty() {
            return Err(JoinError::MissingFields);
        }
        Ok(JoinRoom {
            room_code: RoomCode::new(room_code),
            player_name: name.to_string(),
            avatar: self.avatar.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Server echoed our player back
    Joined,
    /// Server refused with this message
    Rejected(String),
    /// Nothing heard within the grace period
    Assumed,
}

impl JoinOutcome {
    pub fn is_in(&self) -> bool {
        !matches!(self, JoinOutcome::Rejected(_))
    }
}

/// Ask to join a room and wait up to `grace` for the verdict
pub async fn join_room(
    link: &RoomLink,
    form: &JoinForm,
    grace: Duration,
) -> Result<JoinOutcome, JoinError> {
    let request = form.to_request()?;
    let name = request.player_name.clone();
    let mut events = link.subscribe();

    tracing::info!("Joining room {} as {}", request.room_code, name);
    link.emit(ClientEvent::JoinRoom(request));

    let verdict = async {
        loop {
            match events.recv().await {
                Ok(ServerEvent::PlayerJoined(joined)) if joined.name() == name => {
                    return JoinOutcome::Joined;
                }
                Ok(ServerEvent::Error(message)) => return JoinOutcome::Rejected(message),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Join listener lagged by {} events", n);
                }
                Err(RecvError::Closed) => {
                    // Channel gone: wait out the grace period like a silent server
                    std::future::pending::<()>().await;
                }
            }
        }
    };

    let outcome = tokio::time::timeout(grace, verdict)
        .await
        .unwrap_or(JoinOutcome::Assumed);
    match &outcome {
        JoinOutcome::Rejected(message) => tracing::warn!("Join rejected: {}", message),
        other => tracing::info!("Join result for {}: {:?}", name, other),
    }
    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    /// Joined, waiting for the host to start
    Lobby,
    /// Between questions
    Waiting,
    Answering {
        kind: QuestionKind,
        options: Vec<String>,
        /// Indices toggled on a multi question
        selected: Vec<usize>,
    },
    Submitted,
    Feedback(AnswerResult),
    GameOver {
        /// 1-based place, `None` when we are missing from the results
        rank: Option<usize>,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("No question is open")]
    NotAnswering,
    #[error("No option {0}")]
    NoSuchOption(usize),
    #[error("Select exactly {expected} options, {selected} selected")]
    WrongSelectionCount { expected: usize, selected: usize },
    #[error("Only multi questions take a selection")]
    NotMulti,
}

pub struct PlayerController {
    room: RoomCode,
    name: String,
    link: RoomLink,
    state: PlayerState,
    /// Feedback received ahead of the reveal
    pending: Option<AnswerResult>,
    total_score: u32,
    final_results: Vec<Player>,
}

impl PlayerController {
    pub fn new(room: RoomCode, name: impl Into<String>, link: RoomLink) -> Self {
        Self {
            room,
            name: name.into(),
            link,
            state: PlayerState::Lobby,
            pending: None,
            total_score: 0,
            final_results: Vec::new(),
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    pub fn final_results(&self) -> &[Player] {
        &self.final_results
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, PlayerState::GameOver { .. } | PlayerState::Cancelled)
    }

    /// Apply an inbound event. Returns true when the visible state changed.
    pub fn on_server_event(&mut self, event: &ServerEvent) -> bool {
        if matches!(self.state, PlayerState::Cancelled) {
            return false;
        }

        match event {
            ServerEvent::GameCancelled => {
                tracing::info!("Host ended the game in room {}", self.room);
                self.state = PlayerState::Cancelled;
                true
            }
            ServerEvent::FinalResults(results) => {
                self.final_results = results.clone();
                let rank = results.iter().position(|p| p.name == self.name).map(|i| i + 1);
                tracing::info!("Game over for {}, rank {:?}", self.name, rank);
                self.state = PlayerState::GameOver { rank };
                true
            }
            _ if self.is_over() => false,
            ServerEvent::GameStarted => {
                if self.state != PlayerState::Lobby {
                    return false;
                }
                self.state = PlayerState::Waiting;
                true
            }
            ServerEvent::NewQuestion(view) => {
                self.open(view);
                true
            }
            ServerEvent::AnswerResult(result) => {
                tracing::debug!("Answer result held until reveal: {:?}", result);
                self.pending = Some(*result);
                false
            }
            ServerEvent::RevealResults => {
                let result = self.pending.take().unwrap_or(AnswerResult {
                    is_correct: false,
                    points_earned: 0,
                    total_score: self.total_score,
                });
                self.total_score = result.total_score;
                self.state = PlayerState::Feedback(result);
                true
            }
            _ => false,
        }
    }

    /// Tap an option. Single and true-false answers are sent at once; on a
    /// multi question the option is toggled.
    pub fn choose(&mut self, option: usize) -> Result<(), AnswerError> {
        let PlayerState::Answering {
            kind,
            options,
            selected,
        } = &mut self.state
        else {
            return Err(AnswerError::NotAnswering);
        };
        if option >= options.len() {
            return Err(AnswerError::NoSuchOption(option));
        }

        if *kind == QuestionKind::Multi {
            if let Some(pos) = selected.iter().position(|&i| i == option) {
                selected.remove(pos);
            } else {
                selected.push(option);
            }
            return Ok(());
        }

        let answer = SubmittedAnswer::One(options[option].clone());
        self.submit(answer);
        Ok(())
    }

    /// Send the toggled options of a multi question
    pub fn submit_selection(&mut self) -> Result<(), AnswerError> {
        let PlayerState::Answering {
            kind,
            options,
            selected,
        } = &self.state
        else {
            return Err(AnswerError::NotAnswering);
        };
        if *kind != QuestionKind::Multi {
            return Err(AnswerError::NotMulti);
        }
        let expected = kind.answer_count();
        if selected.len() != expected {
            return Err(AnswerError::WrongSelectionCount {
                expected,
                selected: selected.len(),
            });
        }

        let answer = SubmittedAnswer::Many(selected.iter().map(|&i| options[i].clone()).collect());
        self.submit(answer);
        Ok(())
    }

    fn open(&mut self, view: &QuestionView) {
        tracing::debug!("New question for {}: {}", self.name, view.prompt);
        self.pending = None;
        self.state = PlayerState::Answering {
            kind: view.kind,
            options: view.options.clone(),
            selected: Vec::new(),
        };
    }

    fn submit(&mut self, answer: SubmittedAnswer) {
        tracing::info!("{} answers {:?}", self.name, answer);
        self.state = PlayerState::Submitted;
        self.link.emit(ClientEvent::SubmitAnswer(SubmitAnswer {
            room_code: self.room.clone(),
            player_name: self.name.clone(),
            answer,
        }));
    }
}
