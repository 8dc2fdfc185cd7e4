//! Host-side game progression
//!
//! Sequences a quiz for a live room: a 3..2..1 countdown, then for every
//! question a broadcast, a timed answer window and a reveal, until the host
//! advances past the last question or cancels.
//!
//! [`HostGame`] is a plain state machine. It never sleeps; instead it keeps at
//! most one armed timer identified by a [`TimerToken`]. Whoever drives it (see
//! [`run_host_game`]) fires the timer one [`TICK`] after arming. Every
//! transition replaces or clears the token, so a timer armed for a state that
//! has since been left is rejected by [`HostGame::on_timer`] without touching
//! any state.

mod display;
mod runner;

pub use display::{bar_percentages, format_clock, is_urgent, progress_label};
pub use runner::{run_host_game, HostCommand, HostOutcome};

use crate::channel::RoomLink;
use crate::protocol::{tally_from, ClientEvent, SendQuestion, ServerEvent};
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;

/// Seconds shown before the first question
pub const PRE_COUNTDOWN_SECONDS: u8 = 3;

/// Resolution of every host timer
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// "Ready?" countdown before question 0
    PreCountdown(u8),
    Answering { index: usize, seconds_left: u32 },
    Revealing { index: usize },
    Finished,
    Cancelled,
}

impl Phase {
    pub fn question_index(self) -> Option<usize> {
        match self {
            Phase::Answering { index, .. } | Phase::Revealing { index } => Some(index),
            _ => None,
        }
    }

    /// Question clock; `None` before the first question
    pub fn seconds_left(self) -> Option<u32> {
        match self {
            Phase::Answering { seconds_left, .. } => Some(seconds_left),
            Phase::Revealing { .. } => Some(0),
            _ => None,
        }
    }
}

/// Host screen state as published by [`run_host_game`]
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub phase: Phase,
    /// Question being asked or revealed
    pub question: Option<Question>,
    pub total_questions: usize,
    pub answers_count: u32,
    pub roster_size: usize,
    pub tally: Tally,
}

impl HostSnapshot {
    pub fn clock(&self) -> String {
        format_clock(self.phase.seconds_left())
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self.phase, Phase::Answering { .. }) && is_urgent(self.phase.seconds_left())
    }

    /// "2 / 10" while a question is on screen
    pub fn progress(&self) -> Option<String> {
        self.phase
            .question_index()
            .map(|index| progress_label(index, self.total_questions))
    }

    /// Options to highlight as correct; nothing before the reveal
    pub fn correct_slots(&self) -> [bool; MAX_OPTIONS] {
        match (&self.phase, &self.question) {
            (Phase::Revealing { .. }, Some(question)) => question.correct_slots(),
            _ => [false; MAX_OPTIONS],
        }
    }

    pub fn bars(&self) -> [u32; MAX_OPTIONS] {
        bar_percentages(&self.tally)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostGameError {
    #[error("Quiz has no questions")]
    EmptyQuiz,
    #[error("Can only advance while revealing, current phase is {0:?}")]
    NotRevealing(Phase),
}

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

/// What the podium screen needs once the last question is done
#[derive(Debug, Clone)]
pub struct PodiumHandoff {
    pub room: RoomCode,
    pub quiz: Arc<Quiz>,
    pub roster: Vec<Player>,
}

/// Result of a successful host advance
#[derive(Debug)]
pub enum Advanced {
    /// Question at this index is now open
    Question(usize),
    Finished(PodiumHandoff),
}

pub struct HostGame {
    room: RoomCode,
    quiz: Arc<Quiz>,
    roster: Vec<Player>,
    link: RoomLink,
    phase: Phase,
    answers_count: u32,
    tally: Tally,
    timer: Option<TimerToken>,
    next_token: u64,
}

impl HostGame {
    /// Start progression for a room. The countdown timer is armed immediately.
    ///
    /// The roster is captured once; players joining or leaving later do not
    /// change the "everyone answered" threshold.
    pub fn new(
        room: RoomCode,
        quiz: Arc<Quiz>,
        roster: Vec<Player>,
        link: RoomLink,
    ) -> Result<Self, HostGameError> {
        if quiz.questions.is_empty() {
            return Err(HostGameError::EmptyQuiz);
        }

        tracing::info!(
            "Host game for room {} with {} questions and {} players",
            room,
            quiz.questions.len(),
            roster.len()
        );

        let mut game = Self {
            room,
            quiz,
            roster,
            link,
            phase: Phase::PreCountdown(PRE_COUNTDOWN_SECONDS),
            answers_count: 0,
            tally: [0; MAX_OPTIONS],
            timer: None,
            next_token: 0,
        };
        game.arm_timer();
        Ok(game)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn answers_count(&self) -> u32 {
        self.answers_count
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    /// Token of the pending timer, if any
    pub fn armed_timer(&self) -> Option<TimerToken> {
        self.timer
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Cancelled)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.phase.question_index()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_index().map(|i| &self.quiz.questions[i])
    }

    /// Seconds left on the question clock; `None` before the first question
    pub fn seconds_left(&self) -> Option<u32> {
        self.phase.seconds_left()
    }

    /// Copy of what the host screen shows right now
    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            phase: self.phase,
            question: self.current_question().cloned(),
            total_questions: self.quiz.questions.len(),
            answers_count: self.answers_count,
            roster_size: self.roster.len(),
            tally: self.tally,
        }
    }

    /// Apply a fired timer. Returns false when the token is stale.
    pub fn on_timer(&mut self, token: TimerToken) -> bool {
        if self.timer != Some(token) {
            tracing::debug!("Ignoring superseded timer {:?} in {:?}", token, self.phase);
            return false;
        }
        self.timer = None;

        match self.phase {
            Phase::PreCountdown(n) => {
                let remaining = n.saturating_sub(1);
                if remaining == 0 {
                    self.open_question(0);
                } else {
                    self.phase = Phase::PreCountdown(remaining);
                    self.arm_timer();
                }
            }
            Phase::Answering {
                index,
                seconds_left,
            } => {
                let remaining = seconds_left.saturating_sub(1);
                if remaining == 0 {
                    tracing::info!("Time is up for question {}", index + 1);
                    self.reveal(index);
                } else {
                    self.phase = Phase::Answering {
                        index,
                        seconds_left: remaining,
                    };
                    self.arm_timer();
                }
            }
            // Timers are never armed in these phases
            Phase::Revealing { .. } | Phase::Finished | Phase::Cancelled => {}
        }
        true
    }

    /// Route an inbound real-time event; events the host does not care about are ignored
    pub fn on_server_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::PlayerAnswered => self.on_player_answered(),
            ServerEvent::UpdateStats(counts) => self.on_stats(counts),
            _ => {}
        }
    }

    pub fn on_player_answered(&mut self) {
        let (Phase::Answering { index, .. } | Phase::Revealing { index }) = self.phase else {
            tracing::debug!("Answer notification outside a question ({:?})", self.phase);
            return;
        };

        self.answers_count += 1;
        tracing::debug!(
            "Question {}: {}/{} answered",
            index + 1,
            self.answers_count,
            self.roster.len()
        );

        let everyone_answered =
            !self.roster.is_empty() && self.answers_count as usize >= self.roster.len();
        if everyone_answered && matches!(self.phase, Phase::Answering { .. }) {
            tracing::info!("All players answered question {}", index + 1);
            self.reveal(index);
        }
    }

    pub fn on_stats(&mut self, counts: &[u32]) {
        if matches!(
            self.phase,
            Phase::Answering { .. } | Phase::Revealing { .. }
        ) {
            self.tally = tally_from(counts);
        }
    }

    /// Host pressed "next" on the reveal screen
    pub fn advance(&mut self) -> Result<Advanced, HostGameError> {
        let Phase::Revealing { index } = self.phase else {
            return Err(HostGameError::NotRevealing(self.phase));
        };

        if Some(index) == self.quiz.last_index() {
            tracing::info!("Room {} finished all questions", self.room);
            self.phase = Phase::Finished;
            self.timer = None;
            return Ok(Advanced::Finished(PodiumHandoff {
                room: self.room.clone(),
                quiz: Arc::clone(&self.quiz),
                roster: self.roster.clone(),
            }));
        }

        self.open_question(index + 1);
        Ok(Advanced::Question(index + 1))
    }

    /// Host cancelled the game. Only the first call notifies the room.
    pub fn cancel(&mut self) -> bool {
        if self.is_over() {
            return false;
        }
        tracing::info!("Host cancelled room {}", self.room);
        self.timer = None;
        self.phase = Phase::Cancelled;
        self.link.emit(ClientEvent::CancelGame(self.room.clone()));
        true
    }

    fn open_question(&mut self, index: usize) {
        let question = &self.quiz.questions[index];
        let time = question.effective_time_limit();

        self.answers_count = 0;
        self.tally = [0; MAX_OPTIONS];
        self.phase = Phase::Answering {
            index,
            seconds_left: time,
        };

        tracing::info!(
            "Sending question {}/{} to room {}: {}",
            index + 1,
            self.quiz.questions.len(),
            self.room,
            question.prompt
        );
        self.link.emit(ClientEvent::SendQuestion(SendQuestion {
            room_code: self.room.clone(),
            question: question.clone(),
            time,
        }));
        self.arm_timer();
    }

    fn reveal(&mut self, index: usize) {
        self.timer = None;
        self.phase = Phase::Revealing { index };
        self.link.emit(ClientEvent::ShowResults(self.room.clone()));
    }

    fn arm_timer(&mut self) {
        self.timer = Some(TimerToken(self.next_token));
        self.next_token += 1;
    }
}
