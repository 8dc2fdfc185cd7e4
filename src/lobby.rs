//! Host waiting room
//!
//! Opens a room for a quiz, keeps the roster in sync while players join and
//! hands everything to the host game on start.

use crate::channel::RoomLink;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::types::{Player, Quiz, RoomCode};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Quiz '{0}' has no questions")]
    EmptyQuiz(String),
}

pub struct HostLobby {
    room: RoomCode,
    quiz: Arc<Quiz>,
    roster: Vec<Player>,
    link: RoomLink,
}

impl HostLobby {
    /// Generate a room code and announce the room
    pub fn open(quiz: Arc<Quiz>, link: RoomLink) -> Self {
        Self::open_with_code(RoomCode::generate(), quiz, link)
    }

    pub fn open_with_code(room: RoomCode, quiz: Arc<Quiz>, link: RoomLink) -> Self {
        tracing::info!("Opening room {} for quiz '{}'", room, quiz.title);
        link.emit(ClientEvent::CreateRoom(room.clone()));
        Self {
            room,
            quiz,
            roster: Vec::new(),
            link,
        }
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

    /// Apply a roster event. Returns true when the roster changed.
    pub fn on_server_event(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::UpdatePlayerList(players) => {
                self.roster = players.clone();
                tracing::debug!("Room {} roster now {} players", self.room, self.roster.len());
                true
            }
            ServerEvent::PlayerJoined(joined) => {
                if self.roster.iter().any(|p| p.name == joined.name()) {
                    tracing::debug!("Player {} already in room {}", joined.name(), self.room);
                    return false;
                }
                tracing::info!("{} joined room {}", joined.name(), self.room);
                self.roster.push(joined.clone().into_player());
                true
            }
            _ => false,
        }
    }

    /// Tell players the game is starting and hand over to progression
    pub fn start(self) -> Result<(RoomCode, Arc<Quiz>, Vec<Player>), LobbyError> {
        if self.quiz.questions.is_empty() {
            return Err(LobbyError::EmptyQuiz(self.quiz.title.clone()));
        }
        tracing::info!(
            "Starting room {} with {} players",
            self.room,
            self.roster.len()
        );
        self.link.emit(ClientEvent::StartGame(self.room.clone()));
        Ok((self.room, self.quiz, self.roster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JoinedPlayer;
    use crate::types::Question;

    fn quiz_with_question() -> Arc<Quiz> {
        let mut quiz = Quiz::new("Geografía");
        quiz.questions.push(Question::single("Capital de Perú?"));
        Arc::new(quiz)
    }

    #[test]
    fn test_open_announces_room() {
        let (link, mut rx) = RoomLink::new();
        let lobby = HostLobby::open(quiz_with_question(), link);

        assert_eq!(lobby.room().as_str().len(), 6);
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::CreateRoom(lobby.room().clone()));
        assert!(lobby.roster().is_empty());
    }

    #[test]
    fn test_roster_updates_and_dedupe() {
        let (link, _rx) = RoomLink::new();
        let mut lobby = HostLobby::open_with_code(RoomCode::new("123456"), quiz_with_question(), link);

        assert!(lobby.on_server_event(&ServerEvent::PlayerJoined(JoinedPlayer::Name("Ana".into()))));
        assert!(!lobby.on_server_event(&ServerEvent::PlayerJoined(JoinedPlayer::Full(
            Player::from_name("Ana")
        ))));
        assert!(lobby.on_server_event(&ServerEvent::PlayerJoined(JoinedPlayer::Name("Luis".into()))));
        assert_eq!(lobby.roster().len(), 2);

        // Full list from the server is authoritative
        lobby.on_server_event(&ServerEvent::UpdatePlayerList(vec![Player::from_name("Luis")]));
        assert_eq!(lobby.roster().len(), 1);
        assert_eq!(lobby.roster()[0].name, "Luis");

        assert!(!lobby.on_server_event(&ServerEvent::GameStarted));
    }

    #[test]
    fn test_start_emits_and_hands_over() {
        let (link, mut rx) = RoomLink::new();
        let mut lobby = HostLobby::open_with_code(RoomCode::new("654321"), quiz_with_question(), link);
        lobby.on_server_event(&ServerEvent::PlayerJoined(JoinedPlayer::Name("Ana".into())));
        let _ = rx.try_recv();

        let (room, quiz, roster) = lobby.start().unwrap();
        assert_eq!(room.as_str(), "654321");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(roster.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::StartGame(room));
    }

    #[test]
    fn test_start_empty_quiz_fails_silently() {
        let (link, mut rx) = RoomLink::new();
        let lobby = HostLobby::open_with_code(RoomCode::new("111111"), Arc::new(Quiz::new("Vacío")), link);
        let _ = rx.try_recv();

        assert_eq!(lobby.start().unwrap_err(), LobbyError::EmptyQuiz("Vacío".to_string()));
        assert!(rx.try_recv().is_err());
    }
}
