//! Real-time channel events
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`; events
//! without a payload omit `data`.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Events this client emits to the real-time server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateRoom(RoomCode),
    StartGame(RoomCode),
    SendQuestion(SendQuestion),
    ShowResults(RoomCode),
    CancelGame(RoomCode),
    SubmitAnswer(SubmitAnswer),
    JoinRoom(JoinRoom),
    GameOver(RoomCode),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendQuestion {
    pub room_code: RoomCode,
    pub question: Question,
    /// Seconds the answer window stays open
    pub time: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    pub room_code: RoomCode,
    pub player_name: String,
    pub answer: SubmittedAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_code: RoomCode,
    pub player_name: String,
    pub avatar: String,
}

/// A player's answer: one option text, or the selected texts of a multi question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    One(String),
    Many(Vec<String>),
}

/// Events the real-time server pushes to this client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UpdatePlayerList(Vec<Player>),
    PlayerJoined(JoinedPlayer),
    NewQuestion(QuestionView),
    PlayerAnswered,
    /// Aggregate per-option counts; best effort, not sent for every answer
    UpdateStats(Vec<u32>),
    RevealResults,
    AnswerResult(AnswerResult),
    /// Final standings, sorted by score descending
    FinalResults(Vec<Player>),
    GameStarted,
    GameCancelled,
    Error(String),
}

/// Payload of `player_joined`: older servers send just the name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JoinedPlayer {
    Full(Player),
    Name(String),
}

impl JoinedPlayer {
    pub fn name(&self) -> &str {
        match self {
            JoinedPlayer::Full(player) => &player.name,
            JoinedPlayer::Name(name) => name,
        }
    }

    pub fn into_player(self) -> Player {
        match self {
            JoinedPlayer::Full(player) => player,
            JoinedPlayer::Name(name) => Player::from_name(name),
        }
    }
}

/// Question as seen by players. The server may strip the correct answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(rename = "question", default)]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            kind: q.kind,
            prompt: q.prompt.clone(),
            options: q.options.clone(),
            time: Some(q.effective_time_limit()),
        }
    }
}

/// Normalize a stats payload into a fixed-size tally (extra slots dropped, missing ones zero)
pub fn tally_from(counts: &[u32]) -> Tally {
    let mut tally = [0; MAX_OPTIONS];
    for (slot, count) in tally.iter_mut().zip(counts.iter()) {
        *slot = *count;
    }
    tally
}
