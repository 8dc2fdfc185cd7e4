//! Final standings

use crate::channel::RoomLink;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::types::{Player, RoomCode};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Ask the server to close the game and publish final results
pub fn request_final_results(link: &RoomLink, room: &RoomCode) {
    tracing::info!("Requesting final results for room {}", room);
    link.emit(ClientEvent::GameOver(room.clone()));
}

/// Close the game and wait up to `wait` for the server's final list
pub async fn await_final_results(
    link: &RoomLink,
    room: &RoomCode,
    wait: Duration,
) -> Option<Standings> {
    // Subscribe first so a fast reply is not missed
    let mut events = link.subscribe();
    request_final_results(link, room);

    let results = async {
        loop {
            match events.recv().await {
                Ok(ServerEvent::FinalResults(players)) => return Some(players),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Podium missed {} events", n);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    };

    match tokio::time::timeout(wait, results).await {
        Ok(Some(players)) => {
            tracing::info!("Final results for room {}: {} players", room, players.len());
            Some(Standings::from_results(players))
        }
        Ok(None) => None,
        Err(_) => {
            tracing::warn!("No final results for room {} after {:?}", room, wait);
            None
        }
    }
}

/// Players ordered by score, highest first. Ties keep server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Standings {
    players: Vec<Player>,
}

impl Standings {
    pub fn from_results(mut players: Vec<Player>) -> Self {
        players.sort_by(|a, b| b.score.cmp(&a.score));
        Self { players }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn first(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn second(&self) -> Option<&Player> {
        self.players.get(1)
    }

    pub fn third(&self) -> Option<&Player> {
        self.players.get(2)
    }

    /// Everyone below the podium
    pub fn rest(&self) -> &[Player] {
        self.players.get(3..).unwrap_or(&[])
    }

    /// 1-based place of a player by name
    pub fn rank_of(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p.name == name).map(|i| i + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, score: u32) -> Player {
        Player {
            score,
            ..Player::from_name(name)
        }
    }

    #[test]
    fn test_request_emits_game_over() {
        let (link, mut rx) = RoomLink::new();
        request_final_results(&link, &RoomCode::new("123456"));
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::GameOver(RoomCode::new("123456")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_final_results_sorts_reply() {
        let (link, mut rx) = RoomLink::new();
        let server = link.clone();
        tokio::spawn(async move {
            assert!(matches!(rx.recv().await, Some(ClientEvent::GameOver(_))));
            server.deliver(ServerEvent::RevealResults);
            server.deliver(ServerEvent::FinalResults(vec![player("Ana", 10), player("Luis", 30)]));
        });

        let standings = await_final_results(&link, &RoomCode::new("123456"), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(standings.first().unwrap().name, "Luis");
        assert_eq!(standings.rank_of("Ana"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_final_results_gives_up() {
        let (link, mut rx) = RoomLink::new();
        let started = tokio::time::Instant::now();
        let standings =
            await_final_results(&link, &RoomCode::new("123456"), Duration::from_secs(10)).await;

        assert!(standings.is_none());
        assert_eq!(started.elapsed().as_secs(), 10);
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::GameOver(_))));
    }

    #[test]
    fn test_sorted_with_stable_ties() {
        let standings = Standings::from_results(vec![
            player("Ana", 100),
            player("Luis", 300),
            player("Eva", 100),
            player("Tom", 0),
            player("Sol", 200),
        ]);

        let names: Vec<&str> = standings.players().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Luis", "Sol", "Ana", "Eva", "Tom"]);
        assert_eq!(standings.first().unwrap().name, "Luis");
        assert_eq!(standings.third().unwrap().name, "Ana");
        assert_eq!(standings.rest().len(), 2);
        assert_eq!(standings.rank_of("Eva"), Some(4));
        assert_eq!(standings.rank_of("Nadie"), None);
    }

    #[test]
    fn test_short_podium() {
        let standings = Standings::from_results(vec![player("Ana", 10)]);
        assert!(standings.second().is_none());
        assert!(standings.third().is_none());
        assert!(standings.rest().is_empty());
        assert!(Standings::from_results(Vec::new()).is_empty());
    }
}
