//! Room endpoints

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CampfireClient;
use crate::error::{ClientError, Result};

/// A chat room of the account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Room {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RoomList {
    rooms: Vec<Room>,
}

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    message: MessageBody<'a>,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    body: &'a str,
}

impl CampfireClient {
    // =============================================================================
    // Rooms
    // =============================================================================

    /// List the rooms visible to the token's user
    pub async fn rooms(&self) -> Result<Vec<Room>> {
        let url = format!("{}/rooms.json", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;

        let list: RoomList = self.handle_response(response).await?;
        Ok(list.rooms)
    }

    /// Post a text message to a room
    ///
    /// # Arguments
    /// * `room` - Room ID
    /// * `text` - Message body
    pub async fn speak(&self, room: u64, text: &str) -> Result<()> {
        let url = format!("{}/room/{}/speak.json", self.base_url, room);
        let request = SpeakRequest {
            message: MessageBody { body: text },
        };
        let response = self
            .authorized(self.client.post(&url))
            .json(&request)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Post a message to every given room
    ///
    /// Every room is checked against the account's room list first; nothing
    /// is posted if one of them does not exist.
    pub async fn announce(&self, room_ids: &[u64], text: &str) -> Result<()> {
        if room_ids.is_empty() {
            return Ok(());
        }

        let rooms = self.rooms().await?;
        check_rooms(&rooms, room_ids)?;

        for &room in room_ids {
            debug!("Posting to Campfire room {}", room);
            self.speak(room, text).await?;
        }

        Ok(())
    }
}

/// Fails on the first id that is not in `rooms`
fn check_rooms(rooms: &[Room], room_ids: &[u64]) -> Result<()> {
    match room_ids
        .iter()
        .find(|id| !rooms.iter().any(|room| room.id == **id))
    {
        Some(&missing) => Err(ClientError::UnknownRoom(missing)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms() -> Vec<Room> {
        serde_json::from_str::<RoomList>(
            r#"{"rooms": [{"id": 8343, "name": "Ops", "topic": "deploys"}, {"id": 234223, "name": "Dev"}]}"#,
        )
        .unwrap()
        .rooms
    }

    #[test]
    fn test_parse_room_list() {
        let rooms = rooms();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].name, "Ops");
    }

    #[test]
    fn test_check_rooms() {
        let rooms = rooms();
        assert!(check_rooms(&rooms, &[8343, 234223]).is_ok());
        assert!(matches!(
            check_rooms(&rooms, &[8343, 1]),
            Err(ClientError::UnknownRoom(1))
        ));
    }

    #[test]
    fn test_speak_body() {
        let request = SpeakRequest {
            message: MessageBody { body: "hello" },
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"message":{"body":"hello"}}"#
        );
    }
}
