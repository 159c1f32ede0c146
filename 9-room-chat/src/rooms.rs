use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::registry::ClientId;

pub type RoomId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {0} does not exist")]
    NotFound(RoomId),
}

/// What happened to a room after a member left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room still has this many members.
    Remaining(usize),
    /// The leaving client was the last member and the room is gone.
    Deleted,
    /// The room does not exist or the client was not a member.
    NotMember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub members: usize,
}

#[derive(Debug)]
struct RoomState {
    // BTreeMap keeps `/list` output ordered by room number.
    rooms: BTreeMap<RoomId, BTreeSet<ClientId>>,
    next_id: RoomId,
}

impl RoomState {
    fn leave(&mut self, room: RoomId, client: &str) -> LeaveOutcome {
        let Some(members) = self.rooms.get_mut(&room) else {
            return LeaveOutcome::NotMember;
        };
        if !members.remove(client) {
            return LeaveOutcome::NotMember;
        }
        if members.is_empty() {
            self.rooms.remove(&room);
            LeaveOutcome::Deleted
        } else {
            LeaveOutcome::Remaining(members.len())
        }
    }
}

#[derive(Debug)]
pub struct RoomTable {
    state: Mutex<RoomState>,
}

impl Default for RoomTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RoomState {
                rooms: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Allocates the next room id and makes `creator` its only member.
    pub async fn create_room(&self, creator: ClientId) -> RoomId {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        state.rooms.insert(id, BTreeSet::from([creator]));
        id
    }

    pub async fn join_room(&self, room: RoomId, client: ClientId) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;
        let members = state.rooms.get_mut(&room).ok_or(RoomError::NotFound(room))?;
        members.insert(client);
        Ok(())
    }

    pub async fn leave_room(&self, room: RoomId, client: &str) -> LeaveOutcome {
        self.state.lock().await.leave(room, client)
    }

    /// Moves `client` from `from` into `to` in one critical section.
    ///
    /// If `to` does not exist nothing changes, so the client keeps its old
    /// membership. On success the outcome of leaving `from` is returned when
    /// an actual move happened; re-joining the same room leaves nothing.
    pub async fn switch_room(
        &self,
        client: &str,
        from: Option<RoomId>,
        to: RoomId,
    ) -> Result<Option<(RoomId, LeaveOutcome)>, RoomError> {
        let mut state = self.state.lock().await;
        if !state.rooms.contains_key(&to) {
            return Err(RoomError::NotFound(to));
        }
        let left = match from {
            Some(old) if old != to => Some((old, state.leave(old, client))),
            _ => None,
        };
        if let Some(members) = state.rooms.get_mut(&to) {
            members.insert(client.to_string());
        }
        Ok(left)
    }

    /// Members of `room` at one instant, or `None` if the room does not exist.
    pub async fn members_of(&self, room: RoomId) -> Option<Vec<ClientId>> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(&room)
            .map(|members| members.iter().cloned().collect())
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let state = self.state.lock().await;
        state
            .rooms
            .iter()
            .map(|(id, members)| RoomSummary {
                id: *id,
                members: members.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn room_ids_increase_and_are_never_reused() {
        let table = RoomTable::new();

        let first = table.create_room("alice".into()).await;
        assert_eq!(table.leave_room(first, "alice").await, LeaveOutcome::Deleted);
        let second = table.create_room("alice".into()).await;
        let third = table.create_room("bob".into()).await;

        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[tokio::test]
    async fn concurrent_creators_get_distinct_ids() {
        let table = Arc::new(RoomTable::new());
        let mut handles = Vec::new();
        for n in 0..32 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                table.create_room(format!("client-{n}")).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.expect("create task"));
        }
        ids.sort();

        assert_eq!(ids, (1..=32).collect::<Vec<RoomId>>());
    }

    #[tokio::test]
    async fn emptied_room_disappears() {
        let table = RoomTable::new();
        let room = table.create_room("alice".into()).await;
        table.join_room(room, "bob".into()).await.expect("join");

        assert_eq!(table.leave_room(room, "bob").await, LeaveOutcome::Remaining(1));
        assert_eq!(
            table.list_rooms().await,
            vec![RoomSummary { id: room, members: 1 }]
        );
        assert_eq!(table.leave_room(room, "alice").await, LeaveOutcome::Deleted);

        assert_eq!(table.members_of(room).await, None);
        assert!(table.list_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn joining_missing_room_fails() {
        let table = RoomTable::new();

        let result = table.join_room(999, "alice".into()).await;

        assert_eq!(result, Err(RoomError::NotFound(999)));
        assert!(table.list_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn switching_to_missing_room_keeps_old_membership() {
        let table = RoomTable::new();
        let room = table.create_room("alice".into()).await;

        let result = table.switch_room("alice", Some(room), 999).await;

        assert_eq!(result, Err(RoomError::NotFound(999)));
        assert_eq!(table.members_of(room).await, Some(vec!["alice".to_string()]));
    }

    #[tokio::test]
    async fn switching_rooms_moves_the_member_and_deletes_emptied_room() {
        let table = RoomTable::new();
        let first = table.create_room("alice".into()).await;
        let second = table.create_room("bob".into()).await;

        let left = table.switch_room("alice", Some(first), second).await;

        assert_eq!(left, Ok(Some((first, LeaveOutcome::Deleted))));
        assert_eq!(table.members_of(first).await, None);
        assert_eq!(
            table.members_of(second).await,
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
        assert_eq!(table.switch_room("alice", Some(second), second).await, Ok(None));
    }

    #[tokio::test]
    async fn leaving_as_non_member_changes_nothing() {
        let table = RoomTable::new();
        let room = table.create_room("alice".into()).await;

        assert_eq!(table.leave_room(room, "bob").await, LeaveOutcome::NotMember);
        assert_eq!(table.leave_room(42, "alice").await, LeaveOutcome::NotMember);
        assert_eq!(table.members_of(room).await, Some(vec!["alice".to_string()]));
    }

    #[tokio::test]
    async fn rooms_are_listed_in_id_order() {
        let table = RoomTable::new();
        let a = table.create_room("alice".into()).await;
        let b = table.create_room("bob".into()).await;
        table.join_room(a, "carol".into()).await.expect("join");

        let listing = table.list_rooms().await;

        assert_eq!(
            listing,
            vec![
                RoomSummary { id: a, members: 2 },
                RoomSummary { id: b, members: 1 },
            ]
        );
    }
}
