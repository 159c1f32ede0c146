use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    registry::{ClientRegistry, Delivery},
    rooms::{RoomId, RoomTable},
};

/// Fan-out over the shared registry and room table.
///
/// Never holds both locks at once: room membership is copied out and the room
/// lock released before any registry delivery starts.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    rooms: Arc<RoomTable>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>, rooms: Arc<RoomTable>) -> Self {
        Self { registry, rooms }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    pub async fn to_all(&self, line: &str) -> usize {
        self.registry.deliver_all(line).await
    }

    /// Everyone online except `id`.
    pub async fn to_others(&self, id: &str, line: &str) -> usize {
        self.registry.deliver_all_except(Some(id), line).await
    }

    /// Delivers to every member of `room` that is still registered.
    pub async fn to_room(&self, room: RoomId, line: &str) -> usize {
        let Some(members) = self.rooms.members_of(room).await else {
            debug!(room, "room broadcast to missing room dropped");
            return 0;
        };

        let mut delivered = 0;
        for member in &members {
            match self.registry.deliver_to(member, line).await {
                Delivery::Delivered => delivered += 1,
                Delivery::Absent | Delivery::Purged => {
                    debug!(room, client = %member, "skipping member without a live sink");
                }
            }
        }
        delivered
    }

    pub async fn to_one(&self, id: &str, line: &str) -> bool {
        match self.registry.deliver_to(id, line).await {
            Delivery::Delivered => true,
            Delivery::Absent => {
                warn!(recipient = %id, "recipient not found, message dropped");
                false
            }
            Delivery::Purged => {
                warn!(recipient = %id, "recipient disconnected, message dropped");
                false
            }
        }
    }
}
