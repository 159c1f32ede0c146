use std::ops::ControlFlow;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    broadcaster::Broadcaster,
    command::Command,
    message::{notice, read_line, write_line},
    registry::{ClientId, Sink},
    rooms::{LeaveOutcome, RoomId},
};

/// Runs a complete session over one duplex stream.
///
/// Returns once the client has quit or disconnected and every resource tied to
/// the connection has been released.
pub async fn serve<R, W>(mut reader: R, writer: W, hub: Broadcaster) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let Some(id) = read_line(&mut reader)
        .await
        .context("failed to read client id")?
    else {
        debug!("connection closed before handshake");
        return Ok(());
    };

    let (outbox, outbound) = Sink::channel();
    let writer_task = tokio::spawn(pump_outbound(outbound, writer));

    if let Err(err) = hub.registry().register(id.clone(), outbox.clone()).await {
        warn!(client = %id, error = %err, "registration refused");
        if outbox.deliver(notice::id_taken(&id)).is_err() {
            debug!(client = %id, "could not notify refused client");
        }
        drop(outbox);
        finish_writer(writer_task).await;
        return Err(err.into());
    }

    info!(client = %id, "client joined");
    hub.to_others(&id, &notice::joined_chat(&id)).await;

    let mut session = Session::new(id, outbox, hub);
    for line in notice::HELP {
        session.reply(*line);
    }

    let outcome = session.run(&mut reader).await;
    session.terminate().await;
    drop(reader);
    finish_writer(writer_task).await;

    outcome
}

/// Per-client state: who this is and which room, if any, it is talking in.
#[derive(Debug)]
pub struct Session {
    id: ClientId,
    current_room: Option<RoomId>,
    outbox: Sink,
    hub: Broadcaster,
}

impl Session {
    pub fn new(id: ClientId, outbox: Sink, hub: Broadcaster) -> Self {
        Self {
            id,
            current_room: None,
            outbox,
            hub,
        }
    }

    async fn run<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            let line = match read_line(reader).await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(client = %self.id, "client closed the connection");
                    return Ok(());
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to read from {}", self.id));
                }
            };

            if self.dispatch(Command::parse(&line)).await.is_break() {
                debug!(client = %self.id, "client said bye");
                return Ok(());
            }
        }
    }

    /// Applies one command. Breaks when the session should end.
    pub async fn dispatch(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Bye => return ControlFlow::Break(()),
            Command::Whisper { to, text } => self.whisper(&to, &text).await,
            Command::MalformedWhisper => {
                debug!(client = %self.id, "ignoring whisper without recipient and text");
            }
            Command::Create => self.create_room().await,
            Command::Join(room) => self.join_room(room).await,
            Command::InvalidRoomNumber => self.reply(notice::INVALID_ROOM_NUMBER),
            Command::Exit => self.exit_room().await,
            Command::List => self.list_rooms().await,
            Command::Users => self.list_users().await,
            Command::RoomUsers => self.list_room_users().await,
            Command::Chat(text) => self.chat(&text).await,
        }
        ControlFlow::Continue(())
    }

    async fn whisper(&self, to: &str, text: &str) {
        // The sender is not told when the recipient is unknown; only the server logs it.
        self.hub.to_one(to, &notice::whisper(&self.id, text)).await;
    }

    async fn create_room(&mut self) {
        self.leave_current_room().await;
        let room = self.hub.rooms().create_room(self.id.clone()).await;
        self.current_room = Some(room);
        info!(client = %self.id, room, "room created");

        self.reply(notice::room_created(room));
        self.hub.to_room(room, &notice::joined_room(&self.id)).await;
    }

    async fn join_room(&mut self, number: i64) {
        let Ok(room) = RoomId::try_from(number) else {
            self.reply(notice::room_missing(number));
            return;
        };

        let switched = self
            .hub
            .rooms()
            .switch_room(&self.id, self.current_room, room)
            .await;
        match switched {
            Ok(left) => {
                if let Some((old, outcome)) = left {
                    self.announce_departure(old, outcome).await;
                }
                self.current_room = Some(room);
                debug!(client = %self.id, room, "joined room");
                self.hub.to_room(room, &notice::joined_room(&self.id)).await;
            }
            Err(err) => {
                debug!(client = %self.id, error = %err, "join failed");
                self.reply(notice::room_missing(room));
            }
        }
    }

    async fn exit_room(&mut self) {
        if self.current_room.is_none() {
            return;
        }
        self.leave_current_room().await;
        self.reply(notice::YOU_LEFT_ROOM);
    }

    /// Leaves the current room, announcing it to the members left behind.
    async fn leave_current_room(&mut self) {
        let Some(room) = self.current_room.take() else {
            return;
        };

        let outcome = self.hub.rooms().leave_room(room, &self.id).await;
        self.announce_departure(room, outcome).await;
    }

    async fn announce_departure(&self, room: RoomId, outcome: LeaveOutcome) {
        self.hub.to_room(room, &notice::left_room(&self.id)).await;
        if outcome == LeaveOutcome::Deleted {
            info!(room, "room deleted");
            self.reply(notice::room_deleted(room));
        }
    }

    async fn list_rooms(&self) {
        let rooms = self.hub.rooms().list_rooms().await;
        if rooms.is_empty() {
            self.reply(notice::NO_ROOMS);
            return;
        }
        self.reply(notice::ROOM_LIST_HEADER);
        for room in rooms {
            self.reply(notice::room_entry(room.id, room.members));
        }
    }

    async fn list_users(&self) {
        let ids = self.hub.registry().snapshot_ids().await;
        self.reply(notice::USERS_HEADER);
        for id in ids {
            self.reply(id);
        }
    }

    async fn list_room_users(&self) {
        let members = match self.current_room {
            Some(room) => self.hub.rooms().members_of(room).await,
            None => None,
        };
        let Some(members) = members.filter(|members| !members.is_empty()) else {
            self.reply(notice::NOT_IN_ROOM);
            return;
        };
        self.reply(notice::ROOM_USERS_HEADER);
        for id in members {
            self.reply(id);
        }
    }

    async fn chat(&self, text: &str) {
        let line = notice::chat(&self.id, text);
        match self.current_room {
            Some(room) => {
                self.hub.to_room(room, &line).await;
            }
            None => {
                self.hub.to_all(&line).await;
            }
        }
    }

    fn reply(&self, line: impl Into<String>) {
        if self.outbox.deliver(line).is_err() {
            debug!(client = %self.id, "reply dropped, client writer is gone");
        }
    }

    /// Removes every trace of this client and tells everyone it left.
    async fn terminate(mut self) {
        if let Some(room) = self.current_room.take() {
            self.hub.rooms().leave_room(room, &self.id).await;
        }
        self.hub
            .registry()
            .unregister_sink(&self.id, &self.outbox)
            .await;
        self.hub.to_all(&notice::left_chat(&self.id)).await;
        info!(client = %self.id, "client left");
    }
}

async fn pump_outbound<W>(mut outbound: mpsc::Receiver<String>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outbound.recv().await {
        if let Err(error) = write_line(&mut writer, &line).await {
            // Dropping the receiver closes the sink, so the next delivery purges this client.
            debug!(?error, "failed to deliver line to client");
            return;
        }
    }

    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shut down client writer cleanly");
    }
}

async fn finish_writer(task: JoinHandle<()>) {
    if let Err(error) = task.await {
        warn!(?error, "client writer task failed");
    }
}
