use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::rooms::RoomId;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Reads one newline-delimited line, returning `None` once the peer closes the stream.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD rather than failing the read.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let bytes = reader.read_until(b'\n', &mut buf).await?;
    if bytes == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(LINE_ENDINGS).to_string()))
}

pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Flush every line so interactive peers (netcat, the bundled client) see it immediately.
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Server-to-client text lines.
pub mod notice {
    use std::fmt::Display;

    use super::RoomId;

    pub const HELP: &[&str] = &[
        "commands:",
        "list rooms : /list",
        "create room : /create",
        "join room : /join [room number]",
        "exit room : /exit",
        "quit : /bye",
    ];

    pub const NO_ROOMS: &str = "no rooms have been created";
    pub const ROOM_LIST_HEADER: &str = "rooms:";
    pub const USERS_HEADER: &str = "online users:";
    pub const ROOM_USERS_HEADER: &str = "room users:";
    pub const NOT_IN_ROOM: &str = "you are not in a room";
    pub const INVALID_ROOM_NUMBER: &str = "please enter a valid room number";
    pub const YOU_LEFT_ROOM: &str = "you left the room";
    pub const SHUTTING_DOWN: &str = "server shutting down";

    pub fn joined_chat(id: &str) -> String {
        format!("{id} joined the chat")
    }

    pub fn left_chat(id: &str) -> String {
        format!("{id} left the chat")
    }

    pub fn room_created(room: RoomId) -> String {
        format!("room {room} created")
    }

    pub fn room_deleted(room: RoomId) -> String {
        format!("room {room} deleted")
    }

    pub fn room_missing(room: impl Display) -> String {
        format!("room {room} does not exist")
    }

    pub fn joined_room(id: &str) -> String {
        format!("{id} joined the room")
    }

    pub fn left_room(id: &str) -> String {
        format!("{id} left the room")
    }

    pub fn room_entry(room: RoomId, members: usize) -> String {
        format!("room {room} ({members} users)")
    }

    pub fn chat(id: &str, text: &str) -> String {
        format!("{id} : {text}")
    }

    pub fn whisper(from: &str, text: &str) -> String {
        format!("secret message from {from}: {text}")
    }

    pub fn id_taken(id: &str) -> String {
        format!("id {id} is already in use")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_line_strips_crlf_and_reports_eof() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = tokio::io::BufReader::new(reader);

        writer.write_all(b"hello\r\n/list\n").await.expect("write");
        drop(writer);

        assert_eq!(read_line(&mut reader).await.expect("first"), Some("hello".into()));
        assert_eq!(read_line(&mut reader).await.expect("second"), Some("/list".into()));
        assert_eq!(read_line(&mut reader).await.expect("eof"), None);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_rejected() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = tokio::io::BufReader::new(reader);

        writer.write_all(b"caf\xe9\n").await.expect("write");

        assert_eq!(
            read_line(&mut reader).await.expect("read"),
            Some("caf\u{FFFD}".into())
        );
    }

    #[tokio::test]
    async fn blank_lines_are_preserved() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = tokio::io::BufReader::new(reader);

        write_line(&mut writer, "").await.expect("write");

        assert_eq!(read_line(&mut reader).await.expect("read"), Some(String::new()));
    }
}
