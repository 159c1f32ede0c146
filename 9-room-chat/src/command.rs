#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bye,
    Whisper { to: String, text: String },
    /// A `/whisper` line without both a recipient and a message.
    MalformedWhisper,
    Create,
    /// Any integer, negative included; the session decides whether the room exists.
    Join(i64),
    /// A `/join` line whose argument is missing or not an integer.
    InvalidRoomNumber,
    Exit,
    List,
    Users,
    RoomUsers,
    Chat(String),
}

impl Command {
    /// `/bye` first, then the prefix-matched `/whisper`, `/create` and `/join`,
    /// then the exact commands. Anything else is chat.
    pub fn parse(line: &str) -> Self {
        if line.eq_ignore_ascii_case("/bye") {
            return Command::Bye;
        }
        if line.starts_with("/whisper") {
            return parse_whisper(line);
        }
        if line.starts_with("/create") {
            return Command::Create;
        }
        if line.starts_with("/join") {
            return parse_join(line);
        }

        match line {
            "/exit" => Command::Exit,
            "/list" => Command::List,
            "/users" => Command::Users,
            "/roomusers" => Command::RoomUsers,
            text => Command::Chat(text.to_string()),
        }
    }
}

// `/whisper <to> <text>`: the recipient sits between the first and second
// space, everything after the second space is the message.
fn parse_whisper(line: &str) -> Command {
    let Some((_, rest)) = line.split_once(' ') else {
        return Command::MalformedWhisper;
    };
    match rest.split_once(' ') {
        Some((to, text)) => Command::Whisper {
            to: to.to_string(),
            text: text.to_string(),
        },
        None => Command::MalformedWhisper,
    }
}

fn parse_join(line: &str) -> Command {
    line.split(' ')
        .nth(1)
        .and_then(|arg| arg.parse::<i64>().ok())
        .map_or(Command::InvalidRoomNumber, Command::Join)
}
