/// Chat identity (numeric, platform assigned).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of conversation a message was posted in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatKind::Private => "private",
            ChatKind::Group => "group",
            ChatKind::Supergroup => "supergroup",
            ChatKind::Channel => "channel",
        }
    }
}

/// A message carried by an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    /// Unix timestamp (seconds) the platform assigned when the message was sent.
    pub sent_at: i64,
    pub text: Option<String>,
}

impl Message {
    /// Age of the message relative to `now` (unix seconds). Clock skew can make this negative.
    pub fn age_at(&self, now: i64) -> i64 {
        now.saturating_sub(self.sent_at)
    }
}

/// One entry of the platform's update stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub id: i64,
    pub message: Option<Message>,
}

/// Identity returned by the handshake call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}
