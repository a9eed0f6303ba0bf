use std::collections::HashSet;

use crate::domain::ChatId;

// ============== Authorization ==============

/// Chats permitted to issue commands.
///
/// An empty list authorizes nobody.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    chats: HashSet<i64>,
}

impl AllowList {
    pub fn new(chats: impl IntoIterator<Item = i64>) -> Self {
        Self {
            chats: chats.into_iter().collect(),
        }
    }

    pub fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.chats.contains(&chat_id.0)
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

pub fn is_authorized(chat_id: Option<ChatId>, allowed_chats: &AllowList) -> bool {
    let Some(chat_id) = chat_id else {
        return false;
    };
    allowed_chats.is_allowed(chat_id)
}
