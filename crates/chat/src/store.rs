use chrono::{DateTime, Utc};

use crate::message::{Message, MessageId, MessageKey};

/// Ordered message list for one conversation.
///
/// Append-only, except for the single provisional assistant message which is
/// rewritten in place while a reply streams and re-keyed once it completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn provisional(&self) -> Option<&Message> {
        self.messages.iter().find(|message| message.is_provisional())
    }

    fn contains_key(&self, key: MessageKey) -> bool {
        self.messages.iter().any(|message| message.key == key)
    }

    /// Appends a message unless its key is already taken.
    pub fn append(&mut self, message: Message) -> bool {
        if self.contains_key(message.key) {
            tracing::warn!(
                key = %message.key,
                role = %message.role,
                "rejected append of a message whose key is already in the store"
            );
            return false;
        }

        self.messages.push(message);
        true
    }

    /// Writes the running reply text into the provisional message, creating it
    /// on the first fragment of a turn.
    ///
    /// A provisional message that is no longer the tail (an abandoned turn
    /// followed by a new user message) is moved to the end so the reply stays
    /// below the prompt it answers.
    pub fn upsert_provisional(&mut self, text: impl Into<String>, at: DateTime<Utc>) -> &[Message] {
        let text = text.into();

        match self
            .messages
            .iter()
            .position(|message| message.is_provisional())
        {
            Some(index) if index + 1 == self.messages.len() => {
                let message = &mut self.messages[index];
                message.text = text;
                message.at = at;
            }
            Some(index) => {
                let mut message = self.messages.remove(index);
                message.text = text;
                message.at = at;
                self.messages.push(message);
            }
            None => self.messages.push(Message::provisional(text, at)),
        }

        &self.messages
    }

    /// Re-keys the provisional message to `new_id`.
    ///
    /// No-op when there is nothing provisional or `new_id` is already in use.
    pub fn finalize_provisional(&mut self, new_id: MessageId) -> bool {
        let new_key = MessageKey::Final(new_id);
        if self.contains_key(new_key) {
            tracing::warn!(id = %new_id, "refusing to finalize onto an identifier already in use");
            return false;
        }

        let Some(message) = self
            .messages
            .iter_mut()
            .find(|message| message.is_provisional())
        else {
            return false;
        };

        message.key = new_key;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn provisional_count(store: &ConversationStore) -> usize {
        store
            .messages()
            .iter()
            .filter(|message| message.is_provisional())
            .count()
    }

    #[test]
    fn append_rejects_duplicate_keys() {
        let mut store = ConversationStore::new();
        let message = Message::user("hi", Utc::now());

        assert!(store.append(message.clone()));
        assert!(!store.append(message));
        assert_eq!(store.len(), 1);

        assert!(store.append(Message::provisional("", Utc::now())));
        assert!(!store.append(Message::provisional("again", Utc::now())));
        assert_eq!(provisional_count(&store), 1);
    }

    #[test]
    fn upsert_creates_then_rewrites_in_place() {
        let mut store = ConversationStore::new();
        store.append(Message::user("Hi", Utc::now()));

        let first_at = Utc::now();
        let messages = store.upsert_provisional("He", first_at);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "He");
        assert_eq!(messages[1].role, Role::Assistant);

        let later = first_at + chrono::Duration::seconds(1);
        store.upsert_provisional("Hello", later);
        assert_eq!(store.len(), 2);
        let last = store.last().expect("provisional reply");
        assert!(last.is_provisional());
        assert_eq!(last.text, "Hello");
        assert_eq!(last.at, later);
    }

    #[test]
    fn stale_provisional_moves_behind_the_newest_prompt() {
        let mut store = ConversationStore::new();
        store.append(Message::user("A", Utc::now()));
        store.upsert_provisional("partial", Utc::now());
        store.append(Message::user("B", Utc::now()));

        store.upsert_provisional("fresh", Utc::now());

        let texts = store
            .messages()
            .iter()
            .map(|message| message.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, ["A", "B", "fresh"]);
        assert_eq!(provisional_count(&store), 1);
    }

    #[test]
    fn finalize_rekeys_exactly_once() {
        let mut store = ConversationStore::new();
        store.upsert_provisional("Hello", Utc::now());

        let id = MessageId::new_v7();
        assert!(store.finalize_provisional(id));
        assert!(!store.finalize_provisional(MessageId::new_v7()));

        let last = store.last().expect("finalized reply");
        assert_eq!(last.key, MessageKey::Final(id));
        assert_eq!(last.text, "Hello");
        assert!(store.provisional().is_none());
    }

    #[test]
    fn finalize_without_provisional_is_noop() {
        let mut store = ConversationStore::new();
        store.append(Message::user("Hi", Utc::now()));
        let before = store.clone();

        assert!(!store.finalize_provisional(MessageId::new_v7()));
        assert_eq!(store, before);
    }

    #[test]
    fn finalize_refuses_an_identifier_already_in_use() {
        let mut store = ConversationStore::new();
        let user = Message::user("Hi", Utc::now());
        let taken = user.key.final_id().expect("user messages are final");
        store.append(user);
        store.upsert_provisional("Hello", Utc::now());

        assert!(!store.finalize_provisional(taken));
        assert!(store.provisional().is_some());
    }
}
