use serde::{Deserialize, Serialize};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Chronological, append-only list of messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
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

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Messages appended at or after `index`
    pub fn since(&self, index: usize) -> &[Message] {
        self.messages.get(index..).unwrap_or(&[])
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_keeps_order_and_duplicates() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        transcript.push(Message::assistant("hello"));
        transcript.push(Message::user("hi"));

        let roles: Vec<Role> = transcript.iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.last().map(Message::content), Some("hi"));
    }

    #[test]
    fn test_since() {
        let mut transcript = Transcript::new();
        transcript.push(Message::assistant("greeting"));
        transcript.push(Message::user("q"));
        transcript.push(Message::assistant("a"));

        assert_eq!(transcript.since(1).len(), 2);
        assert!(transcript.since(3).is_empty());
        assert!(transcript.since(10).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_message_array() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("What is iPSC?"));
        transcript.push(Message::assistant("Induced pluripotent stem cells."));

        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "role": "user", "content": "What is iPSC?" },
                { "role": "assistant", "content": "Induced pluripotent stem cells." }
            ])
        );

        let back: Transcript = serde_json::from_value(json).unwrap();
        assert_eq!(back, transcript);
    }
}
