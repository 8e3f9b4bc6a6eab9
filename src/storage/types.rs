use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking about the document
    User,
    /// The answering assistant
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message
///
/// Serialized as `{"role": "...", "content": "...", "isError": true}`, with
/// `isError` omitted unless set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// Marks an assistant message that replaced a failed answer
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    /// Creates a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::storage::{Message, Role};
    ///
    /// let msg = Message::user("What is the total?");
    /// assert_eq!(msg.role, Role::User);
    /// assert!(!msg.is_error);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates an assistant message flagged as an error
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_error: true,
        }
    }
}

/// A persisted conversation about one uploaded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Server-issued session identifier from the upload
    pub id: String,
    /// Uploaded document's filename
    pub name: String,
    /// Refreshed on every persisted change
    pub last_updated: DateTime<Utc>,
    /// Ordered conversation
    pub messages: Vec<Message>,
}

impl ChatSession {
    /// Creates a session stamped with the current time
    pub fn new(id: impl Into<String>, name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            last_updated: Utc::now(),
            messages,
        }
    }

    /// Plain-text export: `ROLE: content` blocks separated by blank lines
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::storage::{ChatSession, Message};
    ///
    /// let session = ChatSession::new(
    ///     "abc",
    ///     "report.pdf",
    ///     vec![Message::user("Hi"), Message::assistant("Hello")],
    /// );
    /// assert_eq!(session.to_text(), "USER: Hi\n\nASSISTANT: Hello");
    /// ```
    pub fn to_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.to_string().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// JSON export of the message list, pretty-printed
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.messages)
    }

    /// Markdown export with one `###` section per message
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::storage::{ChatSession, Message};
    ///
    /// let session = ChatSession::new(
    ///     "abc",
    ///     "report.pdf",
    ///     vec![Message::user("Hi"), Message::assistant("Hello")],
    /// );
    /// assert_eq!(
    ///     session.to_markdown(),
    ///     "### You\n\nHi\n\n### AI Assistant\n\nHello"
    /// );
    /// ```
    pub fn to_markdown(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "You",
                    Role::Assistant => "AI Assistant",
                };
                format!("### {}\n\n{}", speaker, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
