//! Message content and invocation types.
//!
//! Agents exchange [`AgentMessage`]s: multi-part content plus a free-form
//! attribute map. The attribute map is where side-channel data such as shared
//! files travels between the caller and agents.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Attribute key holding the files an agent wants to hand over.
pub const FILES_TO_SEND: &str = "files_to_send";

/// Free-form attributes attached to a message or response.
pub type Attributes = Map<String, Value>;

/// A single part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// An image referenced by URL or local path.
    ImageUrl {
        /// Location of the image.
        url: String,
    },
}

/// Ordered, multi-part message content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageContent {
    parts: Vec<ContentPart>,
}

impl MessageContent {
    /// Create empty content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create content holding a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Append an image part.
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.push_image(url);
        self
    }

    /// Append a text part.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.parts.push(ContentPart::Text { text: text.into() });
    }

    /// Append an image part.
    pub fn push_image(&mut self, url: impl Into<String>) {
        self.parts.push(ContentPart::ImageUrl { url: url.into() });
    }

    /// All parts in order.
    pub fn parts(&self) -> &[ContentPart] {
        &self.parts
    }

    /// True if there are no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Text parts joined by newlines. Images are skipped.
    pub fn to_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// A file handed from one party to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFile {
    /// File name as the receiver should see it.
    pub file_name: String,
    /// Where the file can be read from.
    pub url: String,
}

impl SharedFile {
    /// Create a shared file entry.
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

/// Content plus attributes, the unit of exchange between agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message body.
    pub content: MessageContent,

    /// Side-channel attributes (shared files and the like).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl AgentMessage {
    /// Create a message without attributes.
    pub fn new(content: impl Into<MessageContent>) -> Self {
        Self {
            content: content.into(),
            attributes: Attributes::new(),
        }
    }

    /// Replace the attribute map.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set a single attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Attach shared files under [`FILES_TO_SEND`].
    pub fn with_shared_files(self, files: &[SharedFile]) -> Self {
        let files = files
            .iter()
            .map(|f| json!({ "file_name": f.file_name, "url": f.url }))
            .collect();
        self.with_attribute(FILES_TO_SEND, Value::Array(files))
    }

    /// Files listed under [`FILES_TO_SEND`]. Malformed entries are ignored.
    pub fn shared_files(&self) -> Vec<SharedFile> {
        match self.attributes.get(FILES_TO_SEND) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Input for one agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Invocation {
    /// A message from the human caller.
    User {
        /// The message.
        message: AgentMessage,
    },

    /// A message routed by the orchestrator: a request delegated by another
    /// agent, or an orchestrator notice (`sender` is `None`).
    Routed {
        /// Agent that produced the message, if any.
        sender: Option<String>,
        /// The message.
        message: AgentMessage,
    },

    /// The answer of an agent this one delegated to, returning control.
    Returned {
        /// Agent that answered.
        sender: String,
        /// The answer.
        message: AgentMessage,
    },

    /// Resume the tool cycle that ended in a permission request.
    Continue,
}

impl Invocation {
    /// A plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            message: AgentMessage::new(text.into()),
        }
    }

    /// A user message with attributes.
    pub fn user_message(message: AgentMessage) -> Self {
        Self::User { message }
    }

    /// The carried message, if any.
    pub fn message(&self) -> Option<&AgentMessage> {
        match self {
            Self::User { message }
            | Self::Routed { message, .. }
            | Self::Returned { message, .. } => Some(message),
            Self::Continue => None,
        }
    }

    /// Sender of a routed or returned message.
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Routed { sender, .. } => sender.as_deref(),
            Self::Returned { sender, .. } => Some(sender),
            _ => None,
        }
    }

    /// True for [`Invocation::Returned`].
    pub fn is_return(&self) -> bool {
        matches!(self, Self::Returned { .. })
    }

    /// True for [`Invocation::Continue`].
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}
