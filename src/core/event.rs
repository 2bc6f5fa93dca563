//! Content events and their tab-separated log representation.
//!
//! A [`ContentEvent`] is created by the storage layer at the moment of a
//! mutation and never changes afterwards. Each event renders to exactly one
//! line of an audit log; [`header_line`] names the columns of that line.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::core::AuditError;
use crate::util::clock;

/// Version written in the first column of every log line.
pub const LOG_FORMAT_VERSION: &str = "1";

/// Column order of an audit log line.
pub const LOG_COLUMNS: [&str; 14] = [
    "VERSION",
    "ACCOUNT",
    "STORE_ID",
    "SPACE_ID",
    "CONTENT_ID",
    "CONTENT_MD5",
    "CONTENT_SIZE",
    "CONTENT_MIMETYPE",
    "CONTENT_PROPERTIES",
    "SOURCE_SPACE_ID",
    "SOURCE_CONTENT_ID",
    "TIMESTAMP",
    "ACTION",
    "USERNAME",
];

/// Header line that opens every audit log (without line terminator).
pub fn header_line() -> String {
    LOG_COLUMNS.join("\t")
}

/// Kind of content mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// A new content item was stored.
    CreateContent,
    /// Content bytes or properties of an existing item changed.
    UpdateContent,
    /// A content item was removed.
    DeleteContent,
    /// A content item was copied from another space or id.
    CopyContent,
}

impl Action {
    /// Name used in the `ACTION` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateContent => "CREATE_CONTENT",
            Self::UpdateContent => "UPDATE_CONTENT",
            Self::DeleteContent => "DELETE_CONTENT",
            Self::CopyContent => "COPY_CONTENT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE_CONTENT" => Ok(Self::CreateContent),
            "UPDATE_CONTENT" => Ok(Self::UpdateContent),
            "DELETE_CONTENT" => Ok(Self::DeleteContent),
            "COPY_CONTENT" => Ok(Self::CopyContent),
            other => Err(AuditError::InvalidArgument(format!("unknown action `{other}`"))),
        }
    }
}

/// Immutable record of one mutation to one content item.
///
/// Deserialized events go through the same validation as built ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawContentEvent")]
pub struct ContentEvent {
    account: String,
    store_id: String,
    space_id: String,
    content_id: String,
    content_md5: Option<String>,
    content_size: Option<u64>,
    mime_type: Option<String>,
    properties: BTreeMap<String, String>,
    source_space_id: Option<String>,
    source_content_id: Option<String>,
    timestamp: DateTime<Utc>,
    action: Action,
    username: Option<String>,
}

impl ContentEvent {
    /// Start building an event for `content_id` in `space_id`.
    pub fn builder(
        action: Action,
        space_id: impl Into<String>,
        content_id: impl Into<String>,
    ) -> ContentEventBuilder {
        ContentEventBuilder {
            event: Self {
                account: String::new(),
                store_id: String::new(),
                space_id: space_id.into(),
                content_id: content_id.into(),
                content_md5: None,
                content_size: None,
                mime_type: None,
                properties: BTreeMap::new(),
                source_space_id: None,
                source_content_id: None,
                timestamp: clock::now(),
                action,
                username: None,
            },
        }
    }

    /// Account (tenant) owning the store.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Storage provider the mutation went to.
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Space the mutated item lives in; the audit partition key.
    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    /// Identifier of the mutated item.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Checksum of the content after the mutation.
    pub fn content_md5(&self) -> Option<&str> {
        self.content_md5.as_deref()
    }

    /// Size in bytes of the content after the mutation.
    pub const fn content_size(&self) -> Option<u64> {
        self.content_size
    }

    /// Mime type of the content.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// User-defined content properties.
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Origin space of a copy.
    pub fn source_space_id(&self) -> Option<&str> {
        self.source_space_id.as_deref()
    }

    /// Origin content id of a copy.
    pub fn source_content_id(&self) -> Option<&str> {
        self.source_content_id.as_deref()
    }

    /// When the mutation happened.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// What kind of mutation happened.
    pub const fn action(&self) -> Action {
        self.action
    }

    /// User that performed the mutation.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Render the event as one log line in [`LOG_COLUMNS`] order, without terminator.
    pub fn to_tsv_line(&self) -> String {
        let properties = if self.properties.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&self.properties).unwrap_or_default()
        };
        let size = self.content_size.map(|s| s.to_string()).unwrap_or_default();
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let fields: [&str; 14] = [
            LOG_FORMAT_VERSION,
            &self.account,
            &self.store_id,
            &self.space_id,
            &self.content_id,
            self.content_md5.as_deref().unwrap_or_default(),
            &size,
            self.mime_type.as_deref().unwrap_or_default(),
            &properties,
            self.source_space_id.as_deref().unwrap_or_default(),
            self.source_content_id.as_deref().unwrap_or_default(),
            &timestamp,
            self.action.as_str(),
            self.username.as_deref().unwrap_or_default(),
        ];
        fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join("\t")
    }

    /// Parse a line produced by [`ContentEvent::to_tsv_line`].
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] for a wrong column count, an
    /// unsupported format version or an unparseable field.
    pub fn from_tsv_line(line: &str) -> Result<Self, AuditError> {
        let fields: Vec<String> = line
            .trim_end_matches(['\r', '\n'])
            .split('\t')
            .map(unescape)
            .collect();
        if fields.len() != LOG_COLUMNS.len() {
            return Err(AuditError::InvalidArgument(format!(
                "expected {} columns, found {}",
                LOG_COLUMNS.len(),
                fields.len()
            )));
        }
        if fields[0] != LOG_FORMAT_VERSION {
            return Err(AuditError::InvalidArgument(format!(
                "unsupported log format version `{}`",
                fields[0]
            )));
        }
        let optional = |i: usize| (!fields[i].is_empty()).then(|| fields[i].clone());
        let content_size = match optional(6) {
            Some(s) => Some(s.parse::<u64>().map_err(|e| {
                AuditError::InvalidArgument(format!("bad content size `{s}`: {e}"))
            })?),
            None => None,
        };
        let properties = match optional(8) {
            Some(s) => serde_json::from_str(&s).map_err(|e| {
                AuditError::InvalidArgument(format!("bad content properties: {e}"))
            })?,
            None => BTreeMap::new(),
        };
        let timestamp = DateTime::parse_from_rfc3339(&fields[11])
            .map_err(|e| AuditError::InvalidArgument(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);
        let event = Self {
            account: fields[1].clone(),
            store_id: fields[2].clone(),
            space_id: fields[3].clone(),
            content_id: fields[4].clone(),
            content_md5: optional(5),
            content_size,
            mime_type: optional(7),
            properties,
            source_space_id: optional(9),
            source_content_id: optional(10),
            timestamp,
            action: fields[12].parse()?,
            username: optional(13),
        };
        event.validate()?;
        Ok(event)
    }

    /// Reject events that cannot be attributed to a space or whose space id
    /// cannot be part of a log name.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] when the space id is blank or
    /// contains a path separator or control character.
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.space_id.trim().is_empty() {
            return Err(AuditError::InvalidArgument(format!(
                "content event for `{}` has no space id",
                self.content_id
            )));
        }
        if self
            .space_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(AuditError::InvalidArgument(format!(
                "space id `{}` cannot name an audit log",
                self.space_id.escape_debug()
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawContentEvent {
    account: String,
    store_id: String,
    space_id: String,
    content_id: String,
    content_md5: Option<String>,
    content_size: Option<u64>,
    mime_type: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    source_space_id: Option<String>,
    source_content_id: Option<String>,
    timestamp: DateTime<Utc>,
    action: Action,
    username: Option<String>,
}

impl TryFrom<RawContentEvent> for ContentEvent {
    type Error = AuditError;

    fn try_from(raw: RawContentEvent) -> Result<Self, Self::Error> {
        let event = Self {
            account: raw.account,
            store_id: raw.store_id,
            space_id: raw.space_id,
            content_id: raw.content_id,
            content_md5: raw.content_md5,
            content_size: raw.content_size,
            mime_type: raw.mime_type,
            properties: raw.properties,
            source_space_id: raw.source_space_id,
            source_content_id: raw.source_content_id,
            timestamp: raw.timestamp,
            action: raw.action,
            username: raw.username,
        };
        event.validate()?;
        Ok(event)
    }
}

/// Builder for [`ContentEvent`]; the only way to set optional metadata.
#[derive(Debug, Clone)]
pub struct ContentEventBuilder {
    event: ContentEvent,
}

impl ContentEventBuilder {
    /// Set the owning account.
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.event.account = account.into();
        self
    }

    /// Set the storage provider id.
    #[must_use]
    pub fn store_id(mut self, store_id: impl Into<String>) -> Self {
        self.event.store_id = store_id.into();
        self
    }

    /// Set the content checksum.
    #[must_use]
    pub fn content_md5(mut self, md5: impl Into<String>) -> Self {
        self.event.content_md5 = Some(md5.into());
        self
    }

    /// Set the content size in bytes.
    #[must_use]
    pub const fn content_size(mut self, size: u64) -> Self {
        self.event.content_size = Some(size);
        self
    }

    /// Set the content mime type.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.event.mime_type = Some(mime_type.into());
        self
    }

    /// Add one content property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.event.properties.insert(key.into(), value.into());
        self
    }

    /// Record the origin of a copy.
    #[must_use]
    pub fn source(mut self, space_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        self.event.source_space_id = Some(space_id.into());
        self.event.source_content_id = Some(content_id.into());
        self
    }

    /// Override the mutation time (defaults to construction time).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Set the acting user.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.event.username = Some(username.into());
        self
    }

    /// Finish the event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidArgument`] when the space id is blank.
    pub fn build(self) -> Result<ContentEvent, AuditError> {
        self.event.validate()?;
        Ok(self.event)
    }
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
