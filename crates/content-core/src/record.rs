use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::ContentCodec;
use crate::editor::EditorSurface;
use crate::types::ContentDocument;

/// The dashboard screens that edit rich content. All of them store their
/// body in the same block format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    News,
    Report,
    Calendar,
    Community,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::News,
        RecordKind::Report,
        RecordKind::Calendar,
        RecordKind::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::News => "news",
            RecordKind::Report => "report",
            RecordKind::Calendar => "calendar",
            RecordKind::Community => "community",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::News => "news article",
            RecordKind::Report => "investor report",
            RecordKind::Calendar => "calendar event",
            RecordKind::Community => "community post",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| {
                format!("unknown record kind {s:?} (expected news, report, calendar or community)")
            })
    }
}

/// Request body for creating or updating a record. Screen-specific fields
/// (dates, tickers, ...) travel in `fields` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    pub content: ContentDocument,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentRecord {
    /// Builds the submission from the editor's current HTML in one step.
    pub fn from_editor<E>(
        title: impl Into<String>,
        fields: Map<String, Value>,
        editor: &E,
        codec: &ContentCodec,
    ) -> Self
    where
        E: EditorSurface + ?Sized,
    {
        Self {
            title: title.into(),
            content: codec.decompose(&editor.html()),
            fields,
        }
    }

    /// Loads the stored body into `editor` for editing.
    pub fn open_in<E>(&self, editor: &mut E, codec: &ContentCodec)
    where
        E: EditorSurface + ?Sized,
    {
        editor.set_html(&codec.compose(&self.content));
    }
}
