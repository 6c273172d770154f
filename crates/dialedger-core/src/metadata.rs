//! Typed views over the per-type entry metadata payload.
//!
//! The store keeps metadata as the caller's raw JSON. These types are for
//! consumers that want named fields; every field defaults when absent, so
//! decoding never fails on a partially filled form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, entry::EntryType};

/// One variant per [`EntryType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EntryMetadata {
  Note(NoteMetadata),
  Meeting(MeetingMetadata),
  Conversation(ConversationMetadata),
  Email(EmailMetadata),
  File(FileMetadata),
  ActionItems(ActionItemsMetadata),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteMetadata {
  pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingMetadata {
  pub location:  String,
  pub attendees: String,
  pub duration:  String,
  pub notes:     String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationMetadata {
  pub participants: String,
  pub location:     String,
  pub summary:      String,
}

/// Address fields are free text as typed by the user (comma separated).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailMetadata {
  pub from:        String,
  pub to:          String,
  pub cc:          String,
  pub bcc:         String,
  pub subject:     String,
  pub body:        String,
  /// Names of attachments mentioned in the mail, comma separated.
  pub attachments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileMetadata {
  pub file_name:   String,
  pub file_type:   String,
  pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItemsMetadata {
  pub description: String,
  pub items:       Vec<ActionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItem {
  pub text:      String,
  pub completed: bool,
}

impl ActionItemsMetadata {
  /// `(completed, total)`.
  pub fn progress(&self) -> (usize, usize) {
    let done = self.items.iter().filter(|i| i.completed).count();
    (done, self.items.len())
  }
}

impl EntryMetadata {
  pub fn entry_type(&self) -> EntryType {
    match self {
      Self::Note(_) => EntryType::Note,
      Self::Meeting(_) => EntryType::Meeting,
      Self::Conversation(_) => EntryType::Conversation,
      Self::Email(_) => EntryType::Email,
      Self::File(_) => EntryType::File,
      Self::ActionItems(_) => EntryType::ActionItems,
    }
  }

  /// Decode a stored payload as the variant for `entry_type`.
  pub fn from_parts(entry_type: EntryType, data: Value) -> Result<Self> {
    Ok(match entry_type {
      EntryType::Note => Self::Note(serde_json::from_value(data)?),
      EntryType::Meeting => Self::Meeting(serde_json::from_value(data)?),
      EntryType::Conversation => {
        Self::Conversation(serde_json::from_value(data)?)
      }
      EntryType::Email => Self::Email(serde_json::from_value(data)?),
      EntryType::File => Self::File(serde_json::from_value(data)?),
      EntryType::ActionItems => {
        Self::ActionItems(serde_json::from_value(data)?)
      }
    })
  }

  /// The payload alone, without the variant tag. This is what gets stored in
  /// an entry's `metadata`.
  pub fn to_json(&self) -> Result<Value> {
    Ok(match self {
      Self::Note(m) => serde_json::to_value(m)?,
      Self::Meeting(m) => serde_json::to_value(m)?,
      Self::Conversation(m) => serde_json::to_value(m)?,
      Self::Email(m) => serde_json::to_value(m)?,
      Self::File(m) => serde_json::to_value(m)?,
      Self::ActionItems(m) => serde_json::to_value(m)?,
    })
  }

  /// A one-line title derived from the payload, used when an entry is created
  /// without an explicit title.
  pub fn headline(&self) -> String {
    match self {
      Self::Note(m) => {
        let text = m.content.trim();
        let mut head: String = text.chars().take(50).collect();
        if text.chars().count() > 50 {
          head.push_str("...");
        }
        head
      }
      Self::Meeting(m) if m.location.trim().is_empty() => "Meeting".into(),
      Self::Meeting(m) => format!("Meeting at {}", m.location.trim()),
      Self::Conversation(m) => {
        format!("Conversation with {}", m.participants.trim())
      }
      Self::Email(m) => m.subject.trim().to_owned(),
      Self::File(m) => m.file_name.trim().to_owned(),
      Self::ActionItems(m) => m.description.trim().to_owned(),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn email_payload_keeps_field_names() {
    let meta = EntryMetadata::Email(EmailMetadata {
      subject: "hi".into(),
      body: "there".into(),
      ..Default::default()
    });
    let v = meta.to_json().unwrap();
    assert_eq!(v["subject"], "hi");
    assert_eq!(v["body"], "there");
  }

  #[test]
  fn file_metadata_uses_camel_case_keys() {
    let v = json!({ "fileName": "scan.pdf", "fileType": "pdf" });
    let m = EntryMetadata::from_parts(EntryType::File, v).unwrap();
    let EntryMetadata::File(f) = &m else { panic!("expected file") };
    assert_eq!(f.file_name, "scan.pdf");
    assert_eq!(f.description, "");
    assert_eq!(m.to_json().unwrap()["fileName"], "scan.pdf");
  }

  #[test]
  fn action_item_progress() {
    let v = json!({
      "description": "Follow-ups",
      "items": [
        { "text": "call bank", "completed": true },
        { "text": "file claim" }
      ]
    });
    let EntryMetadata::ActionItems(m) =
      EntryMetadata::from_parts(EntryType::ActionItems, v).unwrap()
    else {
      panic!("expected action items");
    };
    assert_eq!(m.progress(), (1, 2));
  }

  #[test]
  fn headlines() {
    let long = "x".repeat(60);
    let note = EntryMetadata::Note(NoteMetadata { content: long });
    assert_eq!(note.headline(), format!("{}...", "x".repeat(50)));

    let meeting = EntryMetadata::Meeting(MeetingMetadata {
      location: "Cafe".into(),
      ..Default::default()
    });
    assert_eq!(meeting.headline(), "Meeting at Cafe");
    assert_eq!(
      EntryMetadata::Meeting(MeetingMetadata::default()).headline(),
      "Meeting"
    );
  }

  #[test]
  fn wrong_shape_is_serialization_error() {
    let err = EntryMetadata::from_parts(EntryType::Note, json!([1, 2]))
      .unwrap_err();
    assert!(matches!(err, crate::Error::Serialization(_)));
  }
}
