//! Bot API wire types.
//!
//! Only the fields circlecast reads are modelled; serde ignores the rest.

use circlecast_core::{ChatId, MessageId};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every Bot API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the result or turn the envelope into an API error.
    pub fn into_result(self, method: &str) -> circlecast_core::Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(circlecast_core::Error::api(method, "response has no result")),
            (false, _) => {
                let description = self
                    .description
                    .unwrap_or_else(|| "no description".to_string());
                let description = match self.error_code {
                    Some(code) => format!("{code}: {description}"),
                    None => description,
                };
                Err(circlecast_core::Error::api(method, description))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub video: Option<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Chat {
    /// A one-to-one conversation with the bot.
    pub fn private(id: ChatId) -> Self {
        Self {
            id,
            kind: "private".to_string(),
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

/// An uploaded video as announced in a message.
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    /// Duration reported by the sender's client, in seconds.
    pub duration: u32,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_size: Option<u64>,
    /// Relative download path; absent when the file is too big to download.
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyParameters {
    pub message_id: MessageId,
    pub allow_sending_without_reply: bool,
}

impl ReplyParameters {
    pub fn to(message_id: MessageId) -> Self {
        Self {
            message_id,
            allow_sending_without_reply: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetFile<'a> {
    pub file_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: ChatId,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_update() {
        let json = r#"{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "date": 1700000000,
                "chat": {"id": 1001, "type": "private"},
                "from": {"id": 1001, "is_bot": false, "first_name": "Ann"},
                "video": {
                    "file_id": "BAACAgIAAxkBAAI",
                    "file_unique_id": "AgAD",
                    "width": 1920,
                    "height": 1080,
                    "duration": 45,
                    "mime_type": "video/mp4",
                    "file_size": 5242880
                }
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 42);
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, ChatId(1001));
        assert!(message.chat.is_private());
        assert_eq!(message.message_id, MessageId(7));
        let video = message.video.unwrap();
        assert_eq!(video.duration, 45);
        assert_eq!(video.file_size, Some(5242880));
        assert!(message.text.is_none());
    }

    #[test]
    fn update_without_message_parses() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 1, "edited_message": {}}"#).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn error_envelope_becomes_api_error() {
        let resp: ApiResponse<File> = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: wrong file_id"}"#,
        )
        .unwrap();
        let err = resp.into_result("getFile").unwrap_err();
        assert_eq!(
            err.to_string(),
            "API error [getFile]: 400: Bad Request: wrong file_id"
        );
    }

    #[test]
    fn ok_envelope_unwraps() {
        let resp: ApiResponse<bool> = serde_json::from_str(r#"{"ok": true, "result": true}"#).unwrap();
        assert!(resp.into_result("sendMessage").unwrap());
    }

    #[test]
    fn send_message_omits_missing_reply() {
        let body = serde_json::to_value(SendMessage {
            chat_id: ChatId(5),
            text: "hi",
            reply_parameters: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"chat_id": 5, "text": "hi"}));
    }

    #[test]
    fn reply_parameters_serialize() {
        let body = serde_json::to_value(ReplyParameters::to(MessageId(9))).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"message_id": 9, "allow_sending_without_reply": true})
        );
    }
}
