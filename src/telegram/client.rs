use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use circlecast_core::config::{BotConfig, BotToken};
use circlecast_core::{ChatId, Error, MessageId, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::types::{
    ApiResponse, File, GetFile, GetUpdates, ReplyParameters, SendMessage, Update, User,
};
use super::{Messenger, NoteUpload};

/// Connection timeout for Bot API requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time on top of the long-poll duration before the HTTP call gives up
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Strip the URL from transport errors: it contains the bot token.
fn http_err(e: reqwest::Error) -> Error {
    Error::Http(e.without_url().to_string())
}

/// Bot API client over `reqwest`.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: BotToken,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &BotConfig, token: BotToken) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            request_timeout: config.request_timeout(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token.expose(), method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token.expose(), file_path)
    }

    async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await.map_err(http_err)?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
            Error::api(method, format!("HTTP {status}: unreadable response: {e}"))
        })?;
        envelope.into_result(method)
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_err)?;
        Self::decode(method, response).await
    }

    /// Identity of the bot; doubles as a token check at startup.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({}), self.request_timeout)
            .await
    }

    /// Long-poll for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, poll: Duration) -> Result<Vec<Update>> {
        let params = GetUpdates {
            offset,
            timeout: poll.as_secs(),
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &params, poll.saturating_add(POLL_SLACK))
            .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", &GetFile { file_id }, self.request_timeout)
            .await
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<()> {
        let params = SendMessage {
            chat_id: chat,
            text,
            reply_parameters: reply_to.map(ReplyParameters::to),
        };
        let _: serde_json::Value = self
            .call("sendMessage", &params, self.request_timeout)
            .await?;
        Ok(())
    }

    /// Stream the file behind `file_id` into `dest`, truncating it first.
    pub async fn download(&self, file_id: &str, dest: &Path) -> Result<u64> {
        let file = self.get_file(file_id).await?;
        let file_path = file.file_path.ok_or_else(|| {
            Error::api("getFile", "file has no download path (too big?)")
        })?;

        let mut response = self
            .client
            .get(self.file_url(&file_path))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(http_err)?;

        if !response.status().is_success() {
            return Err(Error::api(
                "download",
                format!("HTTP {} for {}", response.status(), file_path),
            ));
        }

        let mut out = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(http_err)? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        tracing::debug!("downloaded {} bytes to {:?}", written, dest);
        Ok(written)
    }

    pub async fn upload_video_note(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        note: NoteUpload<'_>,
    ) -> Result<()> {
        let bytes = tokio::fs::read(note.path).await?;
        let part = Part::bytes(bytes)
            .file_name("note.mp4")
            .mime_str("video/mp4")
            .map_err(http_err)?;

        let mut form = Form::new()
            .text("chat_id", chat.to_string())
            .text("length", note.length.to_string())
            .text("duration", note.duration_secs.to_string())
            .part("video_note", part);

        if let Some(message_id) = reply_to {
            let reply = serde_json::to_string(&ReplyParameters::to(message_id))
                .map_err(|e| Error::Internal(format!("encode reply_parameters: {e}")))?;
            form = form.text("reply_parameters", reply);
        }

        let response = self
            .client
            .post(self.method_url("sendVideoNote"))
            .multipart(form)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(http_err)?;

        let _: serde_json::Value = Self::decode("sendVideoNote", response).await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64> {
        self.download(file_id, dest).await
    }

    async fn send_text(&self, chat: ChatId, reply_to: Option<MessageId>, text: &str) -> Result<()> {
        self.send_message(chat, reply_to, text).await
    }

    async fn send_video_note(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        note: NoteUpload<'_>,
    ) -> Result<()> {
        self.upload_video_note(chat, reply_to, note).await
    }
}
