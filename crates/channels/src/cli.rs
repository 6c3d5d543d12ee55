//! CLI channel: interactive terminal chat with the bot.
//!
//! Reads lines from stdin. `/file <path>` sends a local file as media;
//! anything else is sent as text. File replies are written to the output
//! directory and announced on stdout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tightfit_core::artifact::guess_mime_type;
use tightfit_core::channel::{Channel, ChannelId, ChannelMessage, MediaAttachment, OutboundMessage};
use tightfit_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const CLI_CHAT_ID: &str = "cli_session";
const CLI_SENDER_ID: &str = "local_user";

/// One parsed line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliInput {
    Empty,
    Exit,
    Text(String),
    File(PathBuf),
}

impl CliInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            return Self::Exit;
        }
        if let Some(path) = line.strip_prefix("/file ") {
            let path = path.trim().trim_matches('"');
            if !path.is_empty() {
                return Self::File(PathBuf::from(path));
            }
        }
        Self::Text(line.to_string())
    }
}

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
    output_dir: PathBuf,
}

impl CliChannel {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            output_dir: output_dir.into(),
        }
    }

    /// Build the message for one line, reading the file for `/file`.
    pub async fn message_for(
        channel_id: &ChannelId,
        input: CliInput,
    ) -> Option<Result<ChannelMessage, String>> {
        let base = |content: String| {
            let mut msg = ChannelMessage::text(channel_id.clone(), CLI_SENDER_ID, content);
            msg.sender_name = Some("User".into());
            msg.chat_id = CLI_CHAT_ID.into();
            msg
        };

        match input {
            CliInput::Empty | CliInput::Exit => None,
            CliInput::Text(text) => Some(Ok(base(text))),
            CliInput::File(path) => Some(read_media(&path).await.map(|media| base(String::new()).with_media(media))),
        }
    }

    /// Where a file reply would be written.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reply.bin".to_string());
        self.output_dir.join(name)
    }
}

async fn read_media(path: &Path) -> Result<MediaAttachment, String> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    let mime_type = filename
        .as_deref()
        .and_then(guess_mime_type)
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok(MediaAttachment {
        mime_type,
        filename,
        data,
    })
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let input = CliInput::parse(&line);
                        if input == CliInput::Exit {
                            break;
                        }
                        let msg = match Self::message_for(&channel_id, input).await {
                            None => continue,
                            Some(Ok(msg)) => msg,
                            Some(Err(reason)) => {
                                eprintln!("{reason}");
                                continue;
                            }
                        };
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        message: &OutboundMessage,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        match message {
            OutboundMessage::Text(text) => println!("{text}"),
            OutboundMessage::Media { artifact, caption } => {
                let path = self.output_path(artifact.suggested_filename());
                tokio::fs::create_dir_all(&self.output_dir)
                    .await
                    .map_err(|e| delivery_failed(&e))?;
                tokio::fs::write(&path, artifact.bytes())
                    .await
                    .map_err(|e| delivery_failed(&e))?;
                if let Some(caption) = caption {
                    println!("{caption}");
                }
                println!(
                    "  saved {} ({} bytes, {})",
                    path.display(),
                    artifact.size_bytes(),
                    artifact.mime_type()
                );
            }
        }
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}

fn delivery_failed(e: &std::io::Error) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: "cli".into(),
        reason: e.to_string(),
    }
}
