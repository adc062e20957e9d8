//! File-backed per-worker mailboxes.
//!
//! One inbox and one archive directory per worker identity, one file per
//! message named by its id. Delivery and archiving both go through atomic
//! rename, so a message is never observed half-written and consumption
//! attempts are safe to retry. Only the sender touches an inbox (on send)
//! and only the recipient (on archive), so no locking is needed beyond the
//! filesystem's rename guarantee.

use async_trait::async_trait;
use std::fs;
use std::io::Write as IoWrite;
use std::path::PathBuf;

use corral_core::error::{CorralError, Result};
use corral_core::message::Message;
use corral_core::ports::Mailbox;

use crate::paths::CorralPaths;

/// Mailbox storage over the shared data directory.
pub struct FileMailbox {
    paths: CorralPaths,
}

impl FileMailbox {
    pub fn new(paths: CorralPaths) -> Self {
        Self { paths }
    }

    /// Message ids become file names; reject anything that could escape
    /// the mailbox directory.
    fn checked_file_name(id: &str) -> Result<String> {
        let safe = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(CorralError::Internal(format!(
                "invalid message id '{id}'"
            )));
        }
        Ok(format!("{id}.json"))
    }
}

#[async_trait]
impl Mailbox for FileMailbox {
    async fn send(&self, message: &Message) -> Result<()> {
        let file_name = Self::checked_file_name(&message.id)?;
        let inbox = self.paths.inbox_dir(&message.recipient);

        let deliver = || -> Result<()> {
            fs::create_dir_all(&inbox)?;
            let json = serde_json::to_string_pretty(message)?;

            // Write next to the target, then rename into place.
            let tmp_path = inbox.join(format!(".{file_name}.tmp"));
            let mut tmp_file = fs::File::create(&tmp_path)?;
            tmp_file.write_all(json.as_bytes())?;
            tmp_file.sync_all()?;
            drop(tmp_file);

            fs::rename(&tmp_path, inbox.join(&file_name))?;
            Ok(())
        };

        deliver().map_err(|err| CorralError::mailbox(&message.recipient, err.to_string()))?;
        tracing::debug!(
            "delivered message '{}' from '{}' to '{}'",
            message.id,
            message.sender,
            message.recipient
        );
        Ok(())
    }

    async fn receive(&self, recipient: &str) -> Result<Vec<Message>> {
        let inbox = self.paths.inbox_dir(recipient);
        if !inbox.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&inbox)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && !path
                        .file_name()
                        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
            })
            .collect();
        entries.sort();

        let mut messages = Vec::with_capacity(entries.len());
        for path in entries {
            match fs::read_to_string(&path)
                .map_err(CorralError::from)
                .and_then(|content| serde_json::from_str::<Message>(&content).map_err(Into::into))
            {
                Ok(message) => messages.push(message),
                Err(err) => {
                    // One bad file must not hide the rest of the inbox.
                    tracing::warn!(
                        "skipping unreadable message {}: {}",
                        path.display(),
                        err
                    );
                }
            }
        }
        Ok(messages)
    }

    async fn archive(&self, recipient: &str, message_id: &str) -> Result<()> {
        let file_name = Self::checked_file_name(message_id)?;
        let source = self.paths.inbox_dir(recipient).join(&file_name);

        // Already consumed (or never delivered): retrying is a no-op.
        if !source.exists() {
            return Ok(());
        }

        let archive_dir = self.paths.archive_dir(recipient);
        fs::create_dir_all(&archive_dir)?;
        match fs::rename(&source, archive_dir.join(&file_name)) {
            Ok(()) => {
                tracing::debug!("archived message '{}' for '{}'", message_id, recipient);
                Ok(())
            }
            // Lost a race with another consumer; the message is archived
            // either way.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CorralError::mailbox(recipient, e.to_string())),
        }
    }
}
