use clap::Subcommand;

use corral_core::ports::Mailbox;
use corral_core::{Message, Result};

use super::Context;

#[derive(Subcommand)]
pub enum MailAction {
    /// Deliver a message to a worker's inbox
    Send {
        sender: String,
        recipient: String,
        /// Free-form message type
        #[arg(long, default_value = "note")]
        kind: String,
        /// JSON payload
        #[arg(long, default_value = "null")]
        payload: String,
    },
    /// List a worker's inbox
    Inbox { worker_id: String },
    /// Move a message from inbox to archive
    Archive {
        worker_id: String,
        message_id: String,
    },
}

pub async fn run(ctx: &Context, action: MailAction) -> Result<()> {
    match action {
        MailAction::Send {
            sender,
            recipient,
            kind,
            payload,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let message = Message::new(sender, &recipient, kind, payload);
            ctx.mailbox.send(&message).await?;
            println!("sent {} to {}", message.id, recipient);
            Ok(())
        }
        MailAction::Inbox { worker_id } => {
            let messages = ctx.mailbox.receive(&worker_id).await?;
            if messages.is_empty() {
                println!("inbox for '{worker_id}' is empty");
                return Ok(());
            }
            for message in messages {
                println!(
                    "{}  {}  from {}  [{}]",
                    message.id,
                    message.created_at.to_rfc3339(),
                    message.sender,
                    message.kind
                );
            }
            Ok(())
        }
        MailAction::Archive {
            worker_id,
            message_id,
        } => {
            ctx.mailbox.archive(&worker_id, &message_id).await?;
            println!("archived {message_id}");
            Ok(())
        }
    }
}
