// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mail commands.

use crate::context::Context;
use clap::Subcommand;
use gt_core::clock::Clock;
use gt_core::message::{MailPriority, MailType, MessageId};
use gt_mail::router::SendOptions;
use gt_mail::store::MailboxStore;

#[derive(Subcommand)]
pub enum MailCommand {
    /// Send a message to an address, channel, or @-group
    Send {
        to: String,
        subject: String,
        /// Body text; `-` reads stdin
        #[arg(default_value = "")]
        body: String,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<MailPriority>,
        #[arg(long)]
        thread: Option<String>,
        /// Send as a task rather than a notification
        #[arg(long)]
        task: bool,
    },
    /// List a mailbox, newest first
    List {
        mailbox: String,
        #[arg(long)]
        unread: bool,
        #[arg(long)]
        json: bool,
    },
    /// Read one message (marks it read)
    Read { mailbox: String, id: String },
    /// Peek at a message: lowers the unread count without flipping the
    /// read bit
    Peek { mailbox: String, id: String },
}

fn parse_priority(s: &str) -> Result<MailPriority, String> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Ok(MailPriority::Low),
        "normal" => Ok(MailPriority::Normal),
        "high" => Ok(MailPriority::High),
        "urgent" => Ok(MailPriority::Urgent),
        other => Err(format!("unknown priority {other:?}")),
    }
}

pub async fn run(ctx: &Context, command: MailCommand) -> anyhow::Result<()> {
    match command {
        MailCommand::Send {
            to,
            subject,
            body,
            priority,
            thread,
            task,
        } => {
            let body = if body == "-" {
                let mut buf = String::new();
                use std::io::Read;
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                body
            };
            let router = ctx.router()?;
            let mut opts = SendOptions::at(ctx.clock.rfc3339());
            if let Some(priority) = priority {
                opts.priority = priority;
            }
            if task {
                opts.mail_type = MailType::Task;
            }
            opts.thread_id = thread;
            let outcome = router
                .send(&ctx.sender(), &to, &subject, &body, opts)
                .await?;
            for mailbox in &outcome.delivered {
                println!("delivered to {mailbox}");
            }
            if outcome.delivered.is_empty() {
                println!("no recipients (self-mail is dropped)");
            }
            Ok(())
        }
        MailCommand::List {
            mailbox,
            unread,
            json,
        } => {
            let messages = if unread {
                ctx.store.list_unread(&mailbox).await?
            } else {
                ctx.store.list(&mailbox).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                for m in messages {
                    let flag = if m.read { " " } else { "*" };
                    let wisp = if m.wisp { "~" } else { " " };
                    println!("{flag}{wisp} {}  {}  {}  {}", m.id, m.timestamp, m.from, m.subject);
                }
            }
            Ok(())
        }
        MailCommand::Read { mailbox, id } => {
            let id = MessageId::new(id);
            let message = ctx.store.get(&mailbox, &id).await?;
            ctx.store.mark_read(&mailbox, &id).await?;
            println!("From: {}", message.from);
            println!("Subject: {}", message.subject);
            println!("Date: {}", message.timestamp);
            println!();
            println!("{}", message.body);
            Ok(())
        }
        MailCommand::Peek { mailbox, id } => {
            let id = MessageId::new(id);
            let message = ctx.store.get(&mailbox, &id).await?;
            ctx.store.mark_read_only(&mailbox, &id).await?;
            println!("{}", message.body);
            Ok(())
        }
    }
}
