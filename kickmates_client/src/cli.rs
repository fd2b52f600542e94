use crate::api::ApiClient;
use crate::comments::{CommentScope, CommentThread};
use crate::config::KickmatesConfig;
use crate::conversations::ConversationList;
use crate::messages::{DateGroup, MessageLog};
use crate::models::{CommentNode, RegisterInput, Vote};
use crate::session::{Session, SessionStore};
use crate::threading::CommentSort;
use crate::utils::parse_timestamp;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};

#[derive(Parser)]
#[command(author, version, about = "KickMates command-line client")]
pub struct Args {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in and remember the session
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and log in
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List upcoming events
    Events,
    Join { event_id: i64 },
    Leave { event_id: i64 },
    Bookmark {
        event_id: i64,
        #[arg(long)]
        remove: bool,
    },
    /// Show an event's comment thread
    Comments {
        event_id: i64,
        #[arg(long, default_value = "newest")]
        sort: CommentSort,
    },
    /// Show a discussion and its comment thread
    Discussion {
        discussion_id: i64,
        #[arg(long, default_value = "newest")]
        sort: CommentSort,
    },
    /// Comment on an event
    Comment {
        event_id: i64,
        text: String,
        #[arg(long)]
        reply_to: Option<i64>,
    },
    /// Vote on an event comment; repeating the same vote clears it
    Vote {
        event_id: i64,
        comment_id: i64,
        direction: Vote,
    },
    Conversations,
    /// Show a conversation grouped by day
    Messages { conversation_id: i64 },
    Send {
        conversation_id: i64,
        text: String,
        #[arg(long)]
        reply_to: Option<i64>,
    },
    Notifications,
    /// Mark a notification as read
    Read { notification_id: i64 },
}

pub fn run(args: Args, config: KickmatesConfig) -> Result<()> {
    let session = Session::load(SessionStore::new(&config.paths.session_file))
        .context("failed to load saved session")?;
    let client = ApiClient::from_config(&config, session.clone())?;

    match args.command {
        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let user = client.login(&email, &password)?;
            println!("Logged in as {}", user.username);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let user = client.register(&RegisterInput {
                username,
                email,
                password,
            })?;
            println!("Welcome, {}", user.username);
        }
        Command::Logout => {
            session.logout()?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = client.profile()?;
            println!("{} (#{})", user.username, user.id);
            if let Some(email) = user.email {
                println!("  {email}");
            }
        }
        Command::Events => {
            for event in client.list_events()? {
                let mut flags = Vec::new();
                if event.is_joined {
                    flags.push("joined");
                }
                if event.is_bookmarked {
                    flags.push("saved");
                }
                if event.is_full() {
                    flags.push("full");
                }
                println!(
                    "#{:<5} {} [{}] {} @ {} ({}/{}) {}",
                    event.id,
                    event.title,
                    event.sport_type,
                    event.start_date,
                    event.location,
                    event.current_players,
                    event.max_players,
                    flags.join(",")
                );
            }
        }
        Command::Join { event_id } => {
            client.join_event(event_id)?;
            println!("Joined event {event_id}");
        }
        Command::Leave { event_id } => {
            client.leave_event(event_id)?;
            println!("Left event {event_id}");
        }
        Command::Bookmark { event_id, remove } => {
            if remove {
                client.unbookmark_event(event_id)?;
                println!("Removed bookmark for event {event_id}");
            } else {
                client.bookmark_event(event_id)?;
                println!("Bookmarked event {event_id}");
            }
        }
        Command::Comments { event_id, sort } => {
            let event = client.get_event(event_id)?;
            println!("{}", event.title);
            show_thread(&client, CommentScope::Event(event_id), sort)?;
        }
        Command::Discussion {
            discussion_id,
            sort,
        } => {
            let discussion = client.get_discussion(discussion_id)?;
            println!("{}", discussion.title);
            if let Some(description) = &discussion.description {
                println!("{description}");
            }
            show_thread(&client, CommentScope::Discussion(discussion_id), sort)?;
        }
        Command::Comment {
            event_id,
            text,
            reply_to,
        } => {
            let mut thread = CommentThread::new(CommentScope::Event(event_id));
            client.load_comments(&mut thread)?;
            let comment = client.post_comment(&mut thread, &text, reply_to)?;
            println!("Posted comment #{}", comment.id);
        }
        Command::Vote {
            event_id,
            comment_id,
            direction,
        } => {
            let mut thread = CommentThread::new(CommentScope::Event(event_id));
            client.load_comments(&mut thread)?;
            let update = client.vote_comment(&mut thread, comment_id, direction)?;
            println!(
                "#{comment_id}: +{} / -{}{}",
                update.thumbs_up,
                update.thumbs_down,
                update
                    .user_vote
                    .map(|v| format!(" (you voted {})", v.as_str()))
                    .unwrap_or_default()
            );
        }
        Command::Conversations => {
            let list = ConversationList::new(client.list_conversations()?);
            for conversation in list.conversations() {
                let preview = conversation
                    .last_message
                    .as_ref()
                    .map(|m| m.content.as_str())
                    .unwrap_or("");
                let unread = match conversation.unread_count {
                    0 => String::new(),
                    n => format!(" ({n} unread)"),
                };
                println!(
                    "#{:<5} {}{}: {}",
                    conversation.id, conversation.other_username, unread, preview
                );
            }
            println!("{} unread in total", list.total_unread());
        }
        Command::Messages { conversation_id } => {
            let log = MessageLog::with_messages(conversation_id, client.list_messages(conversation_id)?);
            print_groups(&log.date_groups());
        }
        Command::Send {
            conversation_id,
            text,
            reply_to,
        } => {
            let mut log = MessageLog::with_messages(conversation_id, client.list_messages(conversation_id)?);
            let mut inbox = ConversationList::new(client.list_conversations()?);
            let message = client.send_and_update_inbox(&mut log, &mut inbox, &text, reply_to)?;
            println!("Sent message #{}", message.id);
            if let Some(conversation) = inbox.get(conversation_id) {
                println!("Conversation with {} is now at the top of your inbox", conversation.other_username);
            }
        }
        Command::Notifications => {
            for notification in client.list_notifications()? {
                let marker = if notification.is_read { " " } else { "*" };
                println!(
                    "{marker} #{:<5} [{}] {}",
                    notification.id, notification.kind, notification.content
                );
            }
        }
        Command::Read { notification_id } => {
            client.mark_notification_read(notification_id)?;
        }
    }
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn show_thread(client: &ApiClient, scope: CommentScope, sort: CommentSort) -> Result<()> {
    let mut thread = CommentThread::new(scope);
    thread.set_sort(sort);
    client.load_comments(&mut thread)?;
    if thread.is_empty() {
        println!("  no comments yet");
    }
    for line in render_tree(thread.tree()) {
        println!("{line}");
    }
    Ok(())
}

/// One line per comment, indented two spaces per reply level.
pub fn render_tree(tree: &[CommentNode]) -> Vec<String> {
    let mut lines = Vec::new();
    render_nodes(tree, 1, &mut lines);
    lines
}

fn render_nodes(nodes: &[CommentNode], depth: usize, lines: &mut Vec<String>) {
    for node in nodes {
        let comment = &node.comment;
        lines.push(format!(
            "{}#{} {}: {} [+{} -{}]",
            "  ".repeat(depth),
            comment.id,
            comment.username,
            comment.content,
            comment.thumbs_up,
            comment.thumbs_down
        ));
        render_nodes(&node.replies, depth + 1, lines);
    }
}

fn print_groups(groups: &[DateGroup]) {
    let today = Utc::now().date_naive();
    for group in groups {
        println!("-- {} --", group.label(today));
        for message in &group.messages {
            let time = parse_timestamp(&message.created_at)
                .map(|ts| ts.format("%H:%M").to_string())
                .unwrap_or_default();
            let sender = message.sender_name.as_deref().unwrap_or("?");
            if let Some(quoted) = &message.reply_to_content {
                println!("    > {quoted}");
            }
            if message.deleted() {
                println!("  {time} {sender}: (deleted)");
            } else {
                let like = if message.liked() { " ♥" } else { "" };
                println!("  {time} {sender}: {}{like}", message.content);
            }
        }
    }
}
