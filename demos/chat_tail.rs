//! Follow one chat room from the terminal.
//!
//! ```text
//! CHAT_API=https://api.example.com/api/ CHAT_TOKEN=... CHAT_USER=12 \
//!     cargo run --example chat_tail -- 5 42
//! ```
//!
//! Arguments are the pharmacy id and the room id. Lines typed on stdin are
//! sent to the room.

use pharmachat::{ChatSession, ChatSessionOptions, ReconnectPolicy, StaticCredentials};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pharmachat=info")),
        )
        .init();

    let api_base = std::env::var("CHAT_API")?;
    let token = std::env::var("CHAT_TOKEN")?;
    let user: u64 = std::env::var("CHAT_USER")?.parse()?;

    let mut args = std::env::args().skip(1);
    let pharmacy: u64 = args.next().ok_or("missing pharmacy id")?.parse()?;
    let room: u64 = args.next().ok_or("missing room id")?.parse()?;

    let session = ChatSession::new(
        ChatSessionOptions {
            api_base,
            reconnect: ReconnectPolicy::default_backoff(),
            ..Default::default()
        },
        Arc::new(StaticCredentials::new(token, user)),
    )?;

    if let Err(e) = session.initial_load(&[pharmacy]).await {
        println!("room listing unavailable: {}", e);
    }
    for r in session.rooms().await {
        println!("[{}] {} ({} unread)", r.id, r.title, r.unread_count);
    }

    session.select_room(room).await?;
    let mut shown = 0;
    for message in session.messages(room).await {
        println!("{}: {}", session.sender_name(message.sender).await, message.body);
        shown += 1;
    }

    let mut states = session.watch_socket_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("-- socket {:?}", *states.borrow_and_update());
            }
            line = lines.next_line() => match line? {
                Some(text) => {
                    if let Err(e) = session.send_message(room, &text).await {
                        println!("-- not sent: {}", e);
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                let messages = session.messages(room).await;
                for message in messages.iter().skip(shown) {
                    println!("{}: {}", session.sender_name(message.sender).await, message.body);
                }
                shown = messages.len();
            }
        }
    }

    session.close().await;
    Ok(())
}
