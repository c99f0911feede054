use anyhow::Result;
use clap::Parser;
use intrachat::config::{ChatConfig, Cli};
use intrachat::memory::InMemoryBackend;
use intrachat::model::Author;
use intrachat::send::Draft;
use intrachat::service::Services;
use intrachat::session::{ChatClient, SessionEvent};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Demo: runs the delivery core against the in-memory backend with one
/// simulated peer posting into the room.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = ChatConfig::load(&cli)?;
    let level = if cfg.logging_enabled {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let me = Author {
        id: cli.user.clone().unwrap_or_else(|| "user_demo".into()),
        display_name: "Demo".into(),
        avatar_url: None,
    };
    let peer = Author {
        id: "user_peer".into(),
        display_name: "Peer".into(),
        avatar_url: None,
    };
    let room = cli.room.clone().unwrap_or_else(|| "global".into());

    let backend = Arc::new(InMemoryBackend::new(me.clone()));
    backend.set_online(&me.id, true);
    backend.set_online(&peer.id, true);
    backend.seed_message(&room, peer.clone(), "welcome to the room");

    let services = Services {
        queries: backend.clone(),
        commands: backend.clone(),
        presence: backend.clone(),
    };
    let client = ChatClient::new(services, cfg);
    let mut events = client.subscribe();
    let session = client.open_room(&room).await;

    {
        let backend = backend.clone();
        let room = room.clone();
        tokio::spawn(async move {
            let mut n = 0u32;
            loop {
                sleep(Duration::from_secs(7)).await;
                n += 1;
                backend.seed_message(&room, peer.clone(), &format!("peer message {}", n));
            }
        });
    }

    session
        .send(&Draft::new(&room, Some("hello from the demo".into()), None))
        .await?;
    info!(room = %room, "session open - press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            ev = events.recv() => match ev {
                Ok(SessionEvent::NewMessages { room_id, count }) => {
                    info!(
                        room = %room_id,
                        count,
                        total = session.message_count(),
                        online = client.presence().total_online(),
                        "new messages"
                    );
                }
                Ok(SessionEvent::Connectivity { online }) => {
                    info!(online, "connectivity changed");
                }
                Err(_) => break,
            },
        }
    }
    session.close();
    Ok(())
}
