//! TCP line server.
//!
//! Each connection gets its own session task: a short login dialogue, then a
//! command loop. Output flows through the player's [`Outbox`] into a writer
//! task, so narration from the heartbeat and other players interleaves with
//! command replies without the session having to poll.

use std::net::SocketAddr;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use mud_shared::{Archetype, LINE_ENDING, WELCOME_BANNER};

use super::Outbox;
use crate::commands::{handle_command, CommandFlow};
use crate::entities::{Player, PlayerId};
use crate::persistence::PersistenceHandle;
use crate::tasks;
use crate::world::{info_lines, SharedWorld};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 16;

/// Game server
pub struct Server {
    listener: TcpListener,
    world: SharedWorld,
    /// Persistence handle (optional - server works without it)
    persistence: Option<PersistenceHandle>,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(
        addr: &str,
        world: SharedWorld,
        persistence: Option<PersistenceHandle>,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener, world, persistence })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections forever
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Connection from {}", addr);
                    let world = self.world.clone();
                    let persistence = self.persistence.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, world, persistence).await;
                        info!("Connection from {} closed", addr);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Drain an outbox channel onto the socket
async fn write_lines(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        let framed = format!("{}{}", line, LINE_ENDING);
        if writer.write_all(framed.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Names are 2-16 ASCII letters, stored capitalised
fn normalize_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() < MIN_NAME_LEN
        || raw.len() > MAX_NAME_LEN
        || !raw.chars().all(|c| c.is_ascii_alphabetic())
    {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    let mut chars = lower.chars();
    chars
        .next()
        .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    world: SharedWorld,
    persistence: Option<PersistenceHandle>,
) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_lines(write_half, rx));
    let mut lines = BufReader::new(read_half).lines();
    let outbox = Outbox::new(tx);

    outbox.send(WELCOME_BANNER.to_string());
    if let Some(id) = login(&mut lines, &outbox, &world, persistence.as_ref()).await {
        drop(outbox);
        play(&mut lines, id, &world).await;

        if let Some(player) = tasks::release_player(&world, id).await {
            if let Some(persistence) = &persistence {
                if let Err(e) = persistence.save_player_now(player.snapshot()).await {
                    error!("Failed to save {} on disconnect: {}", player.name, e);
                } else {
                    info!("Saved {} on disconnect", player.name);
                }
            }
        }
    } else {
        info!("{} left during login", addr);
        drop(outbox);
    }

    if let Err(e) = writer.await {
        warn!("Writer task for {} failed: {}", addr, e);
    }
}

async fn next_line(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            warn!("Read error: {}", e);
            None
        }
    }
}

/// Name prompt, then resume a save or create a new character.
/// `None` if the client went away.
async fn login(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    outbox: &Outbox,
    world: &SharedWorld,
    persistence: Option<&PersistenceHandle>,
) -> Option<PlayerId> {
    loop {
        let raw = next_line(lines).await?;
        let Some(name) = normalize_name(&raw) else {
            outbox.send(format!(
                "Names are {}-{} letters. By what name are you known?",
                MIN_NAME_LEN, MAX_NAME_LEN
            ));
            continue;
        };
        if world.lock().await.is_online(&name) {
            outbox.send(format!("{} is already in the world. Choose another name.", name));
            continue;
        }

        let saved = match persistence {
            Some(p) => p.load_player(&name).await,
            None => None,
        };
        let archetype = match &saved {
            Some(_) => None,
            None => Some(choose_archetype(lines, outbox, &name).await?),
        };

        let mut guard = world.lock().await;
        // The name may have been claimed while we were waiting on input
        if guard.is_online(&name) {
            outbox.send(format!("{} is already in the world. Choose another name.", name));
            continue;
        }
        let id = guard.allocate_player_id();
        let mut player = match (saved, archetype) {
            (Some(snapshot), _) => {
                outbox.send(format!("Welcome back, {}.", name));
                Player::from_snapshot(id, snapshot)
            }
            (None, Some(archetype)) => {
                let room = guard.config.default_room.clone();
                let player = Player::create(id, name.clone(), archetype, room, guard.dice());
                outbox.send(format!("{} the {} enters the world.", name, archetype.name()));
                player
            }
            (None, None) => continue,
        };
        player.outbox = outbox.clone();
        let out = guard.add_player(player);
        guard.deliver(&out);
        return Some(id);
    }
}

async fn choose_archetype(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    outbox: &Outbox,
    name: &str,
) -> Option<Archetype> {
    let names: Vec<&str> = Archetype::ALL.iter().map(|a| a.name()).collect();
    outbox.send(format!("Welcome, {}. Choose your path: {}", name, names.join(", ")));
    loop {
        let raw = next_line(lines).await?;
        match Archetype::from_name(&raw) {
            Some(archetype) => return Some(archetype),
            None => outbox.send(format!("Choose one of: {}", names.join(", "))),
        }
    }
}

/// The command loop for a logged-in player
async fn play(lines: &mut Lines<BufReader<OwnedReadHalf>>, id: PlayerId, world: &SharedWorld) {
    while let Some(line) = next_line(lines).await {
        if handle_command(world, id, &line).await == CommandFlow::Quit {
            world
                .lock()
                .await
                .deliver(&info_lines(id, vec!["Farewell.".to_string()]));
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::sync::Mutex;

    use super::*;
    use crate::world::testing::test_world;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  ada "), Some("Ada".to_string()));
        assert_eq!(normalize_name("MORGANA"), Some("Morgana".to_string()));
        assert_eq!(normalize_name("a"), None);
        assert_eq!(normalize_name("ada1"), None);
        assert_eq!(normalize_name("abcdefghijklmnopq"), None);
    }

    async fn read_until(reader: &mut Lines<BufReader<OwnedReadHalf>>, needle: &str) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            let line = tokio::time::timeout(Duration::from_secs(5), reader.next_line())
                .await
                .expect("timed out")
                .unwrap()
                .expect("connection closed");
            let done = line.contains(needle);
            seen.push(line);
            if done {
                return seen;
            }
        }
    }

    #[tokio::test]
    async fn test_login_play_and_quit() {
        let world: SharedWorld = Arc::new(Mutex::new(test_world()));
        let server = Server::bind("127.0.0.1:0", world.clone(), None).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half).lines();

        read_until(&mut reader, "By what name").await;
        write_half.write_all(b"x\r\n").await.unwrap();
        read_until(&mut reader, "letters").await;
        write_half.write_all(b"ada\r\n").await.unwrap();
        read_until(&mut reader, "Choose your path").await;
        write_half.write_all(b"war\r\n").await.unwrap();
        let seen = read_until(&mut reader, "Exits:").await;
        assert!(seen.iter().any(|l| l == "Ada the Warrior enters the world."));
        assert!(world.lock().await.is_online("Ada"));

        write_half.write_all(b"quit\r\n").await.unwrap();
        read_until(&mut reader, "Farewell.").await;
        assert!(reader.next_line().await.unwrap().is_none());
        assert!(!world.lock().await.is_online("Ada"));
    }
}
