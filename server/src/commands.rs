//! Player command parsing and dispatch.
//!
//! Every input line is split into a verb and its arguments, normalised for
//! aliases, and routed either to a synchronous world operation (run under a
//! single lock) or to the task manager for anything that starts or stops a
//! background task. User-facing failures come back as [`ActionError`] and are
//! shown to the acting player only.

use log::debug;
use tokio::time::Instant;

use crate::entities::PlayerId;
use crate::error::ActionError;
use crate::tasks;
use crate::world::{info_lines, GameWorld, Outbound, SharedWorld};

/// Whether the session should keep reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlow {
    Continue,
    Quit,
}

const HELP: &[&str] = &[
    "Commands:",
    "  look                    describe your surroundings",
    "  north/south/east/west   move (n, s, e, w, u, d also work)",
    "  say <message>           speak to the room",
    "  who                     list adventurers online",
    "  stats                   show your character",
    "  abilities               list abilities and cooldowns",
    "  use <ability> [target]  use an ability",
    "  target <name>           choose a target",
    "  attack <monster>        strike once",
    "  kill [monster]          fight until it falls",
    "  rest                    recover health out of combat",
    "  recall                  return to the Trade District",
    "  get/drop <item>         pick up or drop items",
    "  inventory, gear         show what you carry and wear",
    "  equip <item>, unequip <slot>, examine <item>",
    "  quit                    save and leave",
];

/// Expand direction shorthands
fn direction(word: &str) -> Option<&'static str> {
    Some(match word {
        "n" | "north" => "north",
        "s" | "south" => "south",
        "e" | "east" => "east",
        "w" | "west" => "west",
        "u" | "up" => "up",
        "d" | "down" => "down",
        "ne" | "northeast" => "northeast",
        "nw" | "northwest" => "northwest",
        "se" | "southeast" => "southeast",
        "sw" | "southwest" => "southwest",
        _ => return None,
    })
}

/// Split a line into a lowercase verb and its raw argument text
fn parse(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix('\'') {
        return Some(("say".to_string(), rest.trim()));
    }
    let (verb, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some((verb.to_lowercase(), args.trim()))
}

fn non_empty(args: &str) -> Option<&str> {
    (!args.is_empty()).then_some(args)
}

/// Run a synchronous world operation under one lock and deliver its events
async fn with_world<F>(world: &SharedWorld, op: F) -> Result<(), ActionError>
where
    F: FnOnce(&mut GameWorld, Instant) -> Result<Vec<Outbound>, ActionError>,
{
    let mut guard = world.lock().await;
    let out = op(&mut guard, Instant::now())?;
    guard.deliver(&out);
    Ok(())
}

async fn reply(world: &SharedWorld, id: PlayerId, lines: Vec<String>) {
    world.lock().await.deliver(&info_lines(id, lines));
}

/// Handle one line of player input
pub async fn handle_command(world: &SharedWorld, id: PlayerId, line: &str) -> CommandFlow {
    let Some((verb, args)) = parse(line) else {
        return CommandFlow::Continue;
    };
    debug!("player {} -> {} {}", id, verb, args);

    if verb == "quit" || verb == "exit" {
        return CommandFlow::Quit;
    }

    let result = match (verb.as_str(), direction(&verb)) {
        (_, Some(dir)) => tasks::move_player(world, id, dir).await,
        ("go" | "walk", _) => match direction(&args.to_lowercase()) {
            Some(dir) => tasks::move_player(world, id, dir).await,
            None => Err(ActionError::NoExit),
        },
        ("help" | "?", _) => {
            reply(world, id, HELP.iter().map(|s| s.to_string()).collect()).await;
            Ok(())
        }
        ("look" | "l", _) => with_world(world, |w, _| Ok(info_lines(id, w.describe_room(id)))).await,
        ("say", _) => match non_empty(args) {
            Some(message) => with_world(world, |w, _| w.say(id, message)).await,
            None => {
                reply(world, id, vec!["Say what?".into()]).await;
                Ok(())
            }
        },
        ("who", _) => with_world(world, |w, _| Ok(info_lines(id, w.who_lines()))).await,
        ("stats" | "score" | "st", _) => {
            with_world(world, |w, now| Ok(info_lines(id, w.stats_lines(id, now)?))).await
        }
        ("abilities" | "abil" | "skills", _) => {
            with_world(world, |w, _| Ok(info_lines(id, w.ability_lines(id)?))).await
        }
        ("use" | "cast", _) => cmd_use(world, id, args).await,
        ("target" | "t", _) => match non_empty(args) {
            Some(query) => with_world(world, |w, _| w.set_target(id, query)).await,
            None => Err(ActionError::NoTarget),
        },
        ("attack" | "a", _) => match non_empty(args) {
            Some(query) => cmd_attack(world, id, query).await,
            None => Err(ActionError::NoSuchMonster),
        },
        ("kill" | "k" | "fight", _) => tasks::engage(world, id, non_empty(args)).await,
        ("rest", _) => tasks::start_rest(world, id).await,
        ("recall", _) => tasks::recall(world, id).await,
        ("get" | "take", _) => with_world(world, |w, _| w.pick_up(id, args)).await,
        ("drop", _) => with_world(world, |w, _| w.drop_item(id, args)).await,
        ("inventory" | "inv" | "i", _) => {
            with_world(world, |w, _| Ok(info_lines(id, w.inventory_lines(id)?))).await
        }
        ("equip" | "wear" | "wield", _) => with_world(world, |w, _| w.equip(id, args)).await,
        ("unequip" | "remove", _) => with_world(world, |w, _| w.unequip(id, args)).await,
        ("gear" | "eq", _) => with_world(world, |w, _| Ok(info_lines(id, vec![w.gear_line(id)?]))).await,
        ("examine" | "x", _) => with_world(world, |w, _| Ok(info_lines(id, w.examine(id, args)?))).await,
        _ => {
            reply(world, id, vec!["Unknown command. Type 'help' for a list.".into()]).await;
            Ok(())
        }
    };

    if let Err(e) = result {
        reply(world, id, vec![e.to_string()]).await;
    }
    CommandFlow::Continue
}

/// `use <ability> [target]`. Ability names may span several words, so the
/// longest leading run of words naming an ability wins.
async fn cmd_use(world: &SharedWorld, id: PlayerId, args: &str) -> Result<(), ActionError> {
    let words: Vec<&str> = args.split_whitespace().collect();
    if words.is_empty() {
        return Err(ActionError::UnknownAbility);
    }

    let mut guard = world.lock().await;
    let archetype = guard.player(id).ok_or(ActionError::UnknownPlayer)?.archetype;
    let split = (1..=words.len())
        .rev()
        .find(|&n| guard.catalog.find_ability(archetype, &words[..n].join(" ")).is_some())
        .ok_or(ActionError::UnknownAbility)?;
    let ability = words[..split].join(" ");
    let target = words[split..].join(" ");

    let resolution = guard.use_ability(id, &ability, non_empty(&target), Instant::now())?;
    tasks::settle(&mut guard, resolution).await;
    Ok(())
}

async fn cmd_attack(world: &SharedWorld, id: PlayerId, query: &str) -> Result<(), ActionError> {
    let mut guard = world.lock().await;
    let resolution = guard.player_attack(id, query, Instant::now())?;
    tasks::settle(&mut guard, resolution).await;
    Ok(())
}
