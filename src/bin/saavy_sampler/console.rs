//! Line commands for the console harness.

use std::path::PathBuf;

use saavy_sampler::{
    bus::ClientCommand,
    ids::Id,
    patch::{KeyRange, PartChannel},
};

pub const HELP: &str = "\
commands:
  on <key> [velocity 0-1] [channel]     start a note (note id = key)
  off <key> [channel]                   release a note
  panic                                 release everything
  status                                engine status
  channel <part> <omni|0-15>            set a part's channel
  range <zone> <start> <end> [fs fe]    set a zone's key range and fades
  save <file> | load <file>             write / read the patch
  json                                  print the patch document
  render <blocks>                       render blocks (without the driver)
  help | quit";

#[derive(Debug, PartialEq)]
pub enum ConsoleAction {
    Send(ClientCommand),
    Save(PathBuf),
    Load(PathBuf),
    Json,
    Render(usize),
    Help,
    Quit,
}

fn arg<T: std::str::FromStr>(words: &[&str], index: usize, what: &str) -> Result<T, String> {
    let word = words
        .get(index)
        .ok_or_else(|| format!("missing {what}"))?;
    word.parse().map_err(|_| format!("bad {what}: {word}"))
}

fn optional<T: std::str::FromStr>(
    words: &[&str],
    index: usize,
    what: &str,
    default: T,
) -> Result<T, String> {
    if words.len() > index {
        arg(words, index, what)
    } else {
        Ok(default)
    }
}

/// Parse one input line. Empty lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleAction>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some(&verb) = words.first() else {
        return Ok(None);
    };

    let action = match verb {
        "on" => {
            let key: i32 = arg(&words, 1, "key")?;
            ConsoleAction::Send(ClientCommand::NoteOn {
                channel: optional(&words, 3, "channel", 0)?,
                key,
                note_id: key,
                velocity: optional(&words, 2, "velocity", 1.0)?,
                detune: 0.0,
            })
        }
        "off" => ConsoleAction::Send(ClientCommand::NoteOff {
            channel: optional(&words, 2, "channel", 0)?,
            key: arg(&words, 1, "key")?,
            note_id: -1,
        }),
        "panic" => ConsoleAction::Send(ClientCommand::AllNotesOff),
        "status" => ConsoleAction::Send(ClientCommand::RequestStatus),
        "channel" => {
            let part = arg(&words, 1, "part")?;
            let channel = match words.get(2) {
                Some(&"omni") => PartChannel::Omni,
                _ => PartChannel::Channel(arg(&words, 2, "channel")?),
            };
            ConsoleAction::Send(ClientCommand::SetPartChannel { part, channel })
        }
        "range" => {
            let zone = Id::from_raw(arg(&words, 1, "zone id")?);
            let range = KeyRange::new(arg(&words, 2, "start")?, arg(&words, 3, "end")?)
                .with_fades(
                    optional(&words, 4, "fade start", 0)?,
                    optional(&words, 5, "fade end", 0)?,
                )
                .map_err(|e| e.to_string())?;
            ConsoleAction::Send(ClientCommand::SetKeyRange { zone, range })
        }
        "save" => ConsoleAction::Save(arg::<String>(&words, 1, "file")?.into()),
        "load" => ConsoleAction::Load(arg::<String>(&words, 1, "file")?.into()),
        "json" => ConsoleAction::Json,
        "render" => ConsoleAction::Render(optional(&words, 1, "block count", 1)?),
        "help" | "?" => ConsoleAction::Help,
        "quit" | "exit" => ConsoleAction::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(action))
}
