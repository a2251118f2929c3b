use crate::session::actions::Action;
use crate::session::events::Event;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  play <id>        fetch a song by id and play it
  json <record>    play a raw catalog record
  jump <n>         play queue entry n
  favplay <n>      replay favorite line n
  p | pause        pause        resume       resume
  t | toggle       pause or resume
  n | next         next song    b | prev     previous song / restart
  seek <secs>      absolute seek      +N / -N    relative seek
  line <n>         seek to lyric line n
  shuffle          toggle shuffle     repeat     cycle repeat mode
  lang <code>      translate into <code>      tr    toggle translations
  word <w>         look up a word     save <w>   save or unsave a word
  like             like the current song
  fav              save the active lyric line
  queue | lyrics | status
  q | quit";

/// Read commands from stdin, one per line, until EOF or the session stops
/// listening.
pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    let _ = tx.send(Event::Input(Action::Quit)).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!("reading stdin: {e}");
                    break;
                }
            };
            match parse_command(&line) {
                Ok(Some(action)) => {
                    if tx.send(Event::Input(action)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(msg) => println!("{msg}"),
            }
        }
    });
}

/// Map one command line to an action. Blank lines and `help` produce no
/// action; malformed commands produce a message for the user.
pub fn parse_command(line: &str) -> Result<Option<Action>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    let action = match cmd.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Action::Quit,
        "h" | "help" | "?" => {
            println!("{HELP}");
            return Ok(None);
        }

        "play" => Action::PlayId(required(arg, "play <id>")?.to_string()),
        "json" => {
            let record = serde_json::from_str(required(arg, "json <record>")?)
                .map_err(|e| format!("invalid record: {e}"))?;
            Action::PlayRecord(record)
        }
        "jump" => Action::PlayIndex(ordinal(arg, "jump <n>")?),
        "favplay" => Action::PlayFavorite(ordinal(arg, "favplay <n>")?),

        "p" | "pause" => Action::Pause,
        "resume" => Action::Resume,
        "t" | "toggle" => Action::TogglePause,
        "n" | "next" => Action::Next,
        "b" | "prev" | "previous" => Action::Previous,
        "seek" => Action::Seek(seconds(arg)?),
        "line" => Action::SeekToLine(ordinal(arg, "line <n>")?),
        "shuffle" => Action::ToggleShuffle,
        "repeat" => Action::ToggleRepeat,

        "lang" => Action::SetTargetLanguage(required(arg, "lang <code>")?.to_string()),
        "tr" => Action::ToggleTranslation,
        "word" => Action::LookupWord(required(arg, "word <w>")?.to_string()),
        "save" => Action::SaveWord(required(arg, "save <w>")?.to_string()),

        "like" => Action::ToggleLike,
        "fav" => Action::FavoriteActiveLine,

        "queue" => Action::ShowQueue,
        "lyrics" => Action::ShowLyrics,
        "status" => Action::ShowStatus,

        _ if cmd.starts_with(['+', '-']) && arg.is_empty() => {
            let delta: f64 = cmd
                .parse()
                .map_err(|_| format!("not a number of seconds: {cmd}"))?;
            Action::SeekRelative(delta)
        }
        _ => return Err(format!("unknown command: {cmd} (try `help`)")),
    };
    Ok(Some(action))
}

fn required<'a>(arg: &'a str, usage: &str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(arg)
    }
}

/// 1-based position typed by the user, as a 0-based index.
fn ordinal(arg: &str, usage: &str) -> Result<usize, String> {
    match required(arg, usage)?.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("usage: {usage}")),
    }
}

fn seconds(arg: &str) -> Result<f64, String> {
    required(arg, "seek <secs>")?
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite())
        .ok_or_else(|| format!("not a number of seconds: {arg}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Action {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_transport_commands() {
        assert!(matches!(parse("p"), Action::Pause));
        assert!(matches!(parse("  NEXT "), Action::Next));
        assert!(matches!(parse("b"), Action::Previous));
        assert!(matches!(parse("seek 42.5"), Action::Seek(s) if s == 42.5));
        assert!(matches!(parse("+10"), Action::SeekRelative(d) if d == 10.0));
        assert!(matches!(parse("-5"), Action::SeekRelative(d) if d == -5.0));
        assert!(matches!(parse("line 3"), Action::SeekToLine(2)));
    }

    #[test]
    fn test_arguments_keep_spaces_and_case() {
        assert!(matches!(parse("word Corazón"), Action::LookupWord(w) if w == "Corazón"));
        assert!(matches!(parse("lang hi"), Action::SetTargetLanguage(c) if c == "hi"));
        assert!(matches!(parse("play abc123"), Action::PlayId(id) if id == "abc123"));
        assert!(matches!(parse("jump 1"), Action::PlayIndex(0)));
    }

    #[test]
    fn test_json_record() {
        let action = parse(r#"json {"id": "A", "name": "X"}"#);
        match action {
            Action::PlayRecord(v) => assert_eq!(v["id"], "A"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_command("json {oops").is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_command("").unwrap().is_none());
        assert!(parse_command("seek").is_err());
        assert!(parse_command("seek soon").is_err());
        assert!(parse_command("line 0").is_err());
        assert!(parse_command("dance").is_err());
    }
}
