#![allow(clippy::float_cmp)]

use super::*;

use crate::services::test_helpers::MemoryStore;

// =============================================================================
// parse_script
// =============================================================================

#[test]
fn script_skips_blanks_and_comments() {
    let text = r#"
# build a small board
{"type":"add_widget","widget_type":"cpu","rect":{"x":0,"y":0,"w":100,"h":100}}

{"type":"pan_by","dx":10,"dy":0}
{"type":"undo"}
"#;
    let commands = parse_script(text).unwrap();
    assert_eq!(commands.len(), 3);
    assert!(matches!(commands[1], Command::PanBy { .. }));
    assert_eq!(commands[2], Command::Undo);
}

#[test]
fn script_error_names_the_line() {
    let text = "{\"type\":\"undo\"}\n{\"type\":\"fly\"}\n";
    let err = parse_script(text).unwrap_err();
    assert!(matches!(err, CliError::Script { line: 2, .. }));
    assert!(err.to_string().starts_with("script line 2"));
}

// =============================================================================
// ensure_saved / stats
// =============================================================================

#[test]
fn only_failed_status_is_an_error() {
    assert!(ensure_saved(SaveStatus::Idle).is_ok());
    assert!(ensure_saved(SaveStatus::Saved { at_ms: 5 }).is_ok());
    let err = ensure_saved(SaveStatus::Failed { attempts: 4, message: "disk full".into() }).unwrap_err();
    assert_eq!(err.to_string(), "changes not saved after 4 attempts: disk full");
}

#[tokio::test(start_paused = true)]
async fn stats_report_counts_and_status() {
    let store = Arc::new(MemoryStore::default());
    let mut session = Session::open(store, "main", canvas::config::EngineConfig::default()).await.unwrap();
    session.apply(Command::AddNest {
        title: "Sensors".into(),
        rect: canvas::geom::Rect::new(0.0, 0.0, 200.0, 200.0),
        id: Some("n".into()),
    });
    let value = stats(&session);
    assert_eq!(value["profile"], "main");
    assert_eq!(value["nests"], 1);
    assert_eq!(value["total"], 1);
    assert_eq!(value["history"]["len"], 2);
    assert_eq!(value["save_status"]["state"], "pending");
}

#[test]
fn cli_parses_subcommands() {
    let cli = Cli::try_parse_from(["widgetboard", "--profile", "lab", "--profile-dir", "/tmp/p", "replay", "--script", "s.jsonl"]).unwrap();
    assert_eq!(cli.profile, "lab");
    assert_eq!(cli.profile_dir, Some(PathBuf::from("/tmp/p")));
    assert!(matches!(cli.command, CliCommand::Replay { actions: false, .. }));

    let cli = Cli::try_parse_from(["widgetboard", "export"]).unwrap();
    assert!(matches!(cli.command, CliCommand::Export { ref out } if out == Path::new("-")));
}

// =============================================================================
// demo script
// =============================================================================

#[tokio::test(start_paused = true)]
async fn demo_script_replays_and_saves() {
    let commands = parse_script(include_str!("../demos/board.jsonl")).unwrap();
    assert_eq!(commands.len(), 11);

    let store = Arc::new(MemoryStore::default());
    let mut session = Session::open(store.clone(), "demo", canvas::config::EngineConfig::default()).await.unwrap();
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    for command in commands {
        tx.send(command).await.unwrap();
    }
    drop(tx);
    let status = session.run(rx).await;
    assert!(matches!(status, SaveStatus::Saved { .. }));

    let canvas = session.core().canvas();
    let mem = canvas.get(&"mem".into()).unwrap();
    assert_eq!((mem.x, mem.y), (60.0, 60.0));
    let cpu = canvas.get(&"cpu".into()).unwrap();
    assert!(!cpu.rect().intersects(&mem.rect()));
    assert_eq!(canvas.nested.len(), 1);
    assert!(store.get("demo").is_some());
}
