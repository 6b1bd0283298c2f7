//! Line-oriented front end over a [`SyncController`].
//!
//! Items are shown and addressed 1-based, like the numbered form fields in
//! the browser client; the controller itself works with 0-based indices.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use todo_core::types::{item_completed, item_text, ListMap, TodoList};

use crate::controller::SyncController;

pub const HELP: &str = "\
Commands:
  lists                 show all lists
  select <id>           make a list active
  show                  show the active list
  add                   append an empty todo
  edit <n> <text>       change the text of todo n (saved after a short pause)
  toggle <n>            flip todo n between done and not done
  delete <n>            remove todo n
  error                 show the current error, if any
  dismiss               clear the current error
  reload                save pending edits and fetch every list again
  help                  this text
  quit                  save pending edits and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lists,
    Select(String),
    Show,
    Add,
    Edit(usize, String),
    Toggle(usize),
    Delete(usize),
    Error,
    Dismiss,
    Reload,
    Help,
    Quit,
}

/// 1-based item number from the user to a 0-based index.
fn parse_index(raw: Option<&str>) -> Result<usize, String> {
    let raw = raw.ok_or("missing todo number")?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("not a todo number: {}", raw)),
    }
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match word {
        "lists" | "ls" => Command::Lists,
        "select" | "use" => Command::Select(args.next().ok_or("missing list id")?.to_string()),
        "show" => Command::Show,
        "add" => Command::Add,
        "edit" => {
            let (raw, text) = match rest.split_once(char::is_whitespace) {
                Some((raw, text)) => (raw, text.trim_start()),
                None => (rest, ""),
            };
            let raw = (!raw.is_empty()).then_some(raw);
            Command::Edit(parse_index(raw)?, text.to_string())
        }
        "toggle" | "done" => Command::Toggle(parse_index(args.next())?),
        "delete" | "rm" => Command::Delete(parse_index(args.next())?),
        "error" => Command::Error,
        "dismiss" => Command::Dismiss,
        "reload" => Command::Reload,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command: {} (try help)", other)),
    };
    Ok(Some(command))
}

pub fn render_lists(lists: &ListMap, active: Option<&str>) -> String {
    if lists.is_empty() {
        return "No lists loaded.".to_string();
    }
    lists
        .values()
        .map(|list| {
            let marker = if active == Some(list.id.as_str()) { '>' } else { ' ' };
            let done = if list.is_completed() { " ✓" } else { "" };
            format!("{} {}  {}{}", marker, list.id, list.title, done)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_list(list: &TodoList) -> String {
    let mut out = list.title.clone();
    if list.todos.is_empty() {
        out.push_str("\n  (no todos)");
    }
    for (i, todo) in list.todos.iter().enumerate() {
        let check = if item_completed(todo) { 'x' } else { ' ' };
        out.push_str(&format!("\n  {}. [{}] {}", i + 1, check, item_text(todo)));
    }
    out
}

pub const NOT_LOADED: &str = "Lists are not loaded yet; try reload.";

/// Commands that read or change items need loaded lists.
fn needs_lists(command: &Command) -> bool {
    matches!(
        command,
        Command::Show | Command::Add | Command::Edit(..) | Command::Toggle(_) | Command::Delete(_)
    )
}

/// Run one command. Returns the text to print and whether to stop.
pub async fn execute(ctl: &SyncController, command: Command) -> (String, bool) {
    if needs_lists(&command) && !ctl.is_ready() {
        return (NOT_LOADED.to_string(), false);
    }
    let show_active = |ctl: &SyncController| match ctl.active_list() {
        Some(list) => render_list(&list),
        None => "No list selected.".to_string(),
    };

    match command {
        Command::Lists => (
            render_lists(&ctl.lists(), ctl.active_list_id().as_deref()),
            false,
        ),
        Command::Select(id) => {
            ctl.select(&id);
            (show_active(ctl), false)
        }
        Command::Show => (show_active(ctl), false),
        Command::Add => {
            ctl.add_item().await;
            (show_active(ctl), false)
        }
        Command::Edit(index, text) => {
            if ctl.edit_text(index, text) {
                (String::new(), false)
            } else {
                (format!("No todo {} in the active list.", index + 1), false)
            }
        }
        Command::Toggle(index) => {
            ctl.toggle_completed(index).await;
            (show_active(ctl), false)
        }
        Command::Delete(index) => {
            ctl.delete_item(index).await;
            (show_active(ctl), false)
        }
        Command::Error => (
            ctl.error().unwrap_or_else(|| "No error.".to_string()),
            false,
        ),
        Command::Dismiss => {
            ctl.dismiss_error();
            (String::new(), false)
        }
        Command::Reload => {
            ctl.reload().await;
            (
                render_lists(&ctl.lists(), ctl.active_list_id().as_deref()),
                false,
            )
        }
        Command::Help => (HELP.to_string(), false),
        Command::Quit => (String::new(), true),
    }
}

/// Read commands until `quit` or end of input, then flush pending edits.
pub async fn run<R, W>(ctl: &SyncController, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut shown_error = None;

    if ctl.is_ready() {
        let text = render_lists(&ctl.lists(), ctl.active_list_id().as_deref());
        output.write_all(format!("{}\n", text).as_bytes()).await?;
    }

    while let Some(line) = lines.next_line().await? {
        let text = match parse_command(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => {
                let (text, quit) = execute(ctl, command).await;
                if quit {
                    break;
                }
                text
            }
            Err(message) => message,
        };
        if !text.is_empty() {
            output.write_all(format!("{}\n", text).as_bytes()).await?;
        }

        // The banner shows each new error once; it stays current until dismissed.
        let error = ctl.error();
        if error.is_some() && error != shown_error {
            if let Some(message) = &error {
                output.write_all(format!("! {}\n", message).as_bytes()).await?;
            }
        }
        shown_error = error;
        output.flush().await?;
    }

    ctl.flush_pending().await;
    if let Some(message) = ctl.error() {
        if Some(&message) != shown_error.as_ref() {
            output.write_all(format!("! {}\n", message).as_bytes()).await?;
        }
    }
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpTodoApi;
    use crate::controller::SyncOptions;
    use std::sync::Arc;
    use todo_backend::server::spawn_server;
    use todo_backend::state::AppState;
    use todo_core::store::memory::MemoryStore;
    use todo_core::store::ListStorage;
    use todo_core::types::TodoItem;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  "), Ok(None));
        assert_eq!(parse_command("lists"), Ok(Some(Command::Lists)));
        assert_eq!(
            parse_command("select 0000000002"),
            Ok(Some(Command::Select("0000000002".to_string())))
        );
        assert_eq!(
            parse_command("edit 2 buy  oat milk"),
            Ok(Some(Command::Edit(1, "buy  oat milk".to_string())))
        );
        assert_eq!(parse_command("edit 1"), Ok(Some(Command::Edit(0, String::new()))));
        assert_eq!(parse_command("toggle 3"), Ok(Some(Command::Toggle(2))));
        assert_eq!(parse_command("rm 1"), Ok(Some(Command::Delete(0))));
        assert_eq!(parse_command("reload"), Ok(Some(Command::Reload)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("toggle").is_err());
        assert!(parse_command("toggle 0").is_err());
        assert!(parse_command("delete x").is_err());
        assert!(parse_command("edit").is_err());
        assert!(parse_command("select").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_render_lists_marks_active_and_completed() {
        let mut done = TodoList::new("L1", "Groceries");
        done.todos.push(TodoItem::new("milk", true).to_value());
        let open = TodoList::new("L2", "Chores");
        let lists: ListMap = [(done.id.clone(), done), (open.id.clone(), open)].into();

        assert_eq!(
            render_lists(&lists, Some("L2")),
            "  L1  Groceries ✓\n> L2  Chores"
        );
        assert_eq!(render_lists(&ListMap::new(), None), "No lists loaded.");
    }

    #[test]
    fn test_render_list() {
        let mut list = TodoList::new("L1", "Groceries");
        assert_eq!(render_list(&list), "Groceries\n  (no todos)");

        list.todos.push(TodoItem::new("milk", true).to_value());
        list.todos.push(TodoItem::new("eggs", false).to_value());
        list.todos.push(serde_json::json!("loose"));
        assert_eq!(
            render_list(&list),
            "Groceries\n  1. [x] milk\n  2. [ ] eggs\n  3. [ ] "
        );
    }

    #[tokio::test]
    async fn test_session_against_server() {
        let storage = Arc::new(MemoryStore::with_default_lists());
        let port = spawn_server(AppState::new(storage.clone(), 0, "127.0.0.1"))
            .await
            .unwrap();
        let api = Arc::new(HttpTodoApi::new(&format!("http://127.0.0.1:{}", port)).unwrap());
        let ctl = SyncController::new(api, SyncOptions::default());
        ctl.load().await;

        let script = "select 0000000001\nadd\nedit 1 buy milk\ntoggle 1\nadd\nedit 2 eggs\ndelete 9\nquit\n";
        let mut output = Vec::new();
        run(&ctl, script.as_bytes(), &mut output).await.unwrap();

        let stored = storage.get("0000000001").unwrap().list;
        assert_eq!(
            stored.todos,
            vec![
                serde_json::json!({ "text": "buy milk", "completed": true }),
                serde_json::json!({ "text": "eggs", "completed": false })
            ]
        );

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("First List"));
        assert!(output.contains("! Error 404: Todo or todo list not found"));
    }

    #[tokio::test]
    async fn test_item_commands_wait_for_reload() {
        let storage = Arc::new(MemoryStore::with_default_lists());
        let port = spawn_server(AppState::new(storage.clone(), 0, "127.0.0.1"))
            .await
            .unwrap();
        let api = Arc::new(HttpTodoApi::new(&format!("http://127.0.0.1:{}", port)).unwrap());
        // Never loaded, as after a failed startup fetch.
        let ctl = SyncController::new(api, SyncOptions::default());

        let script = "select 0000000001\nadd\nshow\nreload\nadd\nquit\n";
        let mut output = Vec::new();
        run(&ctl, script.as_bytes(), &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches(NOT_LOADED).count(), 2, "{}", output);
        assert!(output.contains("> 0000000001  First List"), "{}", output);
        assert_eq!(storage.get("0000000001").unwrap().list.todos.len(), 1);
    }
}
