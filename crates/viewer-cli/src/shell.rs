//! Interactive shell. Search text, filters and browse cursor are kept per
//! collection in a [`SessionState`], so switching collections and coming
//! back restores what was entered.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use viewer_core::browse::{MAX_BROWSE_LIMIT, MAX_BROWSE_OFFSET, execute_browse};
use viewer_core::inspect::{find_collection, inspect};
use viewer_core::query::{MAX_QUERY_RESULTS, execute_query};
use viewer_core::session::{CollectionState, SessionState};
use viewer_core::store::VectorStore;

use crate::render;

const HELP: &str = "\
Commands:
  list                 list collections and their contents
  use <collection>     select the collection the commands below act on
  show                 print the selected collection's inputs
  query <text>         run a similarity search
  n <1-50>             number of results
  distances on|off     include distances and distance stats
  where [json]         metadata filter, e.g. {\"category\": \"science\"}; empty clears
  where-doc [json]     document filter, e.g. {\"$contains\": \"word\"}; empty clears
  browse               show a page of items
  limit <1-100>        items per page
  offset <n>           first item of the page
  next                 advance to the next page and show it
  help                 this text
  quit                 leave the shell";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    List,
    Use(String),
    Show,
    Query(String),
    NResults(usize),
    Distances(bool),
    Where(String),
    WhereDocument(String),
    Browse,
    Limit(usize),
    Offset(usize),
    Next,
    Help,
    Quit,
}

fn parse_number(arg: &str, min: usize, max: usize) -> Result<usize, String> {
    let value: usize = arg
        .parse()
        .map_err(|_| format!("expected a number, got '{arg}'"))?;
    if !(min..=max).contains(&value) {
        return Err(format!("expected a number between {min} and {max}, got {value}"));
    }
    Ok(value)
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let require = |what: &str| {
        if arg.is_empty() {
            Err(format!("{word} needs {what}"))
        } else {
            Ok(arg.to_string())
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => Ok(ShellCommand::List),
        "use" => require("a collection name").map(ShellCommand::Use),
        "show" => Ok(ShellCommand::Show),
        "query" | "q" => require("search text").map(ShellCommand::Query),
        "n" => parse_number(&require("a count")?, 1, MAX_QUERY_RESULTS).map(ShellCommand::NResults),
        "distances" => match arg {
            "on" | "true" => Ok(ShellCommand::Distances(true)),
            "off" | "false" => Ok(ShellCommand::Distances(false)),
            other => Err(format!("distances expects on or off, got '{other}'")),
        },
        "where" => Ok(ShellCommand::Where(arg.to_string())),
        "where-doc" => Ok(ShellCommand::WhereDocument(arg.to_string())),
        "browse" => Ok(ShellCommand::Browse),
        "limit" => parse_number(&require("a count")?, 1, MAX_BROWSE_LIMIT).map(ShellCommand::Limit),
        "offset" => parse_number(&require("a position")?, 0, MAX_BROWSE_OFFSET).map(ShellCommand::Offset),
        "next" => Ok(ShellCommand::Next),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        other => Err(format!("unknown command '{other}', try help")),
    }
}

fn describe(name: &str, state: &CollectionState) -> String {
    let or_none = |s: &str| if s.is_empty() { "(none)".to_string() } else { s.to_string() };
    format!(
        "collection: {name}\nquery: {}\nn: {}\ndistances: {}\nwhere: {}\nwhere-doc: {}\nlimit: {}\noffset: {}",
        or_none(&state.query.text),
        state.query.n_results,
        if state.query.include_distances { "on" } else { "off" },
        or_none(&state.query.where_filter),
        or_none(&state.query.where_document),
        state.browse.limit,
        state.browse.offset,
    )
}

/// Applies one command and returns what to print. Failures are turned
/// into text here so a bad command never ends the session.
pub async fn execute<S: VectorStore>(
    store: &S,
    session: &mut SessionState,
    command: ShellCommand,
) -> String {
    if let ShellCommand::List = command {
        return match inspect(store).await {
            Ok(listing) => render::render_listing(&listing),
            Err(e) => format!("error: {e}"),
        };
    }
    if let ShellCommand::Help = command {
        return HELP.to_string();
    }
    if let ShellCommand::Use(name) = command {
        return match find_collection(store, &name).await {
            Ok(collection) => {
                session.select(&collection.name);
                format!("using {}", collection.name)
            }
            Err(e) => format!("error: {e}"),
        };
    }

    let Some((name, state)) = session.current_state() else {
        return "error: no collection selected, run `use <collection>` first".to_string();
    };
    let name = name.to_string();
    let advance = matches!(command, ShellCommand::Next);

    match command {
        ShellCommand::Show => return describe(&name, state),
        ShellCommand::NResults(n) => state.query.n_results = n,
        ShellCommand::Distances(on) => state.query.include_distances = on,
        ShellCommand::Where(raw) => state.query.where_filter = raw,
        ShellCommand::WhereDocument(raw) => state.query.where_document = raw,
        ShellCommand::Limit(limit) => state.browse.limit = limit,
        ShellCommand::Offset(offset) => state.browse.offset = offset,
        ShellCommand::Query(text) => {
            state.query.text = text;
            let request = state.query.clone();
            return match find_collection(store, &name).await {
                Ok(collection) => match execute_query(store, &collection, &request).await {
                    Ok(report) => render::render_query(&report),
                    Err(e) => render::render_query_error(&e),
                },
                Err(e) => format!("error: {e}"),
            };
        }
        ShellCommand::Browse | ShellCommand::Next => {
            let request = if advance {
                session.next_page(&name)
            } else {
                state.browse
            };
            return match find_collection(store, &name).await {
                Ok(collection) => match execute_browse(store, &collection, &request).await {
                    Ok(outcome) => render::render_browse(&outcome),
                    Err(e) => render::render_browse_error(&e),
                },
                Err(e) => format!("error: {e}"),
            };
        }
        ShellCommand::List | ShellCommand::Help | ShellCommand::Use(_) | ShellCommand::Quit => {}
    }
    "ok".to_string()
}

pub async fn run_shell<S: VectorStore>(store: &S) -> Result<(), ReadlineError> {
    let mut rl = DefaultEditor::new()?;
    let mut session = SessionState::new();
    println!("Type help for commands.");

    loop {
        let prompt = match session.current() {
            Some(name) => format!("chroma:{name}> "),
            None => "chroma> ".to_string(),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                match parse_command(trimmed) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(command) => println!("{}", execute(store, &mut session, command).await),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            // Ctrl-C, just show new prompt
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
