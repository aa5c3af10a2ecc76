// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL for exploring module graphs.

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use spacey_modules::{
    ModuleEngine, ModuleError, ModuleGraph, ModuleStatus, ModuleStore, Namespace, Value,
};
use std::borrow::Cow;
use std::path::PathBuf;

/// REPL configuration constants
const HISTORY_FILE: &str = ".spacey_link_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Import,
    Require,
    Dynamic,
    Graph,
    Status,
    Reset,
    Config,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        if !input.starts_with('.') {
            return None;
        }

        let parts: Vec<&str> = input[1..].splitn(2, char::is_whitespace).collect();
        let cmd = parts.first()?.to_lowercase();
        let arg = parts.get(1).map(|a| a.trim()).filter(|a| !a.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "import" | "i" => Some((ReplCommand::Import, arg)),
            "require" | "r" => Some((ReplCommand::Require, arg)),
            "dynamic" | "d" => Some((ReplCommand::Dynamic, arg)),
            "graph" | "g" => Some((ReplCommand::Graph, arg)),
            "status" | "s" => Some((ReplCommand::Status, arg)),
            "reset" => Some((ReplCommand::Reset, arg)),
            "config" => Some((ReplCommand::Config, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".import <spec>", "Link and evaluate a module, print its namespace"),
            (".require <spec>", "Load a module the way require() does"),
            (".dynamic <spec>", "Load a module through import()"),
            (".graph <spec>", "Print the dependency graph of a module"),
            (".status", "List known modules and their status"),
            (".reset", "Forget every loaded module"),
            (".config [key]", "Show engine configuration"),
        ]
    }

    fn requires_specifier(self) -> bool {
        matches!(
            self,
            ReplCommand::Import | ReplCommand::Require | ReplCommand::Dynamic | ReplCommand::Graph
        )
    }
}

/// Helper struct for rustyline that provides completion and hints
struct LinkHelper {
    commands: Vec<String>,
    store: ModuleStore,
}

impl LinkHelper {
    fn new(store: ModuleStore) -> Self {
        let commands = ReplCommand::all_commands()
            .iter()
            .filter_map(|(cmd, _)| cmd.split_whitespace().next())
            .map(String::from)
            .collect();

        Self { commands, store }
    }

    fn candidates(&self) -> Vec<String> {
        let mut candidates = self.commands.clone();
        candidates.extend(self.store.ids().into_iter().map(|id| id.to_string()));
        candidates
    }
}

impl Completer for LinkHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Find the start of the current word
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);

        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches: Vec<Pair> = self
            .candidates()
            .into_iter()
            .filter(|c| c.starts_with(word))
            .map(|c| Pair {
                replacement: c[word.len()..].to_string(),
                display: c,
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for LinkHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() || !line.starts_with('.') || line.contains(char::is_whitespace) {
            return None;
        }

        if line.len() < 2 {
            return None;
        }

        self.commands
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for LinkHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if !line.starts_with('.') {
            return Cow::Borrowed(line);
        }

        match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => Cow::Owned(format!("{} {}", cmd.magenta(), rest.green())),
            None => Cow::Owned(line.magenta().to_string()),
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for LinkHelper {}

impl Helper for LinkHelper {}

/// The interactive REPL over a module engine
pub struct Repl {
    engine: ModuleEngine,
    editor: Editor<LinkHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(engine: ModuleEngine) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(LinkHelper::new(engine.store().clone())));

        // Determine history file path
        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spacey")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let _ = editor.load_history(&history_path);

        Ok(Self {
            engine,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "link>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.is_empty() {
                        continue;
                    }

                    match ReplCommand::parse(trimmed) {
                        Some((cmd, arg)) => match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        },
                        // a bare specifier is imported
                        None if !trimmed.starts_with('.') || trimmed.starts_with("./") => {
                            self.import(trimmed)
                        }
                        None => eprintln!(
                            "{}: unknown command '{}'",
                            "Error".red().bold(),
                            trimmed.cyan()
                        ),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "Spacey Module Linker".white().bold(),
            "v".dimmed(),
            spacey_modules::VERSION.bright_yellow()
        );
        println!(
            "  {} {}",
            "base:".dimmed(),
            self.engine.config().base_dir.cyan()
        );
        println!();
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        if cmd.requires_specifier() && arg.is_none() {
            eprintln!(
                "{}: {} {}",
                "Error".red().bold(),
                format!(".{:?}", cmd).to_lowercase().cyan(),
                "requires a module specifier".dimmed()
            );
            return CommandResult::Continue;
        }

        match (cmd, arg) {
            (ReplCommand::Help, _) => self.print_help(),
            (ReplCommand::Exit, _) => return CommandResult::Exit,
            (ReplCommand::Clear, _) => print!("\x1B[2J\x1B[H"),
            (ReplCommand::Version, _) => {
                println!("{}: {}", "spacey-link".bright_cyan().bold(), env!("CARGO_PKG_VERSION").yellow());
                println!("{}: {}", "spacey-modules".dimmed(), spacey_modules::VERSION);
            }
            (ReplCommand::Import, Some(spec)) => self.import(spec),
            (ReplCommand::Require, Some(spec)) => match self.engine.require_legacy(spec, None) {
                Ok(value) => println!("{}", format_value(&value)),
                Err(e) => print_error(&e),
            },
            (ReplCommand::Dynamic, Some(spec)) => {
                let engine = self.engine.clone();
                let result = tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(engine.import_dynamic(spec, None))
                });
                match result {
                    Ok(ns) => println!("{}", format_namespace(&ns)),
                    Err(e) => print_error(&e),
                }
            }
            (ReplCommand::Graph, Some(spec)) => match self.engine.graph(spec) {
                Ok(graph) => print_graph(&graph, &self.engine),
                Err(e) => print_error(&e),
            },
            (ReplCommand::Status, _) => self.print_status(),
            (ReplCommand::Reset, _) => {
                self.engine.reset();
                println!("{}", "Module store cleared".dimmed());
            }
            (ReplCommand::Config, key) => self.print_config(key),
            _ => {}
        }

        CommandResult::Continue
    }

    fn import(&self, spec: &str) {
        match self.engine.resolve_and_evaluate(spec) {
            Ok(ns) => println!("{}", format_namespace(&ns)),
            Err(e) => print_error(&e),
        }
    }

    fn print_status(&self) {
        let store = self.engine.store();
        if store.is_empty() {
            println!("{}", "No modules loaded".dimmed());
            return;
        }

        for id in store.ids() {
            if let Some(record) = store.get(&id) {
                println!(
                    "  {:10} {:7} {}",
                    format_status(record.status()),
                    record.format().to_string().dimmed(),
                    id
                );
            }
        }
    }

    fn print_config(&self, key: Option<&str>) {
        let config = self.engine.config();
        let keys = ["base-dir", "extensions", "index-name", "default-format"];

        match key {
            Some(key) => match config.get(key) {
                Some(value) => println!("{}", value),
                None => eprintln!("{}: unknown key '{}'", "Error".red().bold(), key.cyan()),
            },
            None => {
                for key in keys {
                    println!("  {:16} {}", key.cyan(), config.get(key).unwrap_or_default());
                }
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:18} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
        println!(
            "  {}",
            "Any other input is imported as a module specifier.".dimmed()
        );
        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!("  {:18} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
        println!("  {:18} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:18} {}", "Tab".yellow(), "Complete commands and modules".dimmed());
        println!();
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Format a value for display with syntax coloring
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".blue().dimmed().to_string(),
        Value::Null => "null".blue().to_string(),
        Value::Boolean(b) => b.to_string().yellow().to_string(),
        Value::Number(n) => {
            if n.is_nan() {
                "NaN".yellow().to_string()
            } else if n.is_infinite() {
                if *n > 0.0 {
                    "Infinity".yellow().to_string()
                } else {
                    "-Infinity".yellow().to_string()
                }
            } else {
                n.to_string().yellow().to_string()
            }
        }
        Value::String(s) => format!("'{}'", s).green().to_string(),
        Value::Object(_) => value.to_json().to_string().cyan().to_string(),
        Value::Namespace(ns) => format!("[Module: {}]", ns.id()).magenta().to_string(),
    }
}

/// Format a namespace and every readable export
pub fn format_namespace(ns: &Namespace) -> String {
    let header = format!("[Module: {}]", ns.id()).magenta().bold().to_string();
    let entries = match ns.entries() {
        Ok(entries) => entries,
        Err(e) => return format!("{} {}", header, e.to_string().red()),
    };

    if entries.is_empty() {
        return format!("{} {{}}", header);
    }

    let body: Vec<String> = entries
        .into_iter()
        .map(|(name, value)| match value {
            Ok(value) => format!("  {}: {}", name, format_value(&value)),
            Err(e) if e.is_not_initialized() => {
                format!("  {}: {}", name, "<uninitialized>".dimmed())
            }
            Err(e) => format!("  {}: {}", name, format!("<{}>", e).red()),
        })
        .collect();

    format!("{} {{\n{}\n}}", header, body.join(",\n"))
}

fn format_status(status: ModuleStatus) -> String {
    let label = format!("{:10}", status.to_string());
    match status {
        ModuleStatus::Evaluated => label.green().to_string(),
        ModuleStatus::Errored => label.red().to_string(),
        ModuleStatus::Evaluating | ModuleStatus::Linking => label.yellow().to_string(),
        ModuleStatus::Linked | ModuleStatus::Unlinked => label.dimmed().to_string(),
    }
}

/// Print a graph in evaluation order
pub fn print_graph(graph: &ModuleGraph, engine: &ModuleEngine) {
    for (index, id) in graph.order.iter().enumerate() {
        let format = engine
            .store()
            .get(id)
            .map(|r| r.format().to_string())
            .unwrap_or_default();
        println!("{:>4}. {} {}", index + 1, id.bright_white(), format.dimmed());
        for dep in graph.dependencies(id) {
            let cyclic = graph.back_edges.iter().any(|(from, to)| from == id && to == dep);
            if cyclic {
                println!("        {} {} {}", "->".dimmed(), dep, "(cycle)".yellow());
            } else {
                println!("        {} {}", "->".dimmed(), dep);
            }
        }
    }
}

/// Print a formatted error message
pub fn print_error(error: &ModuleError) {
    let error_str = error.to_string();

    // Split error type from message
    if let Some(colon_pos) = error_str.find(':') {
        let (error_type, message) = error_str.split_at(colon_pos);
        eprintln!("{}{}", error_type.red().bold(), message);
    } else {
        eprintln!("{}", error_str.red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert!(matches!(
            ReplCommand::parse(".help"),
            Some((ReplCommand::Help, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".exit"),
            Some((ReplCommand::Exit, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".import ./main.mjs"),
            Some((ReplCommand::Import, Some("./main.mjs")))
        ));
        assert!(matches!(
            ReplCommand::parse(".graph   "),
            Some((ReplCommand::Graph, None))
        ));
        assert!(ReplCommand::parse("./main.mjs").is_none());
        assert!(ReplCommand::parse("not a command").is_none());
    }

    #[test]
    fn test_format_value() {
        assert!(format_value(&Value::Undefined).contains("undefined"));
        assert!(format_value(&Value::from("x")).contains("'x'"));
        assert!(format_value(&Value::Number(f64::NAN)).contains("NaN"));
    }
}
