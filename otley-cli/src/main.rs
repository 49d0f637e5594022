use std::path::PathBuf;

use anyhow::Result;
use otley::btree::BTree;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

fn get_history_file() -> Option<PathBuf> {
    dirs::preference_dir()
        .and_then(|mut base| {
            base.push("otley");
            // Not create_dir_all(): don't create preference dirs that don't exist.
            if std::fs::metadata(&base).is_err() {
                std::fs::create_dir(&base).ok()?;
            }
            Some(base)
        })
        .map(|mut base| {
            base.push("history.txt");
            base
        })
}

/// The interactive shell's single-slot "current index" state.
struct Shell {
    tree: Option<BTree>,
}

impl Shell {
    fn new() -> Self {
        Self { tree: None }
    }

    fn close_current(&mut self) {
        if let Some(mut tree) = self.tree.take() {
            tree.close();
        }
    }

    fn create(&mut self, rl: &mut DefaultEditor) {
        let path = match rl.readline("path: ") {
            Ok(line) => PathBuf::from(line.trim().to_string()),
            Err(_) => return,
        };
        if path.exists() {
            let answer = match rl.readline("file exists, overwrite? (y/yes to proceed): ") {
                Ok(line) => line,
                Err(_) => return,
            };
            let answer = answer.trim().to_ascii_lowercase();
            if answer != "y" && answer != "yes" {
                println!("aborted.");
                return;
            }
        }
        match BTree::create(&path) {
            Ok(tree) => {
                self.close_current();
                tracing::info!(path = %path.display(), "created index");
                self.tree = Some(tree);
                println!("created {}.", path.display());
            }
            Err(e) => println!("create failed: {e}"),
        }
    }

    fn open(&mut self, rl: &mut DefaultEditor) {
        let path = match rl.readline("path: ") {
            Ok(line) => PathBuf::from(line.trim().to_string()),
            Err(_) => return,
        };
        match BTree::open(&path) {
            Ok(tree) => {
                self.close_current();
                tracing::info!(path = %path.display(), "opened index");
                self.tree = Some(tree);
                println!("opened {}.", path.display());
            }
            Err(e) => println!("open failed: {e}"),
        }
    }

    fn insert(&mut self, rl: &mut DefaultEditor) {
        let Some(tree) = self.tree.as_mut() else {
            println!("no index open.");
            return;
        };
        let key = match rl.readline("key: ") {
            Ok(line) => line,
            Err(_) => return,
        };
        let value = match rl.readline("value: ") {
            Ok(line) => line,
            Err(_) => return,
        };
        let (key, value) = match (key.trim().parse::<u64>(), value.trim().parse::<u64>()) {
            (Ok(k), Ok(v)) => (k, v),
            _ => {
                println!("Invalid input.");
                return;
            }
        };
        match tree.insert(key, value) {
            Ok(true) => println!("inserted."),
            Ok(false) => println!("key already present."),
            Err(e) => println!("insert failed: {e}"),
        }
    }

    fn search(&mut self, rl: &mut DefaultEditor) {
        let Some(tree) = self.tree.as_mut() else {
            println!("no index open.");
            return;
        };
        let key = match rl.readline("key: ") {
            Ok(line) => line,
            Err(_) => return,
        };
        let key = match key.trim().parse::<u64>() {
            Ok(k) => k,
            Err(_) => {
                println!("Invalid input.");
                return;
            }
        };
        match tree.search(key) {
            Ok(Some(value)) => println!("{key} {value}"),
            Ok(None) => println!("Key not found."),
            Err(e) => println!("search failed: {e}"),
        }
    }

    /// Dispatch one command word. Returns `true` if the shell should exit.
    fn dispatch(&mut self, command: &str, rl: &mut DefaultEditor) -> bool {
        match command {
            "create" => self.create(rl),
            "open" => self.open(rl),
            "insert" => self.insert(rl),
            "search" => self.search(rl),
            "load" | "print" | "extract" => println!("not implemented yet."),
            "quit" => {
                self.close_current();
                return true;
            }
            other => println!("unknown command: {other}"),
        }
        false
    }
}

fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily(".", "otley.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt().with_writer(non_blocking).init();

    let mut rl = DefaultEditor::new()?;
    let history_file = get_history_file();
    if let Some(path) = &history_file {
        if let Err(e) = rl.load_history(path) {
            tracing::warn!(error = %e, "could not load history file");
        }
    }

    println!("otley: terminate with ctrl-c or ctrl-d");
    let mut shell = Shell::new();
    loop {
        match rl.readline("otley> ") {
            Ok(line) => {
                let command = line.trim();
                if command.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(command);
                tracing::info!(command, "dispatching command");
                if shell.dispatch(command, &mut rl) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("terminating...");
                shell.close_current();
                break;
            }
            Err(err) => {
                println!("error: {err:?}");
                break;
            }
        }
    }

    if let Some(path) = &history_file {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!(error = %e, "could not save history file");
        }
    }
    Ok(())
}
