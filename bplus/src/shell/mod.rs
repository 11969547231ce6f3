//! Interactive command shell over a tree and its record source.
//!
//! Commands are read one per line. The first word is looked up,
//! case-insensitively, in a sorted keyword table; the rest of the line is
//! the command's argument. See [`HELP`] for the full list.

mod render;

use std::io::{self, BufRead, Seek, Write};
use std::time::{Duration, Instant};

use crate::btree::{BPlusTree, BTreeError};
use crate::query::RecordSource;

pub use render::{DisplayOptions, write_list, write_search_path, write_tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Add,
    AutoList,
    AutoTree,
    Check,
    Delete,
    Display,
    Find,
    Get { show_rows: bool },
    Help,
    Hush,
    Id,
    List,
    NoId,
    NoTrace,
    Quit,
    Scan { show_rows: bool },
    Trace,
}

/// Keywords in ascending order, for binary search.
const KEYWORDS: &[(&str, Command)] = &[
    ("add", Command::Add),
    ("autolist", Command::AutoList),
    ("autotree", Command::AutoTree),
    ("bye", Command::Quit),
    ("check", Command::Check),
    ("del", Command::Delete),
    ("display", Command::Display),
    ("find", Command::Find),
    ("get", Command::Get { show_rows: true }),
    ("gettime", Command::Get { show_rows: false }),
    ("help", Command::Help),
    ("hush", Command::Hush),
    ("id", Command::Id),
    ("ins", Command::Add),
    ("list", Command::List),
    ("noid", Command::NoId),
    ("notrc", Command::NoTrace),
    ("quit", Command::Quit),
    ("rem", Command::Delete),
    ("scan", Command::Scan { show_rows: true }),
    ("scantime", Command::Scan { show_rows: false }),
    ("search", Command::Find),
    ("show", Command::Display),
    ("stop", Command::Quit),
    ("trc", Command::Trace),
];

fn lookup(word: &str) -> Option<Command> {
    let word = word.to_ascii_lowercase();
    KEYWORDS
        .binary_search_by(|(keyword, _)| (*keyword).cmp(word.as_str()))
        .ok()
        .map(|i| KEYWORDS[i].1)
}

/// Command summary printed by `help`.
pub const HELP: &str = "\
Available commands:
 help                       : display this
 ins <key>,<val>
  or add <key>,<val>        : insert a (key,val) pair
 rem <key> or del <key>     : remove a key
 get <key>[,<key>]          : retrieve info using the index
                              ranges such as \",key\" or \"key,\" are supported
                              composite keys are supported
 gettime <key>[,<key>]      : retrieve info using the index but only show time taken
 scan <key>[,<key>]         : retrieve info without using the index
                              ranges such as \",key\" or \"key,\" are supported
                              composite keys are supported
                              field position (value@field#) is supported
 scantime <key>[,<key>]     : retrieve info without using the index but only show time taken
 find <key> or search <key> : display search path
 check                      : verify the tree structure
 id                         : display id next to node (default)
 noid                       : suppress id next to node
 show or display            : display the tree
 list                       : list ordered keys
 hush                       : display nothing after change
 autotree                   : show tree after change (default)
 autolist                   : show ordered list after change
 trc                        : display extensive trace
 notrc                      : turn tracing off
 bye, quit or stop          : quit the program
";

/// What to print after a successful change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    Nothing,
    #[default]
    Tree,
    List,
}

/// Shell settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellOptions {
    pub feedback: Feedback,
    pub display: DisplayOptions,
    /// Print `+key,val` / `-key` before each change.
    pub echo: bool,
    /// Print a prompt before reading each command.
    pub prompt: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            feedback: Feedback::default(),
            display: DisplayOptions::default(),
            echo: false,
            prompt: true,
        }
    }
}

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Callback switching verbose tracing on or off.
pub type TraceHook = Box<dyn FnMut(bool)>;

/// A command loop bound to one tree.
pub struct Shell<R, W> {
    tree: BPlusTree,
    source: Option<RecordSource<R>>,
    out: W,
    options: ShellOptions,
    tracing: bool,
    trace_hook: Option<TraceHook>,
}

impl<R: BufRead + Seek, W: Write> Shell<R, W> {
    /// Create a shell. `source` is the record file the tree indexes, if any.
    pub fn new(
        tree: BPlusTree,
        source: Option<RecordSource<R>>,
        out: W,
        options: ShellOptions,
    ) -> Self {
        Self {
            tree,
            source,
            out,
            options,
            tracing: false,
            trace_hook: None,
        }
    }

    /// Install the callback used by `trc` and `notrc`.
    #[must_use]
    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace_hook = Some(hook);
        self
    }

    #[must_use]
    pub const fn tree(&self) -> &BPlusTree {
        &self.tree
    }

    /// Give back the tree and the output.
    pub fn into_parts(self) -> (BPlusTree, W) {
        (self.tree, self.out)
    }

    /// Read and run commands until `bye` or end of input.
    pub fn run(&mut self, input: impl BufRead) -> io::Result<()> {
        writeln!(self.out, "Enter \"help\" for available commands.")?;
        let mut lines = input.lines();
        loop {
            if self.options.prompt {
                let prefix = if self.tracing { "DBG " } else { "" };
                write!(self.out, "{prefix}B+TREE> ")?;
                self.out.flush()?;
            }
            let Some(line) = lines.next().transpose()? else {
                writeln!(self.out, "Goodbye")?;
                return Ok(());
            };
            if self.execute(&line)? == Flow::Stop {
                return Ok(());
            }
        }
    }

    /// Run a single command line.
    fn execute(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let (word, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, a)| (w, a.trim_start()));

        let Some(command) = lookup(word) else {
            writeln!(self.out, "Invalid command \"{word}\" - try \"help\"")?;
            return Ok(Flow::Continue);
        };
        tracing::trace!(?command, arg, "command");

        match command {
            Command::Id => self.options.display.show_ids = true,
            Command::NoId => self.options.display.show_ids = false,
            Command::AutoTree => self.options.feedback = Feedback::Tree,
            Command::AutoList => self.options.feedback = Feedback::List,
            Command::Hush => self.options.feedback = Feedback::Nothing,
            Command::Trace => self.set_tracing(true),
            Command::NoTrace => self.set_tracing(false),
            Command::Add => self.add(word, arg)?,
            Command::Delete => self.delete(arg)?,
            Command::Get { show_rows } => self.retrieve(arg, show_rows, true)?,
            Command::Scan { show_rows } => self.retrieve(arg, show_rows, false)?,
            Command::Find => self.find(arg)?,
            Command::List => {
                write_list(&mut self.out, &self.tree)?;
                writeln!(self.out)?;
            }
            Command::Display => {
                write_tree(&mut self.out, &self.tree, self.options.display)?;
                writeln!(self.out)?;
            }
            Command::Check => match self.tree.check() {
                Ok(()) => writeln!(self.out, "Tree is consistent")?,
                Err(violation) => writeln!(self.out, "Invariant violated: {violation}")?,
            },
            Command::Help => write!(self.out, "{HELP}")?,
            Command::Quit => {
                writeln!(self.out, "Goodbye")?;
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn set_tracing(&mut self, on: bool) {
        self.tracing = on;
        if let Some(hook) = self.trace_hook.as_mut() {
            hook(on);
        }
    }

    fn add(&mut self, word: &str, arg: &str) -> io::Result<()> {
        if self.options.echo {
            writeln!(self.out, "+{arg}")?;
        }
        let parsed = arg
            .split_once(',')
            .and_then(|(key, value)| value.trim().parse::<u64>().ok().map(|v| (key, v)));
        let Some((key, offset)) = parsed else {
            writeln!(
                self.out,
                "Expected : {} key, <positive value>",
                word.to_ascii_lowercase()
            )?;
            return Ok(());
        };

        match self.tree.insert(key, offset) {
            Ok(()) => self.feedback(),
            Err(e) => writeln!(self.out, "{e}"),
        }
    }

    fn delete(&mut self, arg: &str) -> io::Result<()> {
        if self.options.echo {
            writeln!(self.out, "-{arg}")?;
        }
        match self.tree.delete(arg) {
            Ok(()) => self.feedback(),
            Err(BTreeError::NotFound(_)) => writeln!(self.out, "Key not found"),
            Err(e) => writeln!(self.out, "{e}"),
        }
    }

    fn feedback(&mut self) -> io::Result<()> {
        match self.options.feedback {
            Feedback::Nothing => return Ok(()),
            Feedback::Tree => write_tree(&mut self.out, &self.tree, self.options.display)?,
            Feedback::List => write_list(&mut self.out, &self.tree)?,
        }
        writeln!(self.out)
    }

    fn find(&mut self, arg: &str) -> io::Result<()> {
        if arg.is_empty() {
            return writeln!(self.out, "No key specified");
        }
        match self.tree.parse_key(arg) {
            Ok(key) => {
                let path = self.tree.search_path(&key);
                write_search_path(&mut self.out, &key, &path)
            }
            Err(e) => writeln!(self.out, "{e}"),
        }
    }

    /// Run `get` (indexed) or `scan` and report the row count and time.
    fn retrieve(&mut self, arg: &str, show_rows: bool, indexed: bool) -> io::Result<()> {
        let Some(source) = self.source.as_mut() else {
            return writeln!(self.out, "No record file to read from");
        };

        let out = &mut self.out;
        let mut write_error = None;
        let mut emit = |row: &str| {
            if !show_rows || write_error.is_some() {
                return;
            }
            if let Err(e) = writeln!(out, "{row}") {
                write_error = Some(e);
            }
        };

        let started = Instant::now();
        let result = if indexed {
            self.tree.get(arg, source, &mut emit)
        } else {
            self.tree.scan(arg, source, &mut emit)
        };
        let elapsed = started.elapsed();
        if let Some(e) = write_error {
            return Err(e);
        }

        match result {
            Ok(rows) => writeln!(self.out, "{}", summary(rows, elapsed)),
            Err(e) => writeln!(self.out, "{e}"),
        }
    }
}

/// `"N lines selected - T s"`, or `"No data found - T s"`.
fn summary(rows: usize, elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    match rows {
        0 => format!("No data found - {seconds:.6}s"),
        1 => format!("1 line selected - {seconds:.6}s"),
        n => format!("{n} lines selected - {seconds:.6}s"),
    }
}
