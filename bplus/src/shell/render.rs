//! Text renderings of a tree.
//!
//! # Tree display
//!
//! Each node is printed on its own line, children indented three columns
//! under their parent. Internal nodes list their separators; leaves list one
//! entry per line with the offset zero-padded to ten digits:
//!
//! ```text
//!   3-[4, 7]
//!        1-[1	0000000010
//!           2	0000000020
//!           3	0000000030]
//! ```
//!
//! Extended mode also shows child handles, empty slots, the parent serial as
//! `(^n)` and the next leaf as `(->n)`.

use std::io::{self, Write};

use crate::btree::{BPlusTree, Key, Node, NodeId, SearchPath};

/// What the tree display includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Prefix every node with its serial number.
    pub show_ids: bool,
    /// Show empty slots and links.
    pub extended: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_ids: true,
            extended: false,
        }
    }
}

const INDENT_STEP: usize = 3;
const ID_WIDTH: usize = 4;

/// Print the whole tree, one node per line.
pub fn write_tree(out: &mut impl Write, tree: &BPlusTree, options: DisplayOptions) -> io::Result<()> {
    if let Some(root) = tree.root() {
        write_node(out, tree, root, 0, options)?;
    }
    Ok(())
}

fn serial_of(tree: &BPlusTree, id: NodeId) -> u64 {
    tree.node(id).map_or(0, Node::serial)
}

fn write_node(
    out: &mut impl Write,
    tree: &BPlusTree,
    id: NodeId,
    indent: usize,
    options: DisplayOptions,
) -> io::Result<()> {
    let Some(node) = tree.node(id) else {
        return Ok(());
    };

    write!(out, "{:indent$}", "")?;
    if options.show_ids {
        write!(out, "{:3}-", node.serial())?;
    }
    write!(out, "[")?;

    match node {
        Node::Internal(internal) if !options.extended => {
            let keys: Vec<String> = internal.keys.iter().map(Key::to_string).collect();
            writeln!(out, "{}]", keys.join(", "))?;
        }
        Node::Internal(internal) => {
            let max_keys = tree.config().max_keys;
            for slot in 0..=max_keys {
                match slot.checked_sub(1).map(|i| internal.keys.get(i)) {
                    Some(Some(key)) => write!(out, "{key}")?,
                    Some(None) => write!(out, "*")?,
                    None => {}
                }
                match internal.children.get(slot) {
                    Some(&child) if options.show_ids => {
                        write!(out, "<{}>", serial_of(tree, child))?;
                    }
                    Some(_) => write!(out, ":")?,
                    None => write!(out, "~")?,
                }
            }
            if let Some(parent) = internal.parent {
                write!(out, "(^{})", serial_of(tree, parent))?;
            }
            writeln!(out, "]")?;
        }
        Node::Leaf(leaf) => {
            let continuation = indent + 1 + if options.show_ids { ID_WIDTH } else { 0 };
            let shown = if options.extended {
                tree.config().max_keys
            } else {
                leaf.entries.len()
            };
            for i in 0..shown {
                if i > 0 {
                    write!(out, "{:continuation$}", "")?;
                }
                match leaf.entries.get(i) {
                    Some(entry) => write!(out, "{}\t{:010}", entry.key, entry.offset)?,
                    None => write!(out, "*")?,
                }
                if i + 1 < shown || options.extended {
                    writeln!(out)?;
                }
            }
            if options.extended {
                write!(out, "{:continuation$}", "")?;
                if let Some(parent) = leaf.parent {
                    write!(out, "(^{})", serial_of(tree, parent))?;
                }
                match leaf.next {
                    Some(next) => write!(out, "(->{})", serial_of(tree, next))?,
                    None => write!(out, "(->*)")?,
                }
            }
            writeln!(out, "]")?;
        }
    }

    if let Node::Internal(internal) = node {
        for &child in &internal.children {
            write_node(out, tree, child, indent + INDENT_STEP, options)?;
        }
    }
    Ok(())
}

/// Print every `(key, offset)` pair in key order.
pub fn write_list(out: &mut impl Write, tree: &BPlusTree) -> io::Result<()> {
    for entry in tree.iter() {
        writeln!(out, "({}, {})", entry.key, entry.offset)?;
    }
    Ok(())
}

/// Print the nodes a lookup for `key` went through.
pub fn write_search_path(out: &mut impl Write, key: &Key, path: &SearchPath) -> io::Result<()> {
    writeln!(out, "Search path:")?;
    for (level, step) in path.steps.iter().enumerate() {
        let passed: Vec<String> = step.passed.iter().map(Key::to_string).collect();
        write!(out, "{:width$}[node {}] ", "", step.serial, width = level * 2)?;
        if step.is_leaf {
            write!(out, "LEAF-")?;
        }
        writeln!(out, "{}", passed.join(","))?;
    }
    match path.found {
        Some(offset) => writeln!(out, "*** FOUND ({key}, {offset}) ***"),
        None => writeln!(out, "*** NOT FOUND ***"),
    }
}
