//! Human-readable dumps of a managed tree.
//!
//! ```
//! use horizon_arbor::tree::{TreeConfig, TreeDebug, TreeFormatOptions, TreeItem, TreeManager, TreeStyle};
//!
//! let manager = TreeManager::from_items(
//!     vec![TreeItem::new("a", "A").with_children(vec![
//!         TreeItem::new("b", "B").with_selected(true),
//!         TreeItem::new("c", "C"),
//!     ])],
//!     TreeConfig::default(),
//! )
//! .unwrap();
//!
//! let text = TreeDebug::with_options(TreeFormatOptions::minimal().with_style(TreeStyle::Ascii))
//!     .format(&manager);
//! assert_eq!(text, "[-] A\n+-- [x] B\n`-- [ ] C\n");
//! ```

use super::composer::ItemKey;
use super::item::ItemProperty;
use super::manager::{TreeManager, TreeState};
use super::state::CheckState;
use crate::error::{Result, TreeError};

/// Branch drawing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Indentation with a leading dash.
    Compact,
}

/// What [`TreeDebug`] prints.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Prefix every line with `[x]`, `[-]` or `[ ]`.
    pub show_check_states: bool,
    /// Append each item's value in angle brackets.
    pub show_values: bool,
    /// Append each item's arena key.
    pub show_keys: bool,
    /// Append field markers (disabled, readonly, hidden, expanded).
    pub show_flags: bool,
    /// Maximum depth to print (`None` for unlimited).
    pub max_depth: Option<usize>,
    /// Width of one indentation level.
    pub indent_size: usize,
    /// Skip the children of collapsed items.
    pub respect_expansion: bool,
    /// Print a header line with the item count.
    pub show_header: bool,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_check_states: true,
            show_values: true,
            show_keys: false,
            show_flags: true,
            max_depth: None,
            indent_size: 3,
            respect_expansion: false,
            show_header: true,
        }
    }
}

impl TreeFormatOptions {
    /// Everything, including arena keys.
    pub fn detailed() -> Self {
        Self {
            show_keys: true,
            ..Default::default()
        }
    }

    /// Check boxes and labels only.
    pub fn minimal() -> Self {
        Self {
            show_values: false,
            show_flags: false,
            show_header: false,
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: TreeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_respect_expansion(mut self, respect_expansion: bool) -> Self {
        self.respect_expansion = respect_expansion;
        self
    }
}

/// Formats a [`TreeManager`]'s items as an indented tree.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Formats every root and its subtree.
    pub fn format(&self, manager: &TreeManager) -> String {
        manager.with_state(|state| {
            let mut output = String::new();
            if self.options.show_header {
                output.push_str(&format!("Tree ({} items):\n", state.composer.len()));
                if state.composer.is_empty() {
                    output.push_str("  (empty)\n");
                }
            }
            for &root in state.composer.roots() {
                self.format_into(state, root, &mut output);
            }
            output
        })
    }

    /// Formats one item and its subtree.
    pub fn format_subtree(&self, manager: &TreeManager, key: ItemKey) -> Result<String> {
        manager.with_state(|state| {
            if !state.composer.contains(key) {
                return Err(TreeError::UnknownItem(key));
            }
            let mut output = String::new();
            self.format_into(state, key, &mut output);
            Ok(output)
        })
    }

    /// Writes `root` and its subtree in pre-order. Each stack entry carries,
    /// for every ancestor below the printed root, whether it was the last of
    /// its siblings.
    fn format_into(&self, state: &TreeState, root: ItemKey, output: &mut String) {
        let mut stack = vec![(root, Vec::new())];
        while let Some((key, trail)) = stack.pop() {
            let Some(data) = state.composer.item(key) else {
                continue;
            };

            output.push_str(&self.build_prefix(&trail));
            if self.options.show_check_states {
                output.push_str(match state.check_state(key) {
                    CheckState::Checked => "[x] ",
                    CheckState::Indeterminate => "[-] ",
                    CheckState::Unchecked => "[ ] ",
                });
            }
            output.push_str(&data.label);
            if self.options.show_values {
                output.push_str(&format!(" <{}>", data.value));
            }
            if self.options.show_keys {
                output.push_str(&format!(" [{key:?}]"));
            }
            if self.options.show_flags {
                let flags: Vec<&str> = [
                    (ItemProperty::Disabled, "disabled"),
                    (ItemProperty::Readonly, "readonly"),
                    (ItemProperty::Hidden, "hidden"),
                ]
                .into_iter()
                .filter(|&(property, _)| data.flag(property))
                .map(|(_, name)| name)
                .chain(state.is_expanded(key).then_some("expanded"))
                .collect();
                if !flags.is_empty() {
                    output.push_str(&format!(" ({})", flags.join(", ")));
                }
            }
            output.push('\n');

            if self.options.max_depth.is_some_and(|max| trail.len() >= max) {
                continue;
            }
            if self.options.respect_expansion && !state.is_expanded(key) {
                continue;
            }

            let children = state.composer.get_item_children(key);
            for (i, &child) in children.iter().enumerate().rev() {
                let mut child_trail = trail.clone();
                child_trail.push(i + 1 == children.len());
                stack.push((child, child_trail));
            }
        }
    }

    fn build_prefix(&self, trail: &[bool]) -> String {
        let Some((&is_last, parents)) = trail.split_last() else {
            return String::new();
        };

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };
        let indent = self.options.indent_size;

        let mut prefix = String::new();
        for &parent_is_last in parents {
            if parent_is_last || branch.is_empty() {
                prefix.push_str(&" ".repeat(indent + 1));
            } else {
                prefix.push_str(branch);
                prefix.push_str(&" ".repeat(indent));
            }
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }
}
