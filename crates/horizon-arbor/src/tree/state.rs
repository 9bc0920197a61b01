//! Tri-state selection values.

use serde::{Deserialize, Serialize};

/// Check state of a tree item.
///
/// `Indeterminate` is only ever derived for items with children while the
/// manager runs in [`SelectionRelationship::Related`] mode; leaves are always
/// `Checked` or `Unchecked`.
///
/// [`SelectionRelationship::Related`]: super::SelectionRelationship::Related
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    /// Item is unchecked.
    #[default]
    Unchecked,
    /// Some, but not all, of the item's children are checked.
    Indeterminate,
    /// Item is checked.
    Checked,
}

impl CheckState {
    /// Returns `true` if the item is fully checked.
    pub fn is_checked(&self) -> bool {
        matches!(self, CheckState::Checked)
    }

    /// Returns `true` if the item is neither fully checked nor unchecked.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, CheckState::Indeterminate)
    }

    /// Toggles between Unchecked and Checked.
    /// Indeterminate becomes Checked.
    pub fn toggle(&self) -> CheckState {
        match self {
            CheckState::Unchecked | CheckState::Indeterminate => CheckState::Checked,
            CheckState::Checked => CheckState::Unchecked,
        }
    }

    /// Numeric encoding: `1` checked, `0` unchecked, `-1` indeterminate.
    pub fn as_i8(&self) -> i8 {
        match self {
            CheckState::Checked => 1,
            CheckState::Unchecked => 0,
            CheckState::Indeterminate => -1,
        }
    }

    /// Parses the numeric encoding produced by [`as_i8`](Self::as_i8).
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(CheckState::Checked),
            0 => Some(CheckState::Unchecked),
            -1 => Some(CheckState::Indeterminate),
            _ => None,
        }
    }

    /// Derives a parent's state from its children's states.
    ///
    /// Checked iff every child is checked, unchecked iff every child is
    /// unchecked, indeterminate otherwise. A parent without children keeps
    /// `fallback`.
    pub fn aggregate<I>(children: I, fallback: CheckState) -> CheckState
    where
        I: IntoIterator<Item = CheckState>,
    {
        let mut any = false;
        let mut all_checked = true;
        let mut all_unchecked = true;
        for state in children {
            any = true;
            match state {
                CheckState::Checked => all_unchecked = false,
                CheckState::Unchecked => all_checked = false,
                CheckState::Indeterminate => return CheckState::Indeterminate,
            }
            if !all_checked && !all_unchecked {
                return CheckState::Indeterminate;
            }
        }
        if !any {
            fallback
        } else if all_checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }
}

impl From<bool> for CheckState {
    fn from(checked: bool) -> Self {
        if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }
}
