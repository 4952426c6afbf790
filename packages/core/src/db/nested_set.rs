use crate::models::{InsertPosition, MovePosition};

/// Destination coordinates for splicing an interval into a page tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplicePoint {
    /// Left edge the interval occupies once the gap is open
    pub left: i64,
    /// Depth assigned to the subtree root at the destination
    pub level: i64,
}

/// Calculates nested-set coordinates for page tree mutations
///
/// Every page carries a preorder interval `[lft, rght]`. A parent's interval
/// strictly contains the intervals of all of its descendants, siblings are
/// ordered by ascending `lft`, and a leaf occupies exactly two slots
/// (`rght = lft + 1`). All splice arithmetic below preserves those rules.
pub struct NestedSetCalculator;

impl NestedSetCalculator {
    /// Splice point for inserting a new leaf relative to an anchor page
    ///
    /// Returns `None` for [`InsertPosition::Root`]: a new root opens a fresh
    /// tree (`lft = 1`, `rght = 2`, `level = 0`) and has no splice point.
    ///
    /// # Examples
    /// ```
    /// // Anchor occupies [3, 8] at level 1
    /// // FirstChildOf  => left 4, level 2
    /// // LastChildOf   => left 8, level 2
    /// // BeforeSibling => left 3, level 1
    /// // AfterSibling  => left 9, level 1
    /// ```
    pub fn insert_point(
        anchor_left: i64,
        anchor_right: i64,
        anchor_level: i64,
        position: &InsertPosition,
    ) -> Option<SplicePoint> {
        match position {
            InsertPosition::Root => None,
            InsertPosition::FirstChildOf(_) => Some(SplicePoint {
                left: anchor_left + 1,
                level: anchor_level + 1,
            }),
            InsertPosition::LastChildOf(_) => Some(SplicePoint {
                left: anchor_right,
                level: anchor_level + 1,
            }),
            InsertPosition::BeforeSibling(_) => Some(SplicePoint {
                left: anchor_left,
                level: anchor_level,
            }),
            InsertPosition::AfterSibling(_) => Some(SplicePoint {
                left: anchor_right + 1,
                level: anchor_level,
            }),
        }
    }

    /// Splice point for landing a moved subtree relative to a target page
    ///
    /// The target's coordinates must be read after the source gap has been
    /// closed; for same-tree moves the gap close shifts the target.
    pub fn move_point(
        target_left: i64,
        target_right: i64,
        target_level: i64,
        position: MovePosition,
    ) -> SplicePoint {
        match position {
            MovePosition::Before => SplicePoint {
                left: target_left,
                level: target_level,
            },
            MovePosition::After => SplicePoint {
                left: target_right + 1,
                level: target_level,
            },
            MovePosition::InsideAsFirstChild => SplicePoint {
                left: target_left + 1,
                level: target_level + 1,
            },
        }
    }

    /// Tree slot for inserting a new root-level sibling
    ///
    /// Roots are ordered by `tree_id`, so placing a page before or after a
    /// root means claiming a slot in the tree sequence rather than a slot
    /// inside an interval. Returns `None` for positions that stay inside a
    /// tree.
    pub fn insert_root_slot(anchor_tree_id: i64, position: &InsertPosition) -> Option<i64> {
        match position {
            InsertPosition::BeforeSibling(_) => Some(anchor_tree_id),
            InsertPosition::AfterSibling(_) => Some(anchor_tree_id + 1),
            _ => None,
        }
    }

    /// Tree slot for landing a subtree before or after a root-level target
    pub fn move_root_slot(target_tree_id: i64, position: MovePosition) -> Option<i64> {
        match position {
            MovePosition::Before => Some(target_tree_id),
            MovePosition::After => Some(target_tree_id + 1),
            MovePosition::InsideAsFirstChild => None,
        }
    }

    /// Number of interval slots a subtree spanning `[left, right]` occupies
    ///
    /// Always even: every page contributes one `lft` and one `rght` slot.
    pub fn subtree_width(left: i64, right: i64) -> i64 {
        right - left + 1
    }

    /// Constant added to every parked coordinate so the subtree lands with
    /// its internal structure intact
    pub fn landing_offset(destination_left: i64, subtree_left: i64) -> i64 {
        destination_left - subtree_left
    }
}
