/// Plans dense sort sequences for content placements within a page block
///
/// A block's placements carry explicit integer `sort` values. After every
/// completed reorder the values within one (page, block) pair must be exactly
/// `0..N-1` in list order. The planner works on placement ids and current
/// sort values only; applying the plan is the store's job.
pub struct BlockOrderPlanner;

impl BlockOrderPlanner {
    /// Resolve the destination block for a placement move
    ///
    /// An explicitly requested block wins. Otherwise the move targets the
    /// reference placement's block, falling back to the placement's current
    /// block when no reference is given.
    pub fn destination_block(
        current: &str,
        before_block: Option<&str>,
        requested: Option<&str>,
    ) -> String {
        match (requested, before_block) {
            (Some(name), _) => name.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => current.to_string(),
        }
    }

    /// Final id sequence after placing `moved_id` into the destination list
    ///
    /// `others` holds the destination block's placement ids ordered by
    /// current sort, excluding the moved placement. With no `before_id` the
    /// moved placement appends to the end. With a `before_id` present in
    /// `others` it slots in immediately before it.
    ///
    /// Returns `None` when `before_id` names a placement that is not in
    /// `others` (it belongs to another block or page). The list is then left
    /// exactly as it is; callers treat this as a quiet skip rather than an
    /// error.
    pub fn plan_order(
        others: &[String],
        moved_id: &str,
        before_id: Option<&str>,
    ) -> Option<Vec<String>> {
        let mut order = Vec::with_capacity(others.len() + 1);
        match before_id {
            None => {
                order.extend(others.iter().cloned());
                order.push(moved_id.to_string());
            }
            Some(before) => {
                let index = others.iter().position(|id| id == before)?;
                order.extend(others[..index].iter().cloned());
                order.push(moved_id.to_string());
                order.extend(others[index..].iter().cloned());
            }
        }
        Some(order)
    }

    /// Sort updates needed to renumber `ordered` into a dense `0..N-1` run
    ///
    /// `ordered` pairs each placement id with its current sort value, in
    /// final list order. Rows already holding their target value are left
    /// out of the update set.
    pub fn dense_renumber(ordered: &[(String, i64)]) -> Vec<(String, i64)> {
        ordered
            .iter()
            .enumerate()
            .filter(|(index, (_, sort))| *sort != *index as i64)
            .map(|(index, (id, _))| (id.clone(), index as i64))
            .collect()
    }
}
