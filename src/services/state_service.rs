use indexmap::IndexMap;

use crate::{
    dto::states::{StateView, StatesResponse},
    state::SharedState,
};

/// Cached states at or below `prefix`, sorted by path.
pub fn dump(state: &SharedState, prefix: String) -> StatesResponse {
    let mut entries = state.store().entries_under(&prefix);
    entries.sort_by(|(left, _), (right, _)| left.cmp(right));
    let states = entries
        .into_iter()
        .map(|(path, entry)| (path, StateView::from(entry)))
        .collect::<IndexMap<_, _>>();
    StatesResponse { prefix, states }
}
