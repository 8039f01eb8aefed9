/// Visibility of a film as it was before the write being evaluated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PriorState {
    Absent,
    Unpublished,
    Published,
}

impl PriorState {
    pub fn of(existing_is_published: Option<bool>) -> Self {
        match existing_is_published {
            None => PriorState::Absent,
            Some(false) => PriorState::Unpublished,
            Some(true) => PriorState::Published,
        }
    }

    /// True when the write moved the film from absent or hidden to visible.
    pub fn just_published(self, now_published: bool) -> bool {
        now_published && self != PriorState::Published
    }
}
