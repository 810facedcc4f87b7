/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub completed: usize,
    pub current: usize,
    pub is_complete: bool,
    pub review_mode: bool,
}
