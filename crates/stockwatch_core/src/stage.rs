/// Steps of a single target check, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetching,
    Parsing,
    Locating,
    Deciding,
    Notifying,
    Done,
}
