//! Vocabulary constants shared by event parsing and exports.

/// Event `type` values handled by the study itself rather than by a rule.
pub mod control_events {
    pub const UPDATE_DEPENDENCIES: &str = "Update Dependencies";
    pub const UPDATE_ENTITY: &str = "Update Entity";
    pub const HIDE_NODE: &str = "Hide Node";
}

/// Field names inside raw study events.
pub mod event_fields {
    pub const TYPE: &str = "type";
    pub const NODE_ID: &str = "node_id";
    pub const CHANGES: &str = "changes";
    pub const CHANGE: &str = "change";
    pub const ACTIVITY: &str = "activity";
}

/// Event type served by the built-in declarative activity rule.
pub const ACTIVITY_RECORDED: &str = "Activity Recorded";

/// Style hint keys understood by presentation collaborators.
pub mod style {
    pub const BACKGROUND_COLOR: &str = "background-color";
    pub const BORDER_WIDTH: &str = "border-width";
}
