//! User interface components.

mod components;
pub mod theme;

pub use components::{AssigneeAction, AssigneeSelect, SearchRequest};
pub use theme::Theme;
