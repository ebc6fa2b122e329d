//! Reusable UI components.

mod assignee_select;

pub use assignee_select::{AssigneeAction, AssigneeSelect, SearchRequest};
