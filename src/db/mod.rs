pub mod activity;
pub mod categories;
pub mod checklists;
pub mod notes;
pub mod tags;
pub mod tasks;
pub mod users;
