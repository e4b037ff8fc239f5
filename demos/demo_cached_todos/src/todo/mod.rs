pub mod todo_model;
pub mod todo_state;
pub mod todo_view;
