pub mod dispatcher;
pub mod interactive_view;
pub mod main_types;
