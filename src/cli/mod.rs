pub mod history;
pub mod ui;
pub mod value;
