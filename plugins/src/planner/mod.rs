mod command;

pub use command::CommandPlanner;
