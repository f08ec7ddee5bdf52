mod command;
mod echo;

pub use command::CommandAgent;
pub use echo::EchoAgent;
