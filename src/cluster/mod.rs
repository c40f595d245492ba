mod coordinator;
mod member;

pub use coordinator::Coordinator;
pub use member::join;
