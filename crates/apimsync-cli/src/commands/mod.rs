pub mod extract;
pub mod publish;
