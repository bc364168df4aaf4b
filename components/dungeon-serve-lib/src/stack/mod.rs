mod tcp_stack;

pub use tcp_stack::*;
