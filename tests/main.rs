mod common;
mod demos;
mod fail;
mod semantics;
