// apps/fr_cli/src/commands/mod.rs

//! 子命令实现，每个命令一个文件。

pub mod info;
pub mod post;
pub mod run;
pub mod upload;
pub mod validate;
pub mod viz;
