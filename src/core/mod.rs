//! 核心模块
//!
//! 协议标记、特征定义、特征仓库和分类引擎。

pub mod classifier;
pub mod mark;
pub mod pattern;
pub mod repository;
pub mod syntax;

pub use classifier::Classifier;
pub use mark::{FlowMark, Mark};
pub use pattern::{CompileFlags, ExecFlags, Pattern};
pub use repository::PatternRepository;
