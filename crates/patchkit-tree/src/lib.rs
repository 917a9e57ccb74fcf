pub mod file_info;
pub mod tree;

pub use file_info::{FileInfo, FileInfoSeq};
pub use tree::{build_tree0, FileTree0, TreeNode};
