//! 文件所有权修改（`chown`）。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

use anyhow::Result;
use hangar_core::platform::{ownership_target, OwnershipManager, OwnershipSpec};
use tracing::info;

use crate::command::run_checked;

/// 通过 `chown [-R] user[:group] path` 修改所有权。
#[derive(Debug, Clone)]
pub struct ChownOwnership {
    program: String,
}

impl ChownOwnership {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn chown(&self, path: &Path, spec: &OwnershipSpec, recursive: bool) -> Result<()> {
        let Some(user) = ownership_target(path, spec)? else {
            return Ok(());
        };
        let owner = owner_argument(user, spec.group());
        let path_arg = path.to_string_lossy();
        info!(%owner, path = %path.display(), recursive, "修改所有权");
        if recursive {
            run_checked(&self.program, &["-R", &owner, &path_arg])
        } else {
            run_checked(&self.program, &[&owner, &path_arg])
        }
    }
}

impl OwnershipManager for ChownOwnership {
    fn change_file_owner(&self, path: &Path, spec: &OwnershipSpec) -> Result<()> {
        self.chown(path, spec, false)
    }

    fn change_folder_owner_recursive(&self, path: &Path, spec: &OwnershipSpec) -> Result<()> {
        self.chown(path, spec, true)
    }
}

/// `user` 或 `user:group`。
pub fn owner_argument(user: &str, group: Option<&str>) -> String {
    match group {
        Some(group) => format!("{user}:{group}"),
        None => user.to_string(),
    }
}
