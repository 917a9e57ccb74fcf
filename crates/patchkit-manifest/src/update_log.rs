//! The append-only update journal: one `FileInfo` line per committed
//! directory creation or decompressed file.
//!
//! Nothing in this implementation reads the log back in on startup — it is
//! diagnostic only, matching the original `IcePatch2::Patcher` which never
//! consumes it either.

use patchkit_core::PatchError;
use patchkit_tree::FileInfo;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct UpdateLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl UpdateLog {
    /// Open `<data_dir>.log` for writing (sibling to the data directory, not
    /// inside it), truncating any prior run's log.
    pub fn open(data_dir: &Path) -> Result<Self, PatchError> {
        let path = log_path(data_dir);
        let file = File::create(&path).map_err(|e| PatchError::io(path.to_string_lossy(), e))?;
        Ok(UpdateLog {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Append one committed entry as a JSON line.
    pub fn append(&mut self, info: &FileInfo) -> Result<(), PatchError> {
        let line = serde_json::to_string(info).map_err(|e| PatchError::io(
            self.path.to_string_lossy(),
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        ))?;
        writeln!(self.writer, "{line}").map_err(|e| PatchError::io(self.path.to_string_lossy(), e))
    }

    pub fn close(mut self) -> Result<(), PatchError> {
        self.writer
            .flush()
            .map_err(|e| PatchError::io(self.path.to_string_lossy(), e))
    }
}

pub fn log_path(data_dir: &Path) -> PathBuf {
    let mut os_string = data_dir.as_os_str().to_owned();
    os_string.push(".log");
    PathBuf::from(os_string)
}
