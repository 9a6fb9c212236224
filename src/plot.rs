use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use tracing::info;

use crate::error::{BenchError, Result};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Launches gnuplot on a finished data file:
/// `<binary> -c <template> <data file> <display name>`.
#[derive(Debug, Clone)]
pub struct GnuPlot {
    binary: String,
    template: PathBuf,
}

impl GnuPlot {
    /// Fails if the template is unreadable or starts with a UTF-8 BOM,
    /// which gnuplot chokes on.
    pub fn new(binary: impl Into<String>, template: impl Into<PathBuf>) -> Result<Self> {
        let template = template.into();
        check_template_encoding(&template)?;
        Ok(Self {
            binary: binary.into(),
            template,
        })
    }

    pub fn command(&self, data_path: &Path, name: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-c").arg(&self.template).arg(data_path).arg(name);
        cmd
    }

    /// Spawns the plot window and returns without waiting for it.
    pub fn open(&self, data_path: &Path, name: &str) -> Result<Child> {
        info!(data = %data_path.display(), name, "opening plot");
        Ok(self.command(data_path, name).spawn()?)
    }
}

fn check_template_encoding(path: &Path) -> Result<()> {
    let mut head = Vec::with_capacity(UTF8_BOM.len());
    File::open(path)?
        .take(UTF8_BOM.len() as u64)
        .read_to_end(&mut head)?;

    if head == UTF8_BOM {
        return Err(BenchError::Template {
            path: path.display().to_string(),
            message: "UTF-8 BOM is not supported, save it as plain UTF-8 or ASCII".into(),
        });
    }
    Ok(())
}
