// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use khata_app::CsvExport;
use std::fs;
use std::path::{Path, PathBuf};
use time::Date;
use tracing::info;

/// Host services for the terminal app: the clock and the export directory.
pub struct CliRuntime {
    today: Date,
    export_dir: PathBuf,
}

impl CliRuntime {
    pub fn new(today: Date, export_dir: PathBuf) -> Self {
        Self { today, export_dir }
    }
}

/// Writes an export into `dir` under its own file name.
pub fn write_export(dir: &Path, export: &CsvExport) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create export directory {}", dir.display()))?;
    let path = dir.join(&export.file_name);
    fs::write(&path, &export.content)
        .with_context(|| format!("write export {}", path.display()))?;
    info!(path = %path.display(), rows = export.rows, "csv written");
    Ok(path)
}

impl khata_tui::AppRuntime for CliRuntime {
    fn today(&self) -> Date {
        self.today
    }

    fn save_export(&mut self, export: &CsvExport) -> Result<PathBuf> {
        write_export(&self.export_dir, export)
    }
}
