//! Result files.
//!
//! Each snapshot produces two files:
//! - `bound_<stem>_n<nmin>_alpha<alpha>.dat`: the tab-separated cloud table
//! - `clouds_<stem>_n<nmin>_alpha<alpha>.json`: cloud label -> particle ids
//!
//! They go to the output directory when one is given, otherwise next to the
//! snapshot.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;

use cloudphinder::{CloudError, Result};
use cloudphinder::sink::{CloudReport, ResultSink, TableWriter, membership_document};

/// Paths of the two result files for one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub membership: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, stem: &str, nmin: f64, alpha_crit: f64) -> Self {
        let suffix = format!("{stem}_n{nmin}_alpha{alpha_crit}");
        Self {
            table: dir.join(format!("bound_{suffix}.dat")),
            membership: dir.join(format!("clouds_{suffix}.json")),
        }
    }

    pub fn exist(&self) -> bool {
        self.table.exists() && self.membership.exists()
    }
}

/// Writes every report it receives to disk.
///
/// Reports are matched to their snapshot by label, which for file sources is
/// the snapshot path. A label that was never registered is itself treated as
/// the snapshot path.
pub struct FileSink {
    output_dir: Option<PathBuf>,
    sources: HashMap<String, PathBuf>,
    claimed: HashMap<PathBuf, String>,
    nmin: f64,
    alpha_crit: f64,
    written: Vec<OutputPaths>,
}

impl FileSink {
    pub fn new(output_dir: Option<PathBuf>, nmin: f64, alpha_crit: f64) -> Self {
        Self {
            output_dir,
            sources: HashMap::new(),
            claimed: HashMap::new(),
            nmin,
            alpha_crit,
            written: Vec::new(),
        }
    }

    /// Registers the snapshot behind `label` and returns where its results go.
    ///
    /// Fails if a different snapshot already writes to the same files.
    pub fn register_source(&mut self, label: &str, snapshot: &Path) -> Result<OutputPaths> {
        let paths = self.paths_for(snapshot);
        if let Some(other) = self.claimed.get(&paths.table).filter(|other| *other != label) {
            return Err(CloudError::config(format!(
                "{} and {} would both write {}",
                other,
                label,
                paths.table.display()
            )));
        }
        self.claimed.insert(paths.table.clone(), label.to_string());
        self.sources.insert(label.to_string(), snapshot.to_path_buf());
        Ok(paths)
    }

    /// Where the results for `label` are written.
    pub fn paths(&self, label: &str) -> OutputPaths {
        match self.sources.get(label) {
            Some(snapshot) => self.paths_for(snapshot),
            None => self.paths_for(Path::new(label)),
        }
    }

    fn paths_for(&self, snapshot: &Path) -> OutputPaths {
        let stem = snapshot
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => snapshot.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        OutputPaths::new(&dir, &stem, self.nmin, self.alpha_crit)
    }

    pub fn written(&self) -> &[OutputPaths] {
        &self.written
    }
}

impl ResultSink for FileSink {
    fn accept(&mut self, report: CloudReport) -> Result<()> {
        let paths = self.paths(&report.label);
        if let Some(dir) = paths.table.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut table = TableWriter::new(BufWriter::new(File::create(&paths.table)?));
        table.write_catalog(&report.clouds)?;

        let membership = BufWriter::new(File::create(&paths.membership)?);
        serde_json::to_writer_pretty(membership, &membership_document(&report))?;

        info!(
            "{}: wrote {} clouds to {}",
            report.label,
            report.clouds.len(),
            paths.table.display()
        );
        self.written.push(paths);
        Ok(())
    }
}
