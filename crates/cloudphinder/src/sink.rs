//! Where finished results go.
//!
//! A [`ResultSink`] receives one [`CloudReport`] per dataset, only after the
//! dataset has been processed to completion. [`TableWriter`] renders the
//! summary catalog as the tab-separated table downstream tools expect.

use std::collections::BTreeMap;
use std::io::Write;

use crate::assembler::AssemblyStats;
use crate::error::Result;
use crate::summary::CloudProperties;

/// Everything found in one dataset.
///
/// Group ids and member indices refer to the particle order of the dataset
/// as supplied, not to the dense working subset.
#[derive(Debug, Clone)]
pub struct CloudReport {
    pub label: String,
    /// Bound group id -> member indices, ascending
    pub groups: BTreeMap<usize, Vec<usize>>,
    /// Summaries of groups large enough to describe, heaviest first
    pub clouds: Vec<CloudProperties>,
    /// Particle ids of the whole dataset, by input index
    pub ids: Vec<u64>,
    /// Particles that passed the density cut
    pub dense_count: usize,
    pub stats: AssemblyStats,
}

impl CloudReport {
    /// Member lists of the summarised clouds, heaviest first, keyed by
    /// `Cloud<i>` labels zero-padded to a common width.
    pub fn labelled_clouds(&self) -> Vec<(String, &[usize])> {
        let width = self.clouds.len().max(1).to_string().len();
        self.clouds
            .iter()
            .enumerate()
            .filter_map(|(i, cloud)| {
                self.groups
                    .get(&cloud.id)
                    .map(|members| (format!("Cloud{i:0width$}"), members.as_slice()))
            })
            .collect()
    }
}

/// Consumer of finished reports.
pub trait ResultSink {
    fn accept(&mut self, report: CloudReport) -> Result<()>;
}

/// Collects reports in memory
impl ResultSink for Vec<CloudReport> {
    fn accept(&mut self, report: CloudReport) -> Result<()> {
        self.push(report);
        Ok(())
    }
}

/// Column layout of the summary table
const COLUMNS: [(&str, usize); 7] = [
    ("Mass", 1),
    ("Center", 3),
    ("PrincipalAxes", 3),
    ("Reff", 1),
    ("HalfMassRadius", 1),
    ("NumParticles", 1),
    ("VirialParameter", 1),
];

/// Writes cloud catalogs as tab-separated text.
///
/// The header names each column (or column range) in `# (i) Name` /
/// `# (i-j) Name` lines, followed by one row per cloud, heaviest first.
///
/// # Examples
///
/// ```
/// use cloudphinder::sink::TableWriter;
///
/// let mut writer = TableWriter::new(Vec::new());
/// writer.write_catalog(&[]).unwrap();
/// let text = String::from_utf8(writer.into_inner()).unwrap();
///
/// assert!(text.starts_with("# (0) Mass\n# (1-3) Center\n"));
/// ```
pub struct TableWriter<W: Write> {
    writer: W,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<()> {
        let mut offset = 0;
        for (name, width) in COLUMNS {
            if width == 1 {
                writeln!(self.writer, "# ({offset}) {name}")?;
            } else {
                writeln!(self.writer, "# ({}-{}) {name}", offset, offset + width - 1)?;
            }
            offset += width;
        }
        Ok(())
    }

    /// Writes the header and one row per cloud, sorted by descending mass.
    pub fn write_catalog(&mut self, clouds: &[CloudProperties]) -> Result<()> {
        self.write_header()?;

        let mut rows: Vec<&CloudProperties> = clouds.iter().collect();
        rows.sort_by(|a, b| b.mass.total_cmp(&a.mass));

        for cloud in rows {
            let fields = [
                cloud.mass,
                cloud.center.x,
                cloud.center.y,
                cloud.center.z,
                cloud.principal_axes.x,
                cloud.principal_axes.y,
                cloud.principal_axes.z,
                cloud.effective_radius,
                cloud.half_mass_radius,
                cloud.num_particles as f64,
                cloud.virial_parameter,
            ];
            let row: Vec<String> = fields.iter().map(|v| v.to_string()).collect();
            writeln!(self.writer, "{}", row.join("\t"))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Cloud label -> particle ids, the JSON membership document.
pub fn membership_document(report: &CloudReport) -> BTreeMap<String, Vec<u64>> {
    report
        .labelled_clouds()
        .into_iter()
        .map(|(label, members)| (label, members.iter().map(|&i| report.ids[i]).collect()))
        .collect()
}

