use std::fs;

use camino::Utf8Path;

use crate::domain::SubjectId;
use crate::error::HcpError;

pub const DOWNLOAD_TASKLIST_FILE: &str = "download_data_tasklist.txt";
pub const FSL_TASKLIST_FILE: &str = "fsl_pipeplines_tasklist.txt";

/// A generator of shell command lines, one job per line.
pub trait Tasklist {
    fn default_file_name(&self) -> &'static str;

    fn lines(&self) -> Vec<String>;

    /// Writes every line newline-terminated, replacing `path` atomically.
    fn write_to(&self, path: &Utf8Path) -> Result<usize, HcpError> {
        let lines = self.lines();
        let mut content = String::new();
        for line in &lines {
            content.push_str(line);
            content.push('\n');
        }
        write_atomic(path, content.as_bytes())?;
        Ok(lines.len())
    }
}

/// One `hcp-download` invocation per subject and task string.
#[derive(Debug, Clone)]
pub struct DownloadTasklist {
    pub subjects: Vec<SubjectId>,
    /// Passed through verbatim to `--tasks`, e.g. `MOTOR:LR,GAMBLING:LR`.
    pub tasks: Vec<String>,
    pub program: String,
    pub dataset_path: String,
    pub output_path: String,
}

impl Tasklist for DownloadTasklist {
    fn default_file_name(&self) -> &'static str {
        DOWNLOAD_TASKLIST_FILE
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.subjects.len() * self.tasks.len());
        for subject in &self.subjects {
            for task in &self.tasks {
                lines.push(format!(
                    "{} --subjects {subject} --tasks {task} --dataset-path {} --output-path {}",
                    self.program, self.dataset_path, self.output_path
                ));
            }
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FslTask {
    pub name: String,
    pub contrasts: Vec<String>,
}

/// Container invocation shared by every pipeline job.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Host directory bound into the container.
    pub bind_source: String,
    /// Project root inside the container, without a trailing slash.
    pub project_root: String,
    pub image: String,
}

/// One pipeline job per subject × task × fwhm × motion × hrf.
#[derive(Debug, Clone)]
pub struct FslTasklist {
    pub subjects: Vec<SubjectId>,
    pub tasks: Vec<FslTask>,
    pub fwhms: Vec<u32>,
    pub motions: Vec<u32>,
    pub hrfs: Vec<String>,
    pub operations: Vec<String>,
    pub software: String,
    pub container: ContainerSpec,
}

impl FslTasklist {
    pub fn job_count(&self) -> usize {
        self.subjects.len()
            * self.tasks.len()
            * self.fwhms.len()
            * self.motions.len()
            * self.hrfs.len()
    }

    fn command(
        &self,
        subject: &SubjectId,
        task: &FslTask,
        fwhm: u32,
        motion: u32,
        hrf: &str,
    ) -> String {
        let ContainerSpec {
            bind_source,
            project_root: root,
            image,
        } = &self.container;
        format!(
            "singularity exec --bind {bind_source}:{root}/ --pwd {root}/src {image} \
             python run_pipeline.py -e {root}/data/original -r {root}/data/derived \
             -s '[{subject}]' -o '{operations}' -S \"{software}\" -t '[{task_name}]' \
             -c '{contrasts}' -f {fwhm} -p {motion} -h \"{hrf}\"",
            operations = json_list(&self.operations),
            software = self.software,
            task_name = task.name,
            contrasts = json_list(&task.contrasts),
        )
    }
}

impl Tasklist for FslTasklist {
    fn default_file_name(&self) -> &'static str {
        FSL_TASKLIST_FILE
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.job_count());
        for subject in &self.subjects {
            for task in &self.tasks {
                for &fwhm in &self.fwhms {
                    for &motion in &self.motions {
                        for hrf in &self.hrfs {
                            lines.push(self.command(subject, task, fwhm, motion, hrf));
                        }
                    }
                }
            }
        }
        lines
    }
}

/// JSON array with `", "` separators, e.g. `["lf", "rf"]`.
pub fn json_list(items: &[String]) -> String {
    let quoted = items
        .iter()
        .map(|item| serde_json::Value::String(item.clone()).to_string())
        .collect::<Vec<_>>();
    format!("[{}]", quoted.join(", "))
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HcpError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".hcp-tasklist")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| HcpError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    Ok(())
}
