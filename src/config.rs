use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::SubjectId;
use crate::error::HcpError;
use crate::tasklist::{ContainerSpec, DownloadTasklist, FslTask, FslTasklist};

pub const DEFAULT_CONFIG_FILE: &str = "hcp-tasklist.json";

/// On-disk task-list configuration. Every field is optional and falls back
/// to the lists of the original study.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub subjects: Option<Vec<String>>,
    #[serde(default)]
    pub download: Option<DownloadEntry>,
    #[serde(default)]
    pub fsl: Option<FslEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadEntry {
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub dataset_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FslEntry {
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
    #[serde(default)]
    pub contrasts: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub fwhms: Option<Vec<u32>>,
    #[serde(default)]
    pub motions: Option<Vec<u32>>,
    #[serde(default)]
    pub hrfs: Option<Vec<String>>,
    #[serde(default)]
    pub operations: Option<Vec<String>>,
    #[serde(default)]
    pub software: Option<String>,
    #[serde(default)]
    pub bind_source: Option<String>,
    #[serde(default)]
    pub project_root: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub download: DownloadTasklist,
    pub fsl: FslTasklist,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `hcp-tasklist.json` when present, or the built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HcpError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using built-in lists");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HcpError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HcpError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HcpError> {
        let subjects = config
            .subjects
            .unwrap_or_else(default_subjects)
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<SubjectId>, HcpError>>()?;

        let download = config.download.unwrap_or_default();
        let download = DownloadTasklist {
            subjects: subjects.clone(),
            tasks: download.tasks.unwrap_or_else(default_download_tasks),
            program: download
                .program
                .unwrap_or_else(|| "hcp-download".to_string()),
            dataset_path: download
                .dataset_path
                .unwrap_or_else(|| "/hopper/groups/enkavilab/data/hcp".to_string()),
            output_path: download.output_path.unwrap_or_else(|| {
                "/hopper/groups/enkavilab/users/zenkavi/hcp_multi_pipelines/data/original"
                    .to_string()
            }),
        };

        let fsl = config.fsl.unwrap_or_default();
        let contrasts = fsl.contrasts.unwrap_or_else(default_contrasts);
        let tasks = fsl
            .tasks
            .unwrap_or_else(default_fsl_tasks)
            .into_iter()
            .map(|name| {
                let contrasts = contrasts
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| HcpError::MissingContrasts(name.clone()))?;
                Ok(FslTask { name, contrasts })
            })
            .collect::<Result<Vec<_>, HcpError>>()?;
        let project_root = fsl
            .project_root
            .unwrap_or_else(|| "/srv/tempdd/egermani/hcp_pipelines".to_string())
            .trim_end_matches('/')
            .to_string();
        let fsl = FslTasklist {
            subjects,
            tasks,
            fwhms: fsl.fwhms.unwrap_or_else(|| vec![5, 8]),
            motions: fsl.motions.unwrap_or_else(|| vec![0, 6, 24]),
            hrfs: fsl.hrfs.unwrap_or_else(|| strings(&["derivatives", "no_derivatives"])),
            operations: fsl
                .operations
                .unwrap_or_else(|| strings(&["preprocessing", "l1", "registration"])),
            software: fsl.software.unwrap_or_else(|| "fsl".to_string()),
            container: ContainerSpec {
                bind_source: fsl.bind_source.unwrap_or_else(|| {
                    "/hopper/groups/enkavilab/users/zenkavi/hcp_multi_pipelines".to_string()
                }),
                project_root,
                image: fsl.image.unwrap_or_else(|| {
                    "/hopper/groups/enkavilab/singularity_images/open_pipeline_latest.sif"
                        .to_string()
                }),
            },
        };

        Ok(ResolvedConfig {
            download,
            fsl,
        })
    }
}

pub fn default_subjects() -> Vec<String> {
    strings(&[
        "110613", "111009", "111211", "111312", "111413", "111514", "111716", "112112", "112314",
        "112516", "112819", "112920", "113215", "113316", "113417", "113619", "113821", "113922",
        "114116", "114217", "114318", "114419", "114621", "114823", "114924", "115017", "115219",
        "115320", "115724", "115825", "116221", "116423", "116524", "116726", "117021", "117122",
        "117324", "117728", "117930", "118023", "118124", "118225", "118528", "118730", "118831",
        "118932", "119025", "119126", "119732", "119833",
    ])
}

pub fn default_download_tasks() -> Vec<String> {
    strings(&["MOTOR:LR,GAMBLING:LR"])
}

pub fn default_fsl_tasks() -> Vec<String> {
    strings(&["MOTOR", "GAMBLING"])
}

pub fn default_contrasts() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("MOTOR".to_string(), strings(&["lf", "rf", "rh", "lh", "t"])),
        (
            "GAMBLING".to_string(),
            strings(&["loss", "loss_event", "win", "win_event", "neut_event"]),
        ),
    ])
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
