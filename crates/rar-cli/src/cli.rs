//! Command definition and argument extraction

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rar_core::RarConfig;
use std::path::PathBuf;

/// Build the `rar` command
pub(crate) fn build_cli() -> Command {
    Command::new("rar")
        .version(rar_core::VERSION)
        .about("Risk assessment report enrichment for URS workbooks")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Enrich every requirement of a URS workbook and export the report")
                .arg(
                    Arg::new("urs")
                        .long("urs")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("URS workbook (.xlsx)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .default_value("rar_config.json")
                        .value_parser(value_parser!(PathBuf))
                        .help("Config file (.json or .toml)"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize))
                        .help("Process only the first N requirements (0 = all)"),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_parser(value_parser!(usize))
                        .help("Maximum simultaneous classifier calls"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .value_parser(value_parser!(u64))
                        .help("Deadline for the whole batch in seconds"),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for the JSON, CSV and XLSX reports"),
                ),
        )
        .subcommand(Command::new("matrix").about("Print the risk level and risk priority tables"))
}

/// Arguments of `rar analyze`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnalyzeArgs {
    pub(crate) urs: PathBuf,
    pub(crate) config: PathBuf,
    pub(crate) limit: Option<usize>,
    pub(crate) concurrency: Option<usize>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) output_dir: Option<PathBuf>,
}

impl AnalyzeArgs {
    pub(crate) fn from_matches(args: &ArgMatches) -> Result<Self> {
        Ok(Self {
            urs: args
                .get_one::<PathBuf>("urs")
                .cloned()
                .context("--urs is required")?,
            config: args
                .get_one::<PathBuf>("config")
                .cloned()
                .context("--config has no value")?,
            limit: args.get_one::<usize>("limit").copied(),
            concurrency: args.get_one::<usize>("concurrency").copied(),
            timeout_secs: args.get_one::<u64>("timeout-secs").copied(),
            output_dir: args.get_one::<PathBuf>("output-dir").cloned(),
        })
    }

    /// Read the config file, layer the flags on top, then validate once
    pub(crate) fn resolve_config(&self) -> Result<RarConfig> {
        let mut config = RarConfig::read(&self.config)
            .with_context(|| format!("loading config {}", self.config.display()))?;
        self.apply_overrides(&mut config);
        config.validate().context("invalid run parameters")?;
        Ok(config)
    }

    /// Flags win over file values
    pub(crate) fn apply_overrides(&self, config: &mut RarConfig) {
        if let Some(limit) = self.limit {
            config.pipeline.limit = limit;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency.max_concurrent_requests = concurrency;
        }
        if let Some(timeout) = self.timeout_secs {
            config.pipeline.timeout_secs = timeout;
        }
        if let Some(dir) = &self.output_dir {
            config.output.path.clone_from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(argv: &[&str]) -> AnalyzeArgs {
        let matches = build_cli().try_get_matches_from(argv).unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "analyze");
        AnalyzeArgs::from_matches(sub).unwrap()
    }

    fn config() -> RarConfig {
        RarConfig::from_json(
            r#"{"api":{"key":"k","baseUrl":"http://localhost/v1","modelName":"m"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn analyze_defaults() {
        let args = analyze(&["rar", "analyze", "--urs", "urs.xlsx"]);
        assert_eq!(args.urs, PathBuf::from("urs.xlsx"));
        assert_eq!(args.config, PathBuf::from("rar_config.json"));
        assert_eq!(args.limit, None);

        let mut config = config();
        let before = config.clone();
        args.apply_overrides(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn flags_override_file_values() {
        let args = analyze(&[
            "rar",
            "analyze",
            "--urs",
            "urs.xlsx",
            "--config",
            "cfg.toml",
            "--limit",
            "10",
            "--concurrency",
            "2",
            "--timeout-secs",
            "30",
            "--output-dir",
            "out",
        ]);

        let mut config = config();
        args.apply_overrides(&mut config);

        assert_eq!(config.pipeline.limit, 10);
        assert_eq!(config.concurrency.max_concurrent_requests, 2);
        assert_eq!(config.pipeline.timeout_secs, 30);
        assert_eq!(config.output.path, PathBuf::from("out"));
    }

    #[test]
    fn flags_rescue_zero_values_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        std::fs::write(
            &path,
            r#"
[api]
baseUrl = "http://localhost/v1"
modelName = "m"

[concurrency]
maxConcurrentRequests = 0

[pipeline]
timeoutSecs = 0
limit = 0
"#,
        )
        .unwrap();
        let config_arg = path.to_str().unwrap();

        let bare = analyze(&["rar", "analyze", "--urs", "u.xlsx", "--config", config_arg]);
        let err = bare.resolve_config().unwrap_err();
        assert!(format!("{err:#}").contains("invalid run parameters"));

        let args = analyze(&[
            "rar",
            "analyze",
            "--urs",
            "u.xlsx",
            "--config",
            config_arg,
            "--concurrency",
            "4",
            "--timeout-secs",
            "30",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.pipeline_config().concurrency, 4);
        assert_eq!(config.pipeline.timeout_secs, 30);
    }

    #[test]
    fn oversized_concurrency_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"api":{"baseUrl":"http://localhost/v1","modelName":"m"}}"#)
            .unwrap();
        let huge = usize::MAX.to_string();

        let args = analyze(&[
            "rar",
            "analyze",
            "--urs",
            "u.xlsx",
            "--config",
            path.to_str().unwrap(),
            "--concurrency",
            huge.as_str(),
        ]);
        let err = args.resolve_config().unwrap_err();
        assert!(format!("{err:#}").contains("concurrency.maxConcurrentRequests"));
    }

    #[test]
    fn example_config_is_valid() {
        let config =
            RarConfig::from_toml(include_str!("../../../rar_config.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline_config().concurrency, 5);
    }

    #[test]
    fn urs_is_required() {
        assert!(build_cli().try_get_matches_from(["rar", "analyze"]).is_err());
    }

    #[test]
    fn non_numeric_limit_is_rejected() {
        assert!(build_cli()
            .try_get_matches_from(["rar", "analyze", "--urs", "u.xlsx", "--limit", "many"])
            .is_err());
    }
}
