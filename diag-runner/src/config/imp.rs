// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{FakeControllerConfig, PolicyConfig, RunnerConfig};
use crate::{
    controller::FakeDelay,
    errors::{ConfigParseError, ConfigParseErrorKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Handles warnings produced while loading configuration.
pub trait ConfigWarnings {
    /// Called with the unknown keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

/// Logs configuration warnings through `tracing`.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push_str("\n  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

/// Overall diagnostics configuration.
///
/// Built from three layers, lowest priority first: the embedded
/// [default config](Self::DEFAULT_CONFIG), a config file, and `DIAG_`-prefixed environment
/// variables.
#[derive(Clone, Debug)]
pub struct DiagConfig {
    config_file: Option<Utf8PathBuf>,
    inner: DiagConfigDeserialize,
}

impl DiagConfig {
    /// The relative path to the config file, from the directory diagnostics are run in.
    pub const CONFIG_PATH: &'static str = ".config/diagnostics.toml";

    /// The default config as a TOML file.
    ///
    /// User configuration is layered on top of this.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Environment overrides use this prefix, plus a `_`.
    pub const ENVIRONMENT_PREFIX: &'static str = "DIAG";

    /// Environment variable suffixes and the config keys they override.
    pub const ENVIRONMENT_OVERRIDES: &'static [(&'static str, &'static str)] = &[
        ("ROUTINE_RUNTIME", "runner.routine-runtime"),
        ("POWER_ROUTINE_RUNTIME", "runner.power-routine-runtime"),
        ("NETWORK", "policy.network"),
        ("FAKE_DELAY", "fake-controller.delay"),
    ];

    /// Reads the config from `config_file`, or if not specified from
    /// [`CONFIG_PATH`](Self::CONFIG_PATH) under `root` if it exists.
    pub fn from_sources(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(root, config_file, &mut DefaultConfigWarnings)
    }

    /// Reads the config with custom warning handling.
    pub fn from_sources_with_warnings(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(root, config_file, |name| std::env::var(name).ok(), warnings)
    }

    /// Returns the default config, with no file or environment layers.
    pub fn default_config() -> Self {
        let (inner, unknown) = build_and_deserialize_config(&make_default_config())
            .unwrap_or_else(|kind| panic!("default config is always valid: {kind}"));
        // The default config is shipped with the binary, so it must not contain unknown keys.
        assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {unknown:?}"
        );
        Self {
            config_file: None,
            inner,
        }
    }

    /// The config file that was read, if any.
    pub fn config_file(&self) -> Option<&Utf8Path> {
        self.config_file.as_deref()
    }

    /// The `[runner]` settings.
    pub fn runner(&self) -> &RunnerConfig {
        &self.inner.runner
    }

    /// The `[policy]` settings.
    pub fn policy(&self) -> &PolicyConfig {
        &self.inner.policy
    }

    /// The `[fake-controller]` settings.
    pub fn fake_controller(&self) -> &FakeControllerConfig {
        &self.inner.fake_controller
    }

    // A custom environment lookup can be passed in while testing.
    fn from_sources_impl(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        env: impl Fn(&str) -> Option<String>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };
        let file_exists = config_file.exists();

        // Deserialize the file on top of the defaults first, so that errors and unknown keys are
        // attributed to it.
        let mut builder = make_default_config().add_source(source);
        let (_, unknown) = build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(Some(config_file.clone()), kind))?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &unknown);
        }

        for &(suffix, key) in Self::ENVIRONMENT_OVERRIDES {
            let name = format!("{}_{suffix}", Self::ENVIRONMENT_PREFIX);
            builder = builder
                .set_override_option(key, env(&name))
                .map_err(|error| {
                    ConfigParseError::new(None, ConfigParseErrorKind::BuildError(Box::new(error)))
                })?;
        }

        // Errors past this point can only come from the environment.
        let (inner, _unknown) =
            build_and_deserialize_config(&builder).map_err(|kind| ConfigParseError::new(None, kind))?;

        let config_file = file_exists.then_some(config_file);
        inner
            .validate()
            .map_err(|kind| ConfigParseError::new(config_file.clone(), kind))?;
        Ok(Self { config_file, inner })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DiagConfigDeserialize {
    runner: RunnerConfig,
    policy: PolicyConfig,
    fake_controller: FakeControllerConfig,
}

impl DiagConfigDeserialize {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if let Some(group) = self
            .policy
            .groups
            .iter()
            .find(|group| group.routines.is_empty())
        {
            return Err(ConfigParseErrorKind::EmptyGroup {
                group_name: group.name.clone(),
            });
        }
        if self.fake_controller.delay == FakeDelay::Manual {
            return Err(ConfigParseErrorKind::ManualDelay);
        }
        Ok(())
    }
}

fn make_default_config() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(DiagConfig::DEFAULT_CONFIG, FileFormat::Toml))
}

fn build_and_deserialize_config(
    builder: &ConfigBuilder<DefaultState>,
) -> Result<(DiagConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
    let config = builder
        .build_cloned()
        .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

    let mut ignored = BTreeSet::new();
    let mut cb = |path: serde_ignored::Path| {
        ignored.insert(path.to_string());
    };
    let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
    let config: DiagConfigDeserialize =
        serde_path_to_error::deserialize(ignored_de).map_err(|error| {
            // The config crate also reports the key; drop it so the path is only shown once.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })?;

    Ok((config, ignored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::NetworkType,
        routine::{PowerRoutineResult, RoutineType, StandardRoutineResult},
        config::ConfiguredResult,
    };
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::{collections::HashMap, time::Duration};

    #[derive(Default)]
    struct CollectWarnings {
        unknown: Vec<(Utf8PathBuf, BTreeSet<String>)>,
    }

    impl ConfigWarnings for CollectWarnings {
        fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
            self.unknown.push((config_file.to_owned(), unknown.clone()));
        }
    }

    fn temp_root(config_contents: Option<&str>) -> Utf8TempDir {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        if let Some(contents) = config_contents {
            let path = dir.path().join(DiagConfig::CONFIG_PATH);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();
        }
        dir
    }

    fn load(
        root: &Utf8Path,
        env: &[(&str, &str)],
        warnings: &mut CollectWarnings,
    ) -> Result<DiagConfig, ConfigParseError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        DiagConfig::from_sources_impl(root, None, |name| env.get(name).cloned(), warnings)
    }

    #[test]
    fn default_config_is_valid() {
        let config = DiagConfig::default_config();
        assert_eq!(config.runner().routine_runtime, Duration::from_secs(60));
        assert_eq!(config.runner().power_routine_runtime, Duration::from_secs(30));
        assert_eq!(config.policy().network, NetworkType::Wifi);
        assert!(config.policy().groups.is_empty());
        assert_eq!(config.fake_controller().delay, FakeDelay::Immediate);
        assert_eq!(config.fake_controller().supported_routines, None);
        assert!(config.fake_controller().results.is_empty());
        assert_eq!(config.config_file(), None);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let root = temp_root(None);
        let mut warnings = CollectWarnings::default();
        let config = load(root.path(), &[], &mut warnings).unwrap();
        assert_eq!(config.config_file(), None);
        assert_eq!(config.policy().network, NetworkType::Wifi);
        assert!(warnings.unknown.is_empty());
    }

    #[test]
    fn file_layered_over_defaults() {
        let root = temp_root(Some(indoc! {r#"
            [runner]
            routine-runtime = "20m"

            [policy]
            network = "ethernet"

            [fake-controller]
            delay = "250ms"
            supported-routines = ["memory", "battery-charge"]

            [fake-controller.results]
            memory = "failed"
            battery-charge = { simple-result = "passed", is-charging = true, percent-delta = 5, time-delta-seconds = 60 }
        "#}));
        let mut warnings = CollectWarnings::default();
        let config = load(root.path(), &[], &mut warnings).unwrap();

        assert_eq!(
            config.config_file(),
            Some(root.path().join(DiagConfig::CONFIG_PATH).as_path())
        );
        assert_eq!(config.runner().routine_runtime, Duration::from_secs(20 * 60));
        // Not overridden.
        assert_eq!(config.runner().power_routine_runtime, Duration::from_secs(30));
        assert_eq!(config.policy().network, NetworkType::Ethernet);

        let fake = config.fake_controller();
        assert_eq!(fake.delay, FakeDelay::After(Duration::from_millis(250)));
        assert_eq!(
            fake.supported_routines,
            Some(vec![RoutineType::Memory, RoutineType::BatteryCharge])
        );
        assert_eq!(
            fake.results.get(&RoutineType::Memory),
            Some(&ConfiguredResult::Standard(StandardRoutineResult::Failed))
        );
        assert_eq!(
            fake.results.get(&RoutineType::BatteryCharge),
            Some(&ConfiguredResult::Power(PowerRoutineResult {
                simple_result: StandardRoutineResult::Passed,
                is_charging: true,
                percent_delta: 5,
                time_delta_seconds: 60,
            }))
        );
    }

    #[test]
    fn environment_overrides_file() {
        let root = temp_root(Some(indoc! {r#"
            [policy]
            network = "ethernet"
        "#}));
        let mut warnings = CollectWarnings::default();
        let config = load(
            root.path(),
            &[("DIAG_NETWORK", "cellular"), ("DIAG_ROUTINE_RUNTIME", "5m")],
            &mut warnings,
        )
        .unwrap();
        assert_eq!(config.policy().network, NetworkType::Cellular);
        assert_eq!(config.runner().routine_runtime, Duration::from_secs(300));
    }

    #[test]
    fn unknown_keys_are_reported() {
        let root = temp_root(Some(indoc! {r#"
            [runner]
            routine-runtime = "2m"
            retries = 3

            [colors]
            enabled = true
        "#}));
        let mut warnings = CollectWarnings::default();
        load(root.path(), &[], &mut warnings).unwrap();

        assert_eq!(warnings.unknown.len(), 1);
        let (file, keys) = &warnings.unknown[0];
        assert_eq!(file, &root.path().join(DiagConfig::CONFIG_PATH));
        assert_eq!(
            keys,
            &BTreeSet::from(["colors".to_owned(), "runner.retries".to_owned()])
        );
    }

    #[test]
    fn invalid_value_names_file_and_key() {
        let root = temp_root(Some(indoc! {r#"
            [policy]
            network = "token-ring"
        "#}));
        let mut warnings = CollectWarnings::default();
        let err = load(root.path(), &[], &mut warnings).unwrap_err();

        assert_eq!(
            err.config_file(),
            Some(&root.path().join(DiagConfig::CONFIG_PATH))
        );
        match err.kind() {
            ConfigParseErrorKind::DeserializeError(error) => {
                assert_eq!(error.path().to_string(), "policy.network");
            }
            other => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn empty_group_is_rejected() {
        let root = temp_root(Some(indoc! {r#"
            [[policy.groups]]
            name = "nothing"
            routines = []
        "#}));
        let mut warnings = CollectWarnings::default();
        let err = load(root.path(), &[], &mut warnings).unwrap_err();
        assert!(
            matches!(
                err.kind(),
                ConfigParseErrorKind::EmptyGroup { group_name } if group_name == "nothing"
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn manual_delay_is_rejected() {
        let root = temp_root(None);
        let mut warnings = CollectWarnings::default();
        let err = load(root.path(), &[("DIAG_FAKE_DELAY", "manual")], &mut warnings).unwrap_err();
        assert!(matches!(err.kind(), ConfigParseErrorKind::ManualDelay));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let root = temp_root(None);
        let missing = root.path().join("missing.toml");
        let err = DiagConfig::from_sources_impl(
            root.path(),
            Some(&missing),
            |_| None,
            &mut CollectWarnings::default(),
        )
        .unwrap_err();
        assert_eq!(err.config_file(), Some(&missing));
        assert!(matches!(err.kind(), ConfigParseErrorKind::BuildError(_)));
    }
}
