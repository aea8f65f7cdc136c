use crate::core::error_host::ConfigurationError;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

pub const KEY_DELIMITER: &str = ":";

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Flat, case-insensitive key/value settings. Hierarchy is expressed with
/// `:` separated keys, e.g. `bus:queue`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn get_value<T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse::<T>().map(Some).map_err(|err| {
            ConfigurationError::InvalidValue(key.to_string(), raw.to_string(), err.to_string())
        })
    }

    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values.insert(normalize_key(key.as_ref()), value.into());
    }

    /// Settings below `prefix`, with the prefix stripped.
    pub fn section(&self, prefix: &str) -> Configuration {
        let prefix = format!("{}{}", normalize_key(prefix), KEY_DELIMITER);
        let values = self
            .values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect();
        Configuration { values }
    }

    /// Copies every setting of `other` over this one.
    pub fn merge(&mut self, other: &Configuration) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

enum ConfigurationSource {
    InMemory(Vec<(String, String)>),
    Environment(Option<Vec<(String, String)>>),
    CommandLine(Vec<String>),
    TomlFile { path: PathBuf, optional: bool },
}

/// Collects configuration sources; later sources override earlier ones.
#[derive(Default)]
pub struct ConfigurationBuilder {
    sources: Vec<ConfigurationSource>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_in_memory<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.sources.push(ConfigurationSource::InMemory(
            values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ));
        self
    }

    /// Process environment, read when [`Self::build`] runs.
    pub fn add_environment_variables(mut self) -> Self {
        self.sources.push(ConfigurationSource::Environment(None));
        self
    }

    pub fn add_environment_variables_from<K, V>(
        mut self,
        variables: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.sources.push(ConfigurationSource::Environment(Some(
            variables
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )));
        self
    }

    pub fn add_command_line<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.sources.push(ConfigurationSource::CommandLine(
            args.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn add_toml_file(mut self, path: impl Into<PathBuf>, optional: bool) -> Self {
        self.sources.push(ConfigurationSource::TomlFile {
            path: path.into(),
            optional,
        });
        self
    }

    pub fn build(self) -> Result<Configuration, ConfigurationError> {
        let mut configuration = Configuration::new();

        for source in self.sources {
            match source {
                ConfigurationSource::InMemory(values) => {
                    for (key, value) in values {
                        configuration.set(key, value);
                    }
                }
                ConfigurationSource::Environment(variables) => {
                    let variables = variables.unwrap_or_else(|| std::env::vars().collect());
                    for (key, value) in variables {
                        configuration.set(key.replace("__", KEY_DELIMITER), value);
                    }
                }
                ConfigurationSource::CommandLine(args) => {
                    for (key, value) in parse_command_line(&args)? {
                        configuration.set(key, value);
                    }
                }
                ConfigurationSource::TomlFile { path, optional } => {
                    load_toml_file(&mut configuration, &path, optional)?;
                }
            }
        }

        Ok(configuration)
    }
}

/// Accepts `key=value`, `--key=value`, `--key value`, `/key=value` and
/// `/key value`. Bare arguments without `=` are ignored.
fn parse_command_line(args: &[String]) -> Result<Vec<(String, String)>, ConfigurationError> {
    let mut pairs = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let (switch, prefixed) = if let Some(rest) = arg.strip_prefix("--") {
            (rest, true)
        } else if let Some(rest) = arg.strip_prefix('/') {
            (rest, true)
        } else {
            (arg.as_str(), false)
        };

        let (key, value) = match switch.split_once('=') {
            Some((key, value)) => (key, value.to_string()),
            None if prefixed => {
                let value = iter
                    .next()
                    .ok_or_else(|| ConfigurationError::MissingValue(arg.clone()))?;
                (switch, value.clone())
            }
            None => continue,
        };

        if key.trim().is_empty() {
            return Err(ConfigurationError::InvalidArgument(arg.clone()));
        }
        pairs.push((key.to_string(), value));
    }

    Ok(pairs)
}

fn load_toml_file(
    configuration: &mut Configuration,
    path: &std::path::Path,
    optional: bool,
) -> Result<(), ConfigurationError> {
    let display = path.display().to_string();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if optional {
                return Ok(());
            }
            return Err(ConfigurationError::FileNotFound(display));
        }
        Err(err) => return Err(ConfigurationError::Io(display, err.to_string())),
    };

    let table = content
        .parse::<toml::Table>()
        .map_err(|err| ConfigurationError::Parse(display, err.to_string()))?;

    for (key, value) in table {
        flatten_toml(configuration, key, value);
    }
    Ok(())
}

fn flatten_toml(configuration: &mut Configuration, key: String, value: toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (child, value) in table {
                flatten_toml(
                    configuration,
                    format!("{}{}{}", key, KEY_DELIMITER, child),
                    value,
                );
            }
        }
        toml::Value::Array(items) => {
            for (index, value) in items.into_iter().enumerate() {
                flatten_toml(
                    configuration,
                    format!("{}{}{}", key, KEY_DELIMITER, index),
                    value,
                );
            }
        }
        toml::Value::String(value) => configuration.set(key, value),
        other => configuration.set(key, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut configuration = Configuration::new();
        configuration.set("Urls", "http://localhost:8080");

        assert_eq!(configuration.get("URLS"), Some("http://localhost:8080"));
        assert_eq!(configuration.get("urls"), Some("http://localhost:8080"));
    }

    #[test]
    fn test_get_value_parses_and_reports_errors() {
        let configuration = ConfigurationBuilder::new()
            .add_in_memory([("port", "8080"), ("workers", "many")])
            .build()
            .unwrap();

        assert_eq!(configuration.get_value::<u16>("port"), Ok(Some(8080)));
        assert_eq!(configuration.get_value::<u16>("missing"), Ok(None));
        assert!(matches!(
            configuration.get_value::<u16>("workers"),
            Err(ConfigurationError::InvalidValue(_, _, _))
        ));
    }

    #[test]
    fn test_command_line_formats() {
        let pairs = parse_command_line(&args(&[
            "a=1",
            "--b=2",
            "--c",
            "3",
            "/d=4",
            "/e",
            "5",
            "positional",
        ]))
        .unwrap();

        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
                ("d".to_string(), "4".to_string()),
                ("e".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_command_line_dangling_switch() {
        assert_eq!(
            parse_command_line(&args(&["--urls"])),
            Err(ConfigurationError::MissingValue("--urls".to_string()))
        );
    }

    #[test]
    fn test_command_line_empty_key() {
        assert_eq!(
            parse_command_line(&args(&["--=oops"])),
            Err(ConfigurationError::InvalidArgument("--=oops".to_string()))
        );
    }

    #[test]
    fn test_later_sources_win() {
        let configuration = ConfigurationBuilder::new()
            .add_in_memory([("urls", "http://localhost:1"), ("name", "svc")])
            .add_environment_variables_from([("URLS", "http://localhost:2")])
            .add_command_line(["--urls", "http://localhost:3"])
            .build()
            .unwrap();

        assert_eq!(configuration.get("urls"), Some("http://localhost:3"));
        assert_eq!(configuration.get("name"), Some("svc"));
    }

    #[test]
    fn test_environment_double_underscore_is_section_delimiter() {
        let configuration = ConfigurationBuilder::new()
            .add_environment_variables_from([("Bus__Queue", "users")])
            .build()
            .unwrap();

        assert_eq!(configuration.get("bus:queue"), Some("users"));
        assert_eq!(configuration.section("BUS").get("queue"), Some("users"));
    }

    #[test]
    fn test_toml_file_is_flattened() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "urls = \"http://127.0.0.1:7000\"\n[bus]\nretries = 3\nqueues = [\"a\", \"b\"]\n[bus.tls]\nenabled = true"
        )
        .unwrap();

        let configuration = ConfigurationBuilder::new()
            .add_toml_file(file.path(), false)
            .build()
            .unwrap();

        assert_eq!(configuration.get("urls"), Some("http://127.0.0.1:7000"));
        assert_eq!(configuration.get_value::<u32>("bus:retries"), Ok(Some(3)));
        assert_eq!(configuration.get("bus:queues:1"), Some("b"));
        assert_eq!(configuration.get("bus:tls:enabled"), Some("true"));
    }

    #[test]
    fn test_missing_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        assert!(
            ConfigurationBuilder::new()
                .add_toml_file(&path, true)
                .build()
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            ConfigurationBuilder::new().add_toml_file(&path, false).build(),
            Err(ConfigurationError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();

        assert!(matches!(
            ConfigurationBuilder::new().add_toml_file(file.path(), false).build(),
            Err(ConfigurationError::Parse(_, _))
        ));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = ConfigurationBuilder::new()
            .add_in_memory([("a", "1"), ("b", "2")])
            .build()
            .unwrap();
        let overrides = ConfigurationBuilder::new()
            .add_in_memory([("B", "3")])
            .build()
            .unwrap();

        base.merge(&overrides);

        assert_eq!(base.iter().collect::<Vec<_>>(), vec![("a", "1"), ("b", "3")]);
        assert_eq!(base.len(), 2);
    }
}
