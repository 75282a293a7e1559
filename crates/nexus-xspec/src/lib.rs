//! A small configuration language for describing how to reach a peer:
//! `"popen//python=python3//chdir=/tmp//env:FOO=bar"`.
//!
//! The first `//`-separated segment names the connection kind (`popen`,
//! `ssh=host`, `socket=host:port`, ...); everything after it is either a
//! bare flag (`"dont_write_bytecode"`), a `key=value` attribute, or a
//! repeatable `env:NAME=value` pair destined for the peer's environment.
//! Parsing never validates that a given `kind` is one `nexus-group` knows
//! how to dial — that happens when a transport is actually constructed.

mod error;

use std::collections::HashMap;

pub use error::ExecSpecError;

/// A parsed exec spec string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecSpec {
    /// The leading segment's key, e.g. `"popen"`, `"ssh"`, `"socket"`.
    pub kind: String,
    /// The leading segment's value, if it had one (`"ssh=host"` -> `Some("host")`).
    pub kind_value: Option<String>,
    /// `env:NAME=value` pairs, keyed by `NAME`.
    pub env: HashMap<String, String>,
    /// Every other `key=value` or bare `key` attribute, bare keys mapping to `"True"`
    /// to mirror the string-typed attribute bag of the original dynamic-language spec.
    pub attrs: HashMap<String, String>,
}

impl ExecSpec {
    pub fn parse(spec: &str) -> Result<Self, ExecSpecError> {
        let mut parts = spec.split("//");
        let head = parts.next().filter(|s| !s.is_empty()).ok_or(ExecSpecError::Empty)?;

        let (kind, kind_value) = match head.split_once('=') {
            Some((k, v)) => (k.to_string(), Some(v.to_string())),
            None => (head.to_string(), None),
        };

        // The leading segment's key shares the same namespace as every later
        // `key=value`/bare-flag attribute: a later segment repeating it is a
        // duplicate keyword, same as repeating any other attribute twice.
        let mut spec = ExecSpec {
            kind: kind.clone(),
            kind_value,
            env: HashMap::new(),
            attrs: HashMap::new(),
        };
        let mut seen_attrs = vec![kind];

        for segment in parts {
            if segment.is_empty() {
                continue;
            }
            if let Some(rest) = segment.strip_prefix("env:") {
                let (name, value) = rest
                    .split_once('=')
                    .ok_or_else(|| ExecSpecError::MissingEnvName(segment.to_string()))?;
                if spec.env.insert(name.to_string(), value.to_string()).is_some() {
                    return Err(ExecSpecError::DuplicateKey(format!("env:{name}")));
                }
                continue;
            }
            let (key, value) = match segment.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (segment.to_string(), "True".to_string()),
            };
            if seen_attrs.contains(&key) {
                return Err(ExecSpecError::DuplicateKey(key));
            }
            seen_attrs.push(key.clone());
            spec.attrs.insert(key, value);
        }

        Ok(spec)
    }

    /// The `id` attribute, if the spec string named one explicitly. A
    /// `Group` falls back to auto-allocating one when this is absent.
    pub fn id(&self) -> Option<&str> {
        self.attrs.get("id").map(String::as_str)
    }

    pub fn python(&self) -> Option<&str> {
        self.attrs.get("python").map(String::as_str)
    }

    pub fn chdir(&self) -> Option<&str> {
        self.attrs.get("chdir").map(String::as_str)
    }

    pub fn nice(&self) -> Option<i32> {
        self.attrs.get("nice").and_then(|v| v.parse().ok())
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.attrs.get(name).map(String::as_str) == Some("True")
    }
}

impl std::str::FromStr for ExecSpec {
    type Err = ExecSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExecSpec::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_kind() {
        let spec = ExecSpec::parse("popen").unwrap();
        assert_eq!(spec.kind, "popen");
        assert_eq!(spec.kind_value, None);
    }

    #[test]
    fn parses_kind_with_value_and_attrs() {
        let spec = ExecSpec::parse("ssh=example.com//python=python3//chdir=/tmp//nice=10").unwrap();
        assert_eq!(spec.kind, "ssh");
        assert_eq!(spec.kind_value.as_deref(), Some("example.com"));
        assert_eq!(spec.python(), Some("python3"));
        assert_eq!(spec.chdir(), Some("/tmp"));
        assert_eq!(spec.nice(), Some(10));
    }

    #[test]
    fn parses_repeated_env_vars() {
        let spec = ExecSpec::parse("popen//env:FOO=bar//env:BAZ=qux").unwrap();
        assert_eq!(spec.env.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(spec.env.get("BAZ"), Some(&"qux".to_string()));
    }

    #[test]
    fn bare_flag_attribute() {
        let spec = ExecSpec::parse("popen//dont_write_bytecode").unwrap();
        assert!(spec.has_flag("dont_write_bytecode"));
    }

    #[test]
    fn rejects_duplicate_attribute() {
        let err = ExecSpec::parse("popen//chdir=/a//chdir=/b").unwrap_err();
        assert_eq!(err, ExecSpecError::DuplicateKey("chdir".to_string()));
    }

    #[test]
    fn rejects_leading_keyword_repeated_as_bare_flag() {
        let err = ExecSpec::parse("popen//popen").unwrap_err();
        assert_eq!(err, ExecSpecError::DuplicateKey("popen".to_string()));
    }

    #[test]
    fn rejects_leading_keyword_repeated_with_value() {
        let err = ExecSpec::parse("popen//popen=123").unwrap_err();
        assert_eq!(err, ExecSpecError::DuplicateKey("popen".to_string()));
    }

    #[test]
    fn rejects_duplicate_env_var() {
        let err = ExecSpec::parse("popen//env:FOO=a//env:FOO=b").unwrap_err();
        assert_eq!(err, ExecSpecError::DuplicateKey("env:FOO".to_string()));
    }

    #[test]
    fn rejects_empty_spec() {
        assert_eq!(ExecSpec::parse("").unwrap_err(), ExecSpecError::Empty);
    }

    #[test]
    fn ignores_trailing_empty_segments() {
        let spec = ExecSpec::parse("popen//").unwrap();
        assert_eq!(spec.kind, "popen");
        assert!(spec.attrs.is_empty());
    }
}
