//! Requirement tokens: `name`, `name[extra]`, `name[a,b]>=1.0`.

use std::fmt;
use std::str::FromStr;

/// A single token that is not a valid requirement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed requirement '{0}'")]
pub struct MalformedRequirement(pub String);

/// One or more package tokens given on the command line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed package name(s) specified: {}", .0.join(", "))]
pub struct MalformedNames(pub Vec<String>);

/// A reference to a distribution, optionally selecting extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    /// Version constraint text following the name, kept verbatim.
    pub specifier: String,
}

impl Requirement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: Vec::new(),
            specifier: String::new(),
        }
    }

    pub fn with_extras(mut self, extras: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extras = extras.into_iter().map(Into::into).collect();
        self
    }

    /// Lookup key shared by every spelling of the same distribution name.
    pub fn key(&self) -> String {
        normalize(&self.name)
    }
}

/// Case-folds a distribution name and unifies `_` with `-`.
pub fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

impl FromStr for Requirement {
    type Err = MalformedRequirement;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let malformed = || MalformedRequirement(token.to_string());

        let name_end = token.find(|c: char| !is_name_char(c)).unwrap_or(token.len());
        let name = &token[..name_end];
        if name.is_empty() {
            return Err(malformed());
        }

        let mut rest = token[name_end..].trim_start();
        let mut extras = Vec::new();
        if let Some(inner) = rest.strip_prefix('[') {
            let close = inner.find(']').ok_or_else(malformed)?;
            for extra in inner[..close].split(',') {
                let extra = extra.trim();
                if extra.is_empty() || !extra.chars().all(is_name_char) {
                    return Err(malformed());
                }
                extras.push(extra.to_string());
            }
            rest = inner[close + 1..].trim();
        }

        if !rest.is_empty() && !rest.starts_with(|c: char| "<>=!~(;".contains(c)) {
            return Err(malformed());
        }

        Ok(Self {
            name: name.to_string(),
            extras,
            specifier: rest.to_string(),
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        write!(f, "{}", self.specifier)
    }
}

/// Parses every token, reporting all malformed ones together.
pub fn parse_requirements<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Requirement>, MalformedNames> {
    let mut parsed = Vec::with_capacity(tokens.len());
    let mut bad = Vec::new();
    for token in tokens {
        match token.as_ref().parse::<Requirement>() {
            Ok(req) => parsed.push(req),
            Err(MalformedRequirement(t)) => bad.push(t),
        }
    }
    if bad.is_empty() {
        Ok(parsed)
    } else {
        Err(MalformedNames(bad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let req: Requirement = "example.package".parse().unwrap();
        assert_eq!(req.name, "example.package");
        assert!(req.extras.is_empty());
        assert_eq!(req.specifier, "");
    }

    #[test]
    fn parses_extras() {
        let req: Requirement = "site[dev, docs]".parse().unwrap();
        assert_eq!(req.name, "site");
        assert_eq!(req.extras, vec!["dev", "docs"]);
        assert_eq!(req.to_string(), "site[dev,docs]");
    }

    #[test]
    fn keeps_version_specifier() {
        let req: Requirement = "cairn>=3.0.0".parse().unwrap();
        assert_eq!(req.name, "cairn");
        assert_eq!(req.specifier, ">=3.0.0");
        assert_eq!(req.to_string(), "cairn>=3.0.0");
    }

    #[test]
    fn rejects_bare_extra() {
        assert_eq!(
            "[dev]".parse::<Requirement>(),
            Err(MalformedRequirement("[dev]".into()))
        );
    }

    #[test]
    fn rejects_unclosed_and_empty_extras() {
        assert!("site[dev".parse::<Requirement>().is_err());
        assert!("site[]".parse::<Requirement>().is_err());
        assert!("site[dev,]".parse::<Requirement>().is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!("site foo".parse::<Requirement>().is_err());
        assert!("".parse::<Requirement>().is_err());
    }

    #[test]
    fn parse_requirements_collects_all_bad_tokens() {
        let err = parse_requirements(&["ok", "[dev]", "also_ok", "[x]"]).unwrap_err();
        assert_eq!(err.0, vec!["[dev]", "[x]"]);
        assert_eq!(
            err.to_string(),
            "malformed package name(s) specified: [dev], [x]"
        );
    }

    #[test]
    fn normalized_keys_match() {
        assert_eq!(Requirement::new("Example_Pkg").key(), "example-pkg");
        assert_eq!(normalize("example-pkg"), "example-pkg");
    }
}
