/// Classification of a manifest dependency specifier by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// `file:` prefix or a relative/absolute path.
    Local(String),
    /// `git:` — reserved, currently unsupported.
    Git(String),
    /// `github:` — reserved, currently unsupported.
    Github(String),
    /// `jsr:` — reserved, currently unsupported.
    Jsr(String),
    /// `npm:<alias>[@<range>]` — install another package under this name.
    NpmAlias { name: String, spec: String },
    /// Anything else: a semver range or a distribution tag.
    RangeOrTag(String),
}

impl Specifier {
    pub fn parse(spec: &str) -> Specifier {
        if let Some(path) = spec.strip_prefix("file:") {
            return Specifier::Local(path.to_string());
        }
        if spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/') {
            return Specifier::Local(spec.to_string());
        }
        if let Some(rest) = spec.strip_prefix("git:") {
            return Specifier::Git(rest.to_string());
        }
        if let Some(rest) = spec.strip_prefix("github:") {
            return Specifier::Github(rest.to_string());
        }
        if let Some(rest) = spec.strip_prefix("jsr:") {
            return Specifier::Jsr(rest.to_string());
        }
        if let Some(alias) = spec.strip_prefix("npm:") {
            let (name, version) = split_package_spec(alias);
            return Specifier::NpmAlias {
                name: name.to_string(),
                spec: version.unwrap_or("latest").to_string(),
            };
        }
        Specifier::RangeOrTag(spec.to_string())
    }
}

/// Split `name[@version]` at the last `@`. Scoped packages start with `@`,
/// so an `@` at index 0 never splits.
pub fn split_package_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rfind('@') {
        Some(index) if index > 0 => (&spec[..index], Some(&spec[index + 1..])),
        _ => (spec, None),
    }
}
