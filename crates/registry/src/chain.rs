use std::fmt;

/// Path through the dependency graph, used to annotate errors.
#[derive(Debug, Clone, Default)]
pub struct DependencyChain(Vec<String>);

impl DependencyChain {
    pub fn new() -> Self {
        DependencyChain(Vec::new())
    }

    /// A new chain extended by one link.
    pub fn with(&self, link: impl Into<String>) -> Self {
        let mut links = self.0.clone();
        links.push(link.into());
        DependencyChain(links)
    }

    /// Prefix an error message with the chain.
    pub fn wrap(&self, error: impl fmt::Display) -> String {
        if self.0.is_empty() {
            error.to_string()
        } else {
            format!("{self}: {error}")
        }
    }
}

impl fmt::Display for DependencyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wrap_prefixes_with_chain() {
        let chain = DependencyChain::new().with("a").with("b").with("c");
        assert_eq!(chain.to_string(), "a -> b -> c");
        assert_eq!(chain.wrap("boom"), "a -> b -> c: boom");
    }

    #[test]
    fn empty_chain_wraps_bare() {
        assert_eq!(DependencyChain::new().wrap("boom"), "boom");
    }

    #[test]
    fn with_does_not_mutate_the_parent() {
        let parent = DependencyChain::new().with("a");
        let child = parent.with("b");
        assert_eq!(parent.to_string(), "a");
        assert_eq!(child.to_string(), "a -> b");
    }
}
