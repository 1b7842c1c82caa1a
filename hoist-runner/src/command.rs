//! Composite remote commands
//!
//! A remote operation is one shell command made of several steps. Steps are
//! kept as a list until they are rendered so each one stays inspectable.

use std::fmt;

/// One step of a [`CommandChain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Must succeed, later steps only run if it did
    Required(String),
    /// Failure is acceptable (e.g. removing something that may not exist)
    Tolerant(String),
}

impl Step {
    fn render(&self) -> String {
        match self {
            Step::Required(command) => command.clone(),
            Step::Tolerant(command) => format!("({} || true)", command),
        }
    }
}

/// Ordered shell steps joined with `&&`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandChain {
    steps: Vec<Step>,
}

impl CommandChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step that must succeed
    pub fn then(mut self, command: impl Into<String>) -> Self {
        self.steps.push(Step::Required(command.into()));
        self
    }

    /// Appends a step whose failure is ignored
    pub fn then_tolerant(mut self, command: impl Into<String>) -> Self {
        self.steps.push(Step::Tolerant(command.into()));
        self
    }

    /// Creates `path` (and parents) unless it is already a directory
    pub fn ensure_dir(self, path: &str) -> Self {
        self.then(format!("if [ ! -d {path} ]; then mkdir -p {path}; fi"))
    }

    /// `mkdir -p path`
    pub fn mkdir(self, path: &str) -> Self {
        self.then(format!("mkdir -p {}", path))
    }

    /// `rm -rf path`
    pub fn remove(self, path: &str) -> Self {
        self.then(format!("rm -rf {}", path))
    }

    /// `ln -s target link`
    pub fn symlink(self, target: &str, link: &str) -> Self {
        self.then(format!("ln -s {} {}", target, link))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Renders the single shell command
    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(Step::render)
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

impl fmt::Display for CommandChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_joins_with_and() {
        let chain = CommandChain::new()
            .mkdir("/srv/app/releases/1")
            .remove("/srv/app/current")
            .symlink("/srv/app/releases/1", "/srv/app/current");

        assert_eq!(
            chain.render(),
            "mkdir -p /srv/app/releases/1 && rm -rf /srv/app/current && ln -s /srv/app/releases/1 /srv/app/current"
        );
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_tolerant_step_is_guarded() {
        let chain = CommandChain::new()
            .then_tolerant("rm -rf /srv/app/public/system")
            .then("true");

        assert_eq!(chain.render(), "(rm -rf /srv/app/public/system || true) && true");
    }

    #[test]
    fn test_ensure_dir() {
        let chain = CommandChain::new().ensure_dir("/srv/app/shared/log");
        assert_eq!(
            chain.to_string(),
            "if [ ! -d /srv/app/shared/log ]; then mkdir -p /srv/app/shared/log; fi"
        );
    }

    #[test]
    fn test_empty_chain() {
        let chain = CommandChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.render(), "");
        assert!(!chain.then("true").is_empty());
    }
}
