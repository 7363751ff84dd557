//! Command name to package name mapping

use std::collections::BTreeMap;

/// Commands shipped with every trellis build
pub const BUILTIN_COMMANDS: &[(&str, &str)] = &[("init", "@trellis-cli/init")];

/// Which package implements which command.
///
/// Packages are always resolved as `latest`; there is no version pinning here.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: BTreeMap<String, String>,
}

impl CommandRegistry {
    /// Registry with no commands
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in commands
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (command, package) in BUILTIN_COMMANDS {
            registry.register(*command, *package);
        }
        registry
    }

    /// Add configured mappings; they replace built-ins of the same name
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        for (command, package) in overrides {
            self.register(command.as_str(), package.as_str());
        }
        self
    }

    pub fn register(&mut self, command: impl Into<String>, package: impl Into<String>) {
        self.entries.insert(command.into(), package.into());
    }

    /// Package implementing `command`
    pub fn package_for(&self, command: &str) -> Option<&str> {
        self.entries.get(command).map(String::as_str)
    }

    /// All (command, package) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, p)| (c.as_str(), p.as_str()))
    }
}
