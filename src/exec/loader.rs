//! Loaders turn a resolved entry file into a child process
//!
//! The child always receives the entry path and the serialized bundle as
//! plain arguments; neither is ever spliced into evaluated source.

use std::path::Path;
use tokio::process::Command;

/// Bootstrap evaluated by node: import the entry and call its export with
/// the decoded argument array. Works for CommonJS and ES modules.
const NODE_BOOTSTRAP: &str = r#"const { pathToFileURL } = require('url');
const [entry, bundle] = process.argv.slice(1);
import(pathToFileURL(entry).href)
  .then((mod) => {
    const run = typeof mod.default === 'function' ? mod.default : mod;
    if (typeof run !== 'function') {
      throw new Error(entry + ' does not export a function');
    }
    return run.call(null, JSON.parse(bundle));
  })
  .catch((err) => {
    console.error(err && err.message ? err.message : err);
    process.exit(1);
  });"#;

/// Builds the child process invocation for an entry file
pub trait Loader: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Command that loads `entry` and invokes it with `bundle`
    fn command(&self, entry: &Path, bundle: &str) -> Command;

    /// Human-readable program description for errors
    fn describe(&self, entry: &Path) -> String;
}

/// Runs JavaScript entries through node
#[derive(Debug, Clone)]
pub struct NodeLoader {
    program: String,
}

impl NodeLoader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NodeLoader {
    fn default() -> Self {
        Self::new("node")
    }
}

impl Loader for NodeLoader {
    fn name(&self) -> &'static str {
        "node"
    }

    fn command(&self, entry: &Path, bundle: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-e").arg(NODE_BOOTSTRAP).arg(entry).arg(bundle);
        cmd
    }

    fn describe(&self, entry: &Path) -> String {
        format!("{} {}", self.program, entry.display())
    }
}

/// Executes the entry file directly (native binaries, scripts with a shebang)
#[derive(Debug, Clone, Default)]
pub struct NativeLoader;

impl Loader for NativeLoader {
    fn name(&self) -> &'static str {
        "native"
    }

    fn command(&self, entry: &Path, bundle: &str) -> Command {
        let mut cmd = Command::new(entry);
        cmd.arg(bundle);
        cmd
    }

    fn describe(&self, entry: &Path) -> String {
        entry.display().to_string()
    }
}

/// Pick the loader for an entry file by extension
pub fn loader_for(entry: &Path) -> Box<dyn Loader> {
    match entry.extension().and_then(|e| e.to_str()) {
        Some("js" | "cjs" | "mjs") => Box::new(NodeLoader::default()),
        _ => Box::new(NativeLoader),
    }
}
