//! Dispatch commands implemented by packages

use crate::cli::args::InitArgs;
use crate::error::{TrellisError, TrellisResult};
use crate::exec::{ArgumentBundle, Dispatcher};
use serde_json::{Map, Value};

/// Run `trellis init`
pub async fn init(args: InitArgs, dispatcher: &Dispatcher) -> TrellisResult<i32> {
    dispatcher.dispatch("init", &init_bundle(args)).await
}

/// Run a configured command: `trellis <name> [args...]`
pub async fn external(args: Vec<String>, dispatcher: &Dispatcher) -> TrellisResult<i32> {
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| TrellisError::InvalidArguments("missing command name".to_string()))?;
    dispatcher.dispatch(name, &parse_external_args(rest)).await
}

fn init_bundle(args: InitArgs) -> ArgumentBundle {
    let mut options = Map::new();
    options.insert("force".to_string(), Value::Bool(args.force));

    // The project name slot is always present; packages prompt when it is null
    let name = args.project_name.map(Value::String).unwrap_or(Value::Null);
    ArgumentBundle::new(vec![name], options)
}

/// Split raw arguments into positionals and options.
///
/// `--flag` is `true`, `--no-flag` is `false`, `--key=value` is a string and
/// `-x` is `true`. Everything after `--` is positional.
pub fn parse_external_args(args: &[String]) -> ArgumentBundle {
    let mut positional = Vec::new();
    let mut options = Map::new();
    let mut rest = args.iter();

    while let Some(arg) = rest.next() {
        if arg == "--" {
            positional.extend(rest.by_ref().map(|a| Value::String(a.clone())));
            break;
        }

        if let Some(long) = arg.strip_prefix("--") {
            match long.split_once('=') {
                Some((key, value)) => {
                    options.insert(key.to_string(), Value::String(value.to_string()));
                }
                None => match long.strip_prefix("no-") {
                    Some(key) => {
                        options.insert(key.to_string(), Value::Bool(false));
                    }
                    None => {
                        options.insert(long.to_string(), Value::Bool(true));
                    }
                },
            }
        } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
            for flag in short.chars() {
                options.insert(flag.to_string(), Value::Bool(true));
            }
        } else {
            positional.push(Value::String(arg.clone()));
        }
    }

    ArgumentBundle::new(positional, options)
}
