use serde_json::{json, Value};

use crate::engine::FileSearchEngine;
use crate::EngineResult;

fn arg_str(args: &[Value], index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or("")
}

fn arg_u64(args: &[Value], index: usize, default: u64) -> u64 {
    args.get(index).and_then(Value::as_u64).unwrap_or(default)
}

fn arg_i64(args: &[Value], index: usize, default: i64) -> i64 {
    args.get(index).and_then(Value::as_i64).unwrap_or(default)
}

/// Route one host command to the engine.
///
/// Arguments are positional. `initializeIndex` rejects a missing or
/// non-string root path; every `search` argument falls back to its default
/// when absent or wrong-typed (empty strings, full size and date ranges).
pub fn dispatch(engine: &FileSearchEngine, command: &str, args: &[Value]) -> EngineResult<Value> {
    match command {
        "initializeIndex" => {
            let root_path = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| "initializeIndex requires a string rootPath argument".to_string())?;
            Ok(json!(engine.initialize_index(root_path)))
        }
        "search" => {
            let results = engine.search(
                arg_str(args, 0),
                arg_str(args, 1),
                arg_u64(args, 2, 0),
                arg_u64(args, 3, u64::MAX),
                arg_i64(args, 4, 0),
                arg_i64(args, 5, i64::MAX),
            );
            serde_json::to_value(results).map_err(|e| e.to_string())
        }
        "updateIndex" => Ok(json!(engine.update_index())),
        "getIndexingStatus" => Ok(json!(engine.indexing_progress())),
        "cancelIndexing" => {
            engine.cancel_indexing();
            Ok(Value::Bool(true))
        }
        other => Err(format!("unknown command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_rejects_missing_or_non_string_root() {
        let engine = FileSearchEngine::new();

        assert!(dispatch(&engine, "initializeIndex", &[]).is_err());
        assert!(dispatch(&engine, "initializeIndex", &[json!(42)]).is_err());
        // A rejected call leaves the engine untouched.
        assert!(!engine.is_indexing());
        assert_eq!(engine.indexing_progress(), 0.0);
    }

    #[test]
    fn search_defaults_apply_for_missing_arguments() {
        let engine = FileSearchEngine::new();

        let result = dispatch(&engine, "search", &[]).unwrap();
        assert_eq!(result, json!([]));

        // Wrong-typed arguments degrade to defaults instead of erroring.
        let result = dispatch(&engine, "search", &[json!(7), json!(false)]).unwrap();
        assert_eq!(result, json!([]));
    }

    #[test]
    fn status_and_cancel_report_their_fixed_shapes() {
        let engine = FileSearchEngine::new();

        let progress = dispatch(&engine, "getIndexingStatus", &[]).unwrap();
        assert_eq!(progress.as_f64(), Some(0.0));

        let cancelled = dispatch(&engine, "cancelIndexing", &[]).unwrap();
        assert_eq!(cancelled, Value::Bool(true));
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let engine = FileSearchEngine::new();
        let err = dispatch(&engine, "rebuildEverything", &[]).unwrap_err();
        assert!(err.contains("rebuildEverything"));
    }
}
