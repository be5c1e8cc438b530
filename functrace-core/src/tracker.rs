//! Text contract with the Swift timing collector
//!
//! The marker, the injected statements, and the trailer layout are read back
//! by later runs over the same tree. Changing any of them breaks idempotence
//! against files that were instrumented before the change.

use crate::error::{InstrumentError, InstrumentResult};
use std::path::PathBuf;

/// Sentinel comment proving a file was already instrumented
pub const MARKER: &str = "// Starming DevTools Function Tracker";

/// Collector source bundled with the library
const EMBEDDED_BOILERPLATE: &str = include_str!("../resources/TimeTrackerFunctionCostCode.swift");

/// The three statements injected after a declaration line, newline-terminated
pub fn injected_statements(function_name: &str, file_name: &str) -> String {
    format!(
        "let tracker = TimeTrackerFunctionCost()\n\
         tracker.start()\n\
         defer {{ tracker.stop(functionName: \"{}\", file:\"{}\") }}\n",
        function_name, file_name
    )
}

/// Block appended to a file that contains the program entry point
pub fn trailer(boilerplate: &str) -> String {
    format!("\n{}\n{}", MARKER, boilerplate)
}

/// Where the trailer boilerplate comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Boilerplate {
    /// Collector source compiled into the library
    #[default]
    Embedded,
    /// Collector source read from disk at trailer time
    File(PathBuf),
    /// Never append a trailer
    Disabled,
}

impl Boilerplate {
    /// Load the boilerplate text
    ///
    /// Returns `Ok(None)` when trailers are disabled and `ResourceMissing`
    /// when a configured file cannot be read.
    pub fn load(&self) -> InstrumentResult<Option<String>> {
        match self {
            Boilerplate::Embedded => Ok(Some(EMBEDDED_BOILERPLATE.to_string())),
            Boilerplate::File(path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|source| InstrumentError::ResourceMissing {
                    path: path.clone(),
                    source,
                }),
            Boilerplate::Disabled => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_statements_text() {
        assert_eq!(
            injected_statements("doWork", "Worker.swift"),
            "let tracker = TimeTrackerFunctionCost()\n\
             tracker.start()\n\
             defer { tracker.stop(functionName: \"doWork\", file:\"Worker.swift\") }\n"
        );
    }

    #[test]
    fn test_trailer_starts_with_marker_line() {
        let block = trailer("class X {}\n");
        assert_eq!(block, format!("\n{}\nclass X {{}}\n", MARKER));
    }

    #[test]
    fn test_embedded_boilerplate_defines_collector() {
        let code = Boilerplate::Embedded.load().unwrap().unwrap();
        assert!(code.contains("class TimeTrackerFunctionCost"));
        assert!(!code.contains(MARKER), "collector source must not contain the marker");
    }

    #[test]
    fn test_disabled_boilerplate() {
        assert_eq!(Boilerplate::Disabled.load().unwrap(), None);
    }

    #[test]
    fn test_missing_boilerplate_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Boilerplate::File(dir.path().join("absent.swift")).load();
        assert!(matches!(
            result,
            Err(InstrumentError::ResourceMissing { .. })
        ));
    }

    #[test]
    fn test_boilerplate_file_loaded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.swift");
        std::fs::write(&path, "// collector\n").unwrap();
        assert_eq!(
            Boilerplate::File(path).load().unwrap(),
            Some("// collector\n".to_string())
        );
    }
}
