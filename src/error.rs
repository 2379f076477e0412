use custom_error::custom_error;

// Errors raised by the HMAS tools.  Configuration and format errors are fatal for the item being
// processed, tool errors are fatal for the invocation.  Missing mapping data is never an error and
// is only logged as a warning by the caller.
custom_error! {pub HmasError
    Configuration{path: String, reason: String} = "Configuration error for {path}: {reason}",
    InvalidSetting{name: String, value: String, range: String} = "Invalid value {value} for {name}, expected a value within {range}",
    Format{file: String, line: usize, reason: String} = "Format error in {file} at line {line}: {reason}",
    EmptyInput{path: String} = "{path} is empty.  The raw reads are most likely bad or no sequence passed the abundance filter",
    ToolNotFound{tool: String} = "{tool} not found on PATH.  Make sure it is installed and executable",
    ToolExecution{tool: String, status: String, output: String} = "{tool} could not be executed ({status}):\n{output}",
    BatchFailed{failed: usize, total: usize, folders: String} = "{failed} of {total} sample folders failed: {folders}",
}

impl HmasError {
    /// Creates a configuration error for a path
    pub fn configuration(path: &str, reason: &str) -> Self {
        HmasError::Configuration {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a format error for a line within a file.  Lines are counted from 1
    pub fn format(file: &str, line: usize, reason: impl Into<String>) -> Self {
        HmasError::Format {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }
}
