//! Table layouts declared by each phase

/// Input and checkpoint layout for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseLayout {
    /// Phase name used in logs and diagnostics
    pub name: String,
    /// Join key column, present in both the input and the checkpoint
    pub id_column: String,
    /// Input columns that must exist (besides the id column)
    pub required: Vec<String>,
    /// Input columns loaded when present, `None` otherwise
    pub optional: Vec<String>,
    /// Checkpoint columns after the id column
    pub output: Vec<String>,
}

impl PhaseLayout {
    /// Full checkpoint header: id column first, then output columns
    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.id_column.clone())
            .chain(self.output.iter().cloned())
            .collect()
    }

    /// Required input columns that are absent from `columns`
    pub fn missing_columns(&self, columns: &[String]) -> Vec<String> {
        std::iter::once(&self.id_column)
            .chain(self.required.iter())
            .filter(|c| !columns.iter().any(|have| have == *c))
            .cloned()
            .collect()
    }
}
