use crate::bpsv::schema::BpsvSchema;

/// Parsed BPSV table
#[derive(Debug, Clone)]
pub struct BpsvDocument {
    schema: BpsvSchema,
    rows: Vec<Vec<String>>,
    sequence_number: Option<u32>,
}

impl BpsvDocument {
    /// Create an empty document
    #[must_use]
    pub fn new(schema: BpsvSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            sequence_number: None,
        }
    }

    /// Append a row; short rows are padded with empty cells
    pub fn add_row(&mut self, mut values: Vec<String>) {
        if values.len() < self.schema.field_count() {
            values.resize(self.schema.field_count(), String::new());
        }
        self.rows.push(values);
    }

    pub(crate) fn set_sequence_number(&mut self, seqn: u32) {
        self.sequence_number = Some(seqn);
    }

    /// Column layout
    #[must_use]
    pub fn schema(&self) -> &BpsvSchema {
        &self.schema
    }

    /// `## seqn` value, when present
    #[must_use]
    pub fn sequence_number(&self) -> Option<u32> {
        self.sequence_number
    }

    /// Number of data rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Raw cells of row `index`
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell by row index and column name
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.schema.get_field_index(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// Index of the first row whose `column` equals `value`
    #[must_use]
    pub fn find_row(&self, column: &str, value: &str) -> Option<usize> {
        let index = self.schema.get_field_index(column)?;
        self.rows
            .iter()
            .position(|row| row.get(index).is_some_and(|cell| cell == value))
    }
}
