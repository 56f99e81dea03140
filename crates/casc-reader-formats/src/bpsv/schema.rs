use crate::bpsv::types::{BpsvError, BpsvField, BpsvResult};
use std::collections::HashMap;

/// Column layout of a BPSV table
#[derive(Debug, Clone)]
pub struct BpsvSchema {
    fields: Vec<BpsvField>,
    field_map: HashMap<String, usize>,
}

impl BpsvSchema {
    /// Create a schema from fields
    #[must_use]
    pub fn new(fields: Vec<BpsvField>) -> Self {
        let mut field_map = HashMap::new();
        for (index, field) in fields.iter().enumerate() {
            field_map.entry(field.name.clone()).or_insert(index);
        }
        Self { fields, field_map }
    }

    /// Parse the header line
    pub fn parse(header: &str) -> BpsvResult<Self> {
        let fields: Vec<BpsvField> = header.split('|').map(BpsvField::parse).collect();
        if fields.iter().all(|f| f.name.is_empty()) {
            return Err(BpsvError::InvalidHeader(header.to_string()));
        }
        Ok(Self::new(fields))
    }

    /// Number of columns
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Column index by name, exact match first, then ASCII case-insensitive
    #[must_use]
    pub fn get_field_index(&self, name: &str) -> Option<usize> {
        self.field_map.get(name).copied().or_else(|| {
            self.fields
                .iter()
                .position(|f| f.name.eq_ignore_ascii_case(name))
        })
    }

    /// Columns in order
    #[must_use]
    pub fn fields(&self) -> &[BpsvField] {
        &self.fields
    }
}
