//! `ESpec` string block

/// `ESpec` table: null-terminated encoding specification strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ESpecTable {
    /// Specification strings in block order
    pub entries: Vec<String>,
}

impl ESpecTable {
    /// Parse the block; an unterminated last string is kept
    pub fn parse(data: &[u8]) -> Self {
        let entries = data
            .split(|&b| b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect();
        Self { entries }
    }

    /// Serialise the block
    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for spec in &self.entries {
            data.extend_from_slice(spec.as_bytes());
            data.push(0);
        }
        data
    }

    /// `ESpec` string by index
    pub fn get(&self, index: u32) -> Option<&str> {
        self.entries.get(index as usize).map(String::as_str)
    }

    /// Index of `spec`, adding it when new
    pub fn intern(&mut self, spec: &str) -> u32 {
        if let Some(pos) = self.entries.iter().position(|e| e == spec) {
            return pos as u32;
        }
        self.entries.push(spec.to_string());
        (self.entries.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_build() {
        let table = ESpecTable::parse(b"n\0z\0b:{256K*=z}\0");
        assert_eq!(table.entries, vec!["n", "z", "b:{256K*=z}"]);
        assert_eq!(table.get(2), Some("b:{256K*=z}"));
        assert_eq!(table.get(3), None);
        assert_eq!(table.build(), b"n\0z\0b:{256K*=z}\0");
    }

    #[test]
    fn test_unterminated_tail() {
        assert_eq!(ESpecTable::parse(b"n\0z").entries, vec!["n", "z"]);
    }

    #[test]
    fn test_intern_reuses() {
        let mut table = ESpecTable::default();
        assert_eq!(table.intern("z"), 0);
        assert_eq!(table.intern("n"), 1);
        assert_eq!(table.intern("z"), 0);
    }
}
