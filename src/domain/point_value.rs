//! Futures point values and symbol root decoding.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Dollar value of a one point move for one contract, keyed by instrument root.
const BUILTIN_POINT_VALUES: &[(&str, f64)] = &[
    // Equity index
    ("ES", 50.0),
    ("MES", 5.0),
    ("NQ", 20.0),
    ("MNQ", 2.0),
    ("YM", 5.0),
    ("MYM", 0.5),
    ("RTY", 50.0),
    ("M2K", 5.0),
    ("EMD", 100.0),
    ("NKD", 5.0),
    // Metals
    ("GC", 100.0),
    ("MGC", 10.0),
    ("SI", 5000.0),
    ("SIL", 1000.0),
    ("HG", 25000.0),
    ("MHG", 2500.0),
    ("PL", 50.0),
    ("PA", 100.0),
    // Energy
    ("CL", 1000.0),
    ("MCL", 100.0),
    ("QM", 500.0),
    ("NG", 10000.0),
    ("QG", 2500.0),
    ("RB", 42000.0),
    ("HO", 42000.0),
    // Rates
    ("ZB", 1000.0),
    ("UB", 1000.0),
    ("ZN", 1000.0),
    ("ZF", 1000.0),
    ("ZT", 2000.0),
    // FX
    ("6E", 125000.0),
    ("M6E", 12500.0),
    ("6J", 12500000.0),
    ("6B", 62500.0),
    ("6A", 100000.0),
    ("6C", 100000.0),
    // Grains and livestock
    ("ZC", 50.0),
    ("ZS", 50.0),
    ("ZW", 50.0),
    ("LE", 400.0),
    ("HE", 400.0),
    // Crypto
    ("BTC", 5.0),
    ("MBT", 0.1),
    ("ETH", 50.0),
    ("MET", 0.1),
];

pub const DEFAULT_POINT_VALUE: f64 = 1.0;

static DEFAULT_TABLE: LazyLock<PointValueTable> = LazyLock::new(PointValueTable::builtin);

/// Last dot-separated segment of a compound symbol (`F.US.MESZ25` -> `MESZ25`).
fn contract_code(symbol: &str) -> &str {
    let symbol = symbol.trim();
    symbol.rsplit('.').next().unwrap_or(symbol)
}

/// Decode the canonical root: last segment, trailing digits removed, then one
/// trailing uppercase month letter removed.
pub fn instrument_root(symbol: &str) -> String {
    let without_year = contract_code(symbol).trim_end_matches(|c: char| c.is_ascii_digit());
    let mut chars = without_year.chars();
    match chars.next_back() {
        Some(c) if c.is_ascii_uppercase() => chars.as_str().to_string(),
        _ => without_year.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointValueTable {
    values: HashMap<String, f64>,
}

impl PointValueTable {
    pub fn builtin() -> Self {
        Self {
            values: BUILTIN_POINT_VALUES
                .iter()
                .map(|(root, value)| (root.to_string(), *value))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Add or replace the point value for a root. Roots are stored uppercase.
    pub fn with_override(mut self, root: &str, value: f64) -> Self {
        self.values.insert(root.trim().to_uppercase(), value);
        self
    }

    pub fn get(&self, root: &str) -> Option<f64> {
        self.values.get(root).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve the point value for a raw symbol, defaulting to 1.
    ///
    /// A bare root with no contract year (`ES`) would lose its last letter to
    /// month-code stripping, so when the decoded root is unknown and the
    /// symbol carried no digits the undecoded segment is tried as well.
    pub fn point_value(&self, symbol: &str) -> f64 {
        let root = instrument_root(symbol);
        if let Some(value) = self.get(&root) {
            return value;
        }

        let code = contract_code(symbol);
        if !code.ends_with(|c: char| c.is_ascii_digit()) {
            if let Some(value) = self.get(code) {
                return value;
            }
        }

        tracing::debug!(symbol, root = %root, "unknown instrument root, using default point value");
        DEFAULT_POINT_VALUE
    }
}

impl Default for PointValueTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Point value from the built-in table.
pub fn point_value(symbol: &str) -> f64 {
    DEFAULT_TABLE.point_value(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_compound_symbol_root() {
        assert_eq!(instrument_root("F.US.MESZ25"), "MES");
        assert_eq!(instrument_root("F.US.EPH26"), "EP");
        assert_eq!(instrument_root("MNQH6"), "MNQ");
        assert_eq!(instrument_root("M2KZ5"), "M2K");
        assert_eq!(instrument_root("6EM25"), "6E");
    }

    #[test]
    fn root_of_empty_symbol_is_empty() {
        assert_eq!(instrument_root(""), "");
        assert_eq!(instrument_root("F.US."), "");
    }

    #[test]
    fn known_roots_resolve_to_table_values() {
        assert_eq!(point_value("F.US.MESZ25"), 5.0);
        assert_eq!(point_value("ESZ5"), 50.0);
        assert_eq!(point_value("F.US.MNQH26"), 2.0);
        assert_eq!(point_value("GCG26"), 100.0);
    }

    #[test]
    fn unknown_root_defaults_to_one() {
        assert_eq!(instrument_root("XYZQ9"), "XYZ");
        assert_eq!(point_value("XYZQ9"), 1.0);
        assert_eq!(point_value(""), 1.0);
    }

    #[test]
    fn bare_root_without_contract_month_resolves() {
        assert_eq!(point_value("ES"), 50.0);
        assert_eq!(point_value("MNQ"), 2.0);
    }

    #[test]
    fn overrides_extend_and_replace() {
        let table = PointValueTable::builtin()
            .with_override("xyz", 12.5)
            .with_override("ES", 55.0);
        assert_eq!(table.point_value("XYZQ9"), 12.5);
        assert_eq!(table.point_value("F.US.ESZ25"), 55.0);
        assert_eq!(table.point_value("MESZ25"), 5.0);
    }

    #[test]
    fn empty_table_always_defaults() {
        let table = PointValueTable::empty();
        assert!(table.is_empty());
        assert_eq!(table.point_value("ESZ5"), DEFAULT_POINT_VALUE);
    }
}
