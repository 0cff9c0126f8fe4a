use super::TabularError;
use serde_json::{Map, Value};

/// Inferred column type, labelled the way dataframe libraries print them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl DType {
    pub fn label(&self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Object => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int64 | DType::Float64)
    }
}

/// Row-oriented table built from a JSON record list
///
/// Records are kept verbatim so `head` and cleaned output echo exactly what
/// the caller sent. A key that is absent from a record, or present with
/// `null`, is a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    records: Vec<Map<String, Value>>,
}

impl Frame {
    /// Build a frame, taking the column union in first-seen order
    pub fn from_records(records: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, records }
    }

    /// Build a frame from raw JSON values, which must all be objects
    pub fn from_values(values: &[Value]) -> Result<Self, TabularError> {
        let records = values
            .iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(map) => Ok(map.clone()),
                other => Err(TabularError::InvalidData(format!(
                    "record {index} is not an object: {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_records(records))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Map<String, Value>] {
        &self.records
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cell values of `column`, `None` where the value is missing
    pub fn column(&self, column: &str) -> impl Iterator<Item = Option<&Value>> + '_ {
        let column = column.to_string();
        self.records
            .iter()
            .map(move |record| record.get(&column).filter(|v| !v.is_null()))
    }

    /// Non-missing values of `column`
    pub fn present(&self, column: &str) -> Vec<&Value> {
        self.column(column).flatten().collect()
    }

    /// True when every column has a value in `record`
    pub fn is_complete(&self, record: &Map<String, Value>) -> bool {
        self.columns
            .iter()
            .all(|column| record.get(column).is_some_and(|v| !v.is_null()))
    }

    /// First `n` records, verbatim
    pub fn head(&self, n: usize) -> Vec<Value> {
        self.records
            .iter()
            .take(n)
            .cloned()
            .map(Value::Object)
            .collect()
    }

    /// Same columns, subset of records
    pub fn filter_records<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(&Map<String, Value>) -> bool,
    {
        Frame {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Infer the dtype of one column
    pub fn dtype(&self, column: &str) -> DType {
        let mut any_missing = false;
        let mut present = Vec::new();
        for value in self.column(column) {
            match value {
                Some(v) => present.push(v),
                None => any_missing = true,
            }
        }

        if present.is_empty() {
            return DType::Object;
        }

        if present.iter().all(|v| v.is_number()) {
            let all_integers = present.iter().all(|v| v.is_i64() || v.is_u64());
            return if all_integers && !any_missing {
                DType::Int64
            } else {
                DType::Float64
            };
        }

        if present.iter().all(|v| v.is_boolean()) && !any_missing {
            return DType::Bool;
        }

        DType::Object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: Value) -> Frame {
        Frame::from_values(value.as_array().unwrap()).unwrap()
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let f = frame(json!([{"b": 1, "a": 2}, {"c": 3}, {"a": 4}]));
        assert_eq!(f.column_count(), 3);
        assert_eq!(f.row_count(), 3);
        assert!(f.columns().contains(&"c".to_string()));
        assert_eq!(f.columns().last().unwrap(), "c");
    }

    #[test]
    fn test_non_object_record_rejected() {
        let result = Frame::from_values(&[json!({"a": 1}), json!(5)]);
        assert!(matches!(result, Err(TabularError::InvalidData(msg)) if msg.contains("record 1")));
    }

    #[test]
    fn test_null_and_absent_are_missing() {
        let f = frame(json!([{"a": 1, "b": null}, {"a": 2}]));
        assert_eq!(f.present("b").len(), 0);
        assert!(!f.is_complete(&f.records()[0]));
        assert!(!f.is_complete(&f.records()[1]));
    }

    #[test]
    fn test_dtype_inference() {
        let f = frame(json!([
            {"i": 1, "f": 1.5, "m": 1, "b": true, "s": "x", "n": null, "mix": 1},
            {"i": 2, "f": 2, "m": null, "b": false, "s": "y", "n": null, "mix": "z"}
        ]));
        assert_eq!(f.dtype("i"), DType::Int64);
        assert_eq!(f.dtype("f"), DType::Float64);
        assert_eq!(f.dtype("m"), DType::Float64);
        assert_eq!(f.dtype("b"), DType::Bool);
        assert_eq!(f.dtype("s"), DType::Object);
        assert_eq!(f.dtype("n"), DType::Object);
        assert_eq!(f.dtype("mix"), DType::Object);
    }

    #[test]
    fn test_bool_with_missing_is_object() {
        let f = frame(json!([{"b": true}, {"b": null}]));
        assert_eq!(f.dtype("b"), DType::Object);
    }

    #[test]
    fn test_head_is_verbatim_and_bounded() {
        let f = frame(json!([{"a": 1}, {"a": 2}, {"a": 3}]));
        assert_eq!(f.head(5).len(), 3);
        assert_eq!(f.head(2), vec![json!({"a": 1}), json!({"a": 2})]);
    }
}
