use serde_json::Value;

use crate::document::Document;

/// A conjunction of exact-match and set-membership predicates. This is the
/// "filter sub-spec" spec §4.2 describes for pre-filtered vector search and
/// `find_one_and_update`/`update_one` targeting.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    eq: Vec<(String, Value)>,
    ne: Vec<(String, Value)>,
    in_set: Vec<(String, Vec<Value>)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((field.into(), value.into()));
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ne.push((field.into(), value.into()));
        self
    }

    pub fn in_set(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.in_set.push((field.into(), values));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.eq
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
            && self
                .ne
                .iter()
                .all(|(field, value)| doc.get(field) != Some(value))
            && self
                .in_set
                .iter()
                .all(|(field, values)| doc.get(field).is_some_and(|v| values.contains(v)))
    }

    /// Fields this filter pins to an exact value — used by `find_one_and_update`
    /// to seed a freshly-upserted document's identity fields.
    pub fn eq_fields(&self) -> &[(String, Value)] {
        &self.eq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_and_in_set_compose_as_conjunction() {
        let mut doc = Document::new(uuid::Uuid::nil());
        doc.set("project", Value::from("P"));
        doc.set("status", Value::from("active"));

        let filter = Filter::new()
            .eq("project", "P")
            .in_set("status", vec![Value::from("active"), Value::from("blocked")]);
        assert!(filter.matches(&doc));

        let filter = Filter::new().eq("project", "Q");
        assert!(!filter.matches(&doc));
    }
}
