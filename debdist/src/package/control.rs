//! Rendering `DEBIAN/control`

use debdist_schema::OrderedFields;

use crate::templates::{expand, TemplateVars};

/// Render control fields as `Key: value` lines, in the order they were declared
pub fn render_control<V: TemplateVars + ?Sized>(fields: &OrderedFields, vars: &V) -> String {
    let mut out = String::new();
    for (key, template) in fields.iter() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&expand(template, vars));
        out.push('\n');
    }
    out
}
