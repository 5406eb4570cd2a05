//! Logic for resolving `${NAME}` placeholders
//!
//! Much dumber than a real template language: placeholders
//! we don't have a value for are left exactly as written, so a control field
//! like `Depends: ${shlibs:Depends}` or a literal `${HOME}` in a script body
//! survives untouched.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::SortedMap;

lazy_static! {
    // The whole match is the placeholder including `${` and `}`,
    // group 1 is just the variable name.
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("placeholder regex is valid");
}

/// Something that can answer "what is the value of this variable"
pub trait TemplateVars {
    /// Get the value of a variable, if there is one
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl TemplateVars for SortedMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl TemplateVars for crate::env::AmbientEnv {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.vars().get(name).map(String::as_str)
    }
}

impl TemplateVars for [(&str, &str)] {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }
}

/// Replace every `${NAME}` whose NAME is known with its value
///
/// Unknown placeholders are kept verbatim. Substituted values are not
/// themselves expanded again.
pub fn expand<V: TemplateVars + ?Sized>(text: &str, vars: &V) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match vars.lookup(&caps[1]) {
            Some(value) => value.to_owned(),
            None => caps[0].to_owned(),
        })
        .into_owned()
}
