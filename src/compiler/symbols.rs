use ahash::{AHashMap, AHashSet};

/// Python keywords and builtins the generated code must never shadow.
const PYTHON_RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "any", "getattr", "isinstance", "len", "str", "print", "list",
    "dict",
];

/// Hands out identifiers for generated code.
///
/// Each base name has its own counter: the first allocation returns the base
/// unsuffixed, later ones append `1`, `2`, ... in call order. Candidates that
/// are reserved or were already issued under a different base are skipped, so
/// every identifier the table returns is distinct from every other.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    counters: AHashMap<String, u32>,
    issued: AHashSet<String>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            counters: AHashMap::new(),
            issued: AHashSet::new(),
        };
        for name in PYTHON_RESERVED {
            table.reserve(name);
        }
        table
    }

    /// Marks `name` as taken without going through a counter.
    pub fn reserve(&mut self, name: &str) {
        self.issued.insert(name.to_string());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.issued.contains(name)
    }

    pub fn allocate(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        loop {
            let candidate = if *counter == 0 {
                base.to_string()
            } else {
                format!("{}{}", base, counter)
            };
            *counter += 1;
            if self.issued.insert(candidate.clone()) {
                log::trace!("allocated symbol '{}' from base '{}'", candidate, base);
                return candidate;
            }
        }
    }
}

/// Lowercases `label` into a Python identifier: runs of non-alphanumeric
/// characters become one underscore. Returns `None` when nothing usable remains.
pub fn snake_case(label: &str) -> Option<String> {
    let mut out = String::with_capacity(label.len());
    let mut pending_separator = false;
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    if out.is_empty() {
        return None;
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    Some(out)
}

/// `"triage agent"` becomes `TriageAgent`.
pub fn pascal_case(label: &str) -> Option<String> {
    let mut out = String::with_capacity(label.len());
    for word in label.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() {
        return None;
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_ascend_per_base() {
        let mut table = SymbolTable::new();
        let names: Vec<String> = (0..4).map(|_| table.allocate("agent")).collect();
        assert_eq!(names, vec!["agent", "agent1", "agent2", "agent3"]);
    }

    #[test]
    fn bases_count_independently() {
        let mut table = SymbolTable::new();
        assert_eq!(table.allocate("agent"), "agent");
        assert_eq!(table.allocate("agent_result"), "agent_result");
        assert_eq!(table.allocate("agent"), "agent1");
        assert_eq!(table.allocate("agent_result"), "agent_result1");
    }

    #[test]
    fn skips_reserved_and_foreign_names() {
        let mut table = SymbolTable::new();
        table.reserve("workflow");
        assert_eq!(table.allocate("workflow"), "workflow1");

        // "agent1" issued under base "agent" must not be reissued for base "agent1".
        table.allocate("agent");
        table.allocate("agent");
        assert_eq!(table.allocate("agent1"), "agent11");
    }

    #[test]
    fn python_keywords_are_never_issued() {
        let mut table = SymbolTable::new();
        assert_eq!(table.allocate("class"), "class1");
    }

    #[test]
    fn case_conversions() {
        assert_eq!(snake_case("Triage Agent").as_deref(), Some("triage_agent"));
        assert_eq!(snake_case("  My--Agent 2 ").as_deref(), Some("my_agent_2"));
        assert_eq!(snake_case("3rd pass").as_deref(), Some("_3rd_pass"));
        assert_eq!(snake_case("!!!"), None);
        assert_eq!(pascal_case("triage agent").as_deref(), Some("TriageAgent"));
        assert_eq!(pascal_case(""), None);
    }
}
