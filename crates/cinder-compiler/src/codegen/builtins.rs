//! Runtime-provided functions
//!
//! Calls to these never jump into the instruction stream. Relocation gives
//! them the negative sentinel `-id`, which the VM dispatches to a primitive.

/// Built-in names and their primitive ids
pub const BUILTINS: &[(&str, i64)] = &[
    ("print", 1),
    ("println", 2),
    ("input", 3),
    ("len", 4),
    ("push", 5),
    ("pop", 6),
    ("to_int", 7),
    ("to_float", 8),
    ("to_str", 9),
    ("time", 10),
];

pub fn builtin_id(name: &str) -> Option<i64> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, id)| *id)
}

pub fn is_builtin(name: &str) -> bool {
    builtin_id(name).is_some()
}

/// Call target recorded for a built-in
pub fn sentinel(id: i64) -> i64 {
    -id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(builtin_id("print"), Some(1));
        assert_eq!(builtin_id("time"), Some(10));
        assert_eq!(builtin_id("main"), None);
        assert!(is_builtin("len"));
    }

    #[test]
    fn test_sentinels_are_negative_and_distinct() {
        let mut seen: Vec<i64> = BUILTINS.iter().map(|(_, id)| sentinel(*id)).collect();
        assert!(seen.iter().all(|s| *s < 0));
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), BUILTINS.len());
    }
}
