//! Environment handed to steps and jobs.

use std::collections::BTreeMap;

use tshrag_core::DutId;

pub const TSHRAG_HOST: &str = "TSHRAG_HOST";
pub const TSHRAG_TEST_ID: &str = "TSHRAG_TEST_ID";
pub const TSHRAG_TEST_MACHINE: &str = "TSHRAG_TEST_MACHINE";
pub const TSHRAG_TEST_DEVICE: &str = "TSHRAG_TEST_DEVICE";
pub const TSHRAG_TEST_DIR: &str = "TSHRAG_TEST_DIR";
pub const TSHRAG_JOB_ID: &str = "TSHRAG_JOB_ID";
pub const TSHRAG_JOB_MACHINE: &str = "TSHRAG_JOB_MACHINE";
pub const TSHRAG_JOB_DEVICE: &str = "TSHRAG_JOB_DEVICE";
pub const TSHRAG_JOB_DIR: &str = "TSHRAG_JOB_DIR";

/// Separator of multi-valued variables.
pub const LIST_SEPARATOR: &str = ";";

pub fn join_ids<'a>(ids: impl IntoIterator<Item = &'a DutId>) -> String {
    ids.into_iter()
        .map(DutId::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Expand `$NAME` and `${NAME}` from `env`. Unknown names and malformed
/// references are left as written.
pub fn expand_variables(input: &str, env: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(close) => (&braced[..close], close + 2),
                None => ("", 0),
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..len], len)
        };

        match env.get(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(value),
            None => {
                out.push('$');
                out.push_str(&after[..consumed]);
            }
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn env() -> BTreeMap<String, String> {
        [("HOME", "/home/rig"), ("TSHRAG_JOB_ID", "j1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_plain_and_braced() {
        assert_eq!(expand_variables("$HOME/logs", &env()), "/home/rig/logs");
        assert_eq!(expand_variables("${TSHRAG_JOB_ID}.log", &env()), "j1.log");
        assert_eq!(expand_variables("a${HOME}b$HOME", &env()), "a/home/rigb/home/rig");
    }

    #[test]
    fn leaves_unknown_and_malformed() {
        assert_eq!(expand_variables("$NOPE x", &env()), "$NOPE x");
        assert_eq!(expand_variables("${NOPE}", &env()), "${NOPE}");
        assert_eq!(expand_variables("cost $5 ${HOME", &env()), "cost $5 ${HOME");
        assert_eq!(expand_variables("trailing $", &env()), "trailing $");
    }

    #[test]
    fn joins_with_semicolon() {
        let ids: BTreeSet<DutId> = ["dev_b", "dev_a"].into_iter().map(DutId::from).collect();
        assert_eq!(join_ids(&ids), "dev_a;dev_b");
        assert_eq!(join_ids(&BTreeSet::new()), "");
    }
}
