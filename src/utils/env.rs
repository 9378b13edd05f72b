// SPDX-License-Identifier: GPL-3.0-only

/// Reads a boolean flag from the environment, `None` if it is not set.
pub fn bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|value| is_truthy(&value))
}

/// Held by tests that touch or depend on the process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "y"].contains(&value.trim().to_lowercase().as_str())
}

#[cfg(test)]
mod test {
    use super::is_truthy;

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "TRUE", "Yes", "y", " y\n"] {
            assert!(is_truthy(value), "{value:?}");
        }
        for value in ["0", "false", "no", "", "2"] {
            assert!(!is_truthy(value), "{value:?}");
        }
    }
}
