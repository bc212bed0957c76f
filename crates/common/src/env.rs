use std::{env, str::FromStr};

/// Parse an `envvar` as `T`. Return `fallback` if env missing or parsing fails.
pub fn parse_env_or<T: FromStr>(envvar: &str, fallback: T) -> T {
    env::var(envvar)
        .map(|s| T::from_str(&s).ok())
        .ok()
        .flatten()
        .unwrap_or(fallback)
}

/// Reads an envvar as a string, if set and non-empty.
pub fn read_env(envvar: &str) -> Option<String> {
    env::var(envvar).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_or_fallback() {
        assert_eq!(parse_env_or::<u16>("HOSH_TEST_UNSET_VAR", 9050), 9050);
    }

    #[test]
    fn test_parse_env_or_set() {
        env::set_var("HOSH_TEST_SET_VAR", "1234");
        assert_eq!(parse_env_or::<u16>("HOSH_TEST_SET_VAR", 1), 1234);
        env::set_var("HOSH_TEST_SET_VAR", "not a number");
        assert_eq!(parse_env_or::<u16>("HOSH_TEST_SET_VAR", 1), 1);
        env::remove_var("HOSH_TEST_SET_VAR");
    }
}
